// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Detachable events: the cook-dinner chain with join.

use super::prelude::*;
use tw_exec::{EventRequest, ExecState, Executive};

#[test]
fn cook_dinner_joins_three_detachable_tasks() {
    init_tracing();
    let exec = Executive::named("kitchen");
    let output = log();

    let sink = output.clone();
    exec.request(
        EventRequest::new(at(0), move |ctx| {
            let mut dishes = Vec::new();
            for (dish, mins) in [("MakeTurkey", 300i64), ("MakeGravy", 250), ("MakeStuffing", 30)] {
                let sink = sink.clone();
                dishes.push(ctx.exec().request(
                    EventRequest::new(ctx.now(), move |ctx| {
                        ctx.suspend_for(minutes(mins))?;
                        sink.lock().push(format!("{dish} done"));
                        Ok(())
                    })
                    .detachable(),
                )?);
            }
            ctx.join(&dishes)?;
            assert_eq!(ctx.now(), at(300));
            sink.lock().push("Serving dinner!".to_string());
            Ok(())
        })
        .detachable(),
    )
    .unwrap();

    exec.start().unwrap();
    assert_eq!(
        *output.lock(),
        vec![
            "MakeStuffing done".to_string(),
            "MakeGravy done".to_string(),
            "MakeTurkey done".to_string(),
            "Serving dinner!".to_string()
        ]
    );
    assert_eq!(exec.now(), at(300));
    assert_eq!(exec.state(), ExecState::Finished);
}

#[test]
fn suspended_work_interleaves_with_ordinary_events() {
    init_tracing();
    let exec = Executive::named("interleaved");
    let output = log();

    let sink = output.clone();
    exec.request(
        EventRequest::new(at(0), move |ctx| {
            sink.lock().push("soak".to_string());
            ctx.suspend_for(minutes(60))?;
            sink.lock().push("rinse".to_string());
            ctx.suspend_for(minutes(60))?;
            sink.lock().push("dry".to_string());
            Ok(())
        })
        .detachable(),
    )
    .unwrap();

    for (label, when) in [("check-30", 30i64), ("check-90", 90)] {
        let sink = output.clone();
        exec.request_event(at(when), move |_| {
            sink.lock().push(label.to_string());
            Ok(())
        })
        .unwrap();
    }

    exec.start().unwrap();
    assert_eq!(
        *output.lock(),
        vec![
            "soak".to_string(),
            "check-30".to_string(),
            "rinse".to_string(),
            "check-90".to_string(),
            "dry".to_string()
        ]
    );
    assert_eq!(exec.now(), at(120));
}
