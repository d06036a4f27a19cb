// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Model façade: one executive, one state machine, one initialization
//! service.
//!
//! The machine gates runs: `start` is refused unless the model can legally
//! transition out of idle. Initialization tasks registered with the
//! [`InitializationManager`] run on the `Initialized` leg of every start,
//! before the executive's loop begins. Completion chains back to idle
//! through the machine's follow-on states.

use crate::config::ExecConfig;
use crate::error::{ExecError, HandlerError};
use crate::executive::{ExecState, Executive};
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tw_core::{MachineState, StateMachine, StateMachineBuilder, TransitionError};

/// Model lifecycle states. `Running` is the distinguished start state,
/// `Aborted` the abort state, and `Idle` the idle state every completed or
/// aborted run chains back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    Idle,
    Initialized,
    Running,
    Completed,
    Aborted,
}

impl MachineState for ModelState {
    const STATES: &'static [Self] = &[
        ModelState::Idle,
        ModelState::Initialized,
        ModelState::Running,
        ModelState::Completed,
        ModelState::Aborted,
    ];

    fn index(self) -> usize {
        match self {
            ModelState::Idle => 0,
            ModelState::Initialized => 1,
            ModelState::Running => 2,
            ModelState::Completed => 3,
            ModelState::Aborted => 4,
        }
    }
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    Transition(#[from] TransitionError<ModelState>),
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error("initialization task failed: {0}")]
    Initialization(String),
}

type InitTask = Box<dyn FnOnce(&Arc<Executive>) -> Result<(), HandlerError> + Send>;

/// Registry of follow-on tasks for the `Initialized` state. Tasks run once,
/// in registration order, at the next start.
#[derive(Default)]
pub struct InitializationManager {
    tasks: Mutex<Vec<InitTask>>,
}

impl InitializationManager {
    pub fn add_task(
        &self,
        task: impl FnOnce(&Arc<Executive>) -> Result<(), HandlerError> + Send + 'static,
    ) {
        self.tasks.lock().push(Box::new(task));
    }

    pub fn pending(&self) -> usize {
        self.tasks.lock().len()
    }

    fn run_all(&self, exec: &Arc<Executive>) -> Result<(), ModelError> {
        let tasks: Vec<InitTask> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            task(exec).map_err(|err| ModelError::Initialization(err.to_string()))?;
        }
        Ok(())
    }
}

type HookFn = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct ModelHooks {
    starting: Mutex<Vec<HookFn>>,
    started_once: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
    stopped: Mutex<Vec<HookFn>>,
    finished: Mutex<Vec<HookFn>>,
    reset: Mutex<Vec<HookFn>>,
}

pub struct Model {
    exec: Arc<Executive>,
    machine: Mutex<StateMachine<ModelState>>,
    init: InitializationManager,
    hooks: ModelHooks,
}

impl Model {
    pub fn new(cfg: ExecConfig) -> Arc<Self> {
        let name = cfg.name.clone();
        let mut machine = StateMachineBuilder::new(ModelState::Idle)
            .allow(ModelState::Idle, ModelState::Initialized)
            .allow(ModelState::Initialized, ModelState::Running)
            .allow(ModelState::Running, ModelState::Completed)
            .allow(ModelState::Running, ModelState::Aborted)
            .allow(ModelState::Completed, ModelState::Idle)
            .allow(ModelState::Aborted, ModelState::Idle)
            .follow_on(ModelState::Completed, ModelState::Idle)
            .follow_on(ModelState::Aborted, ModelState::Idle)
            .build();
        machine.set_transition_handler(Arc::new(move |from, to| {
            tracing::debug!(model = %name, ?from, ?to, "model transition completed");
        }));
        Arc::new(Model {
            exec: Executive::new(cfg),
            machine: Mutex::new(machine),
            init: InitializationManager::default(),
            hooks: ModelHooks::default(),
        })
    }

    pub fn executive(&self) -> &Arc<Executive> {
        &self.exec
    }

    pub fn state(&self) -> ModelState {
        self.machine.lock().current()
    }

    pub fn initialization(&self) -> &InitializationManager {
        &self.init
    }

    pub fn on_starting(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.hooks.starting.lock().push(Arc::new(hook));
    }

    /// Runs once, at the next start only.
    pub fn on_started_once(&self, hook: impl FnOnce() + Send + 'static) {
        self.hooks.started_once.lock().push(Box::new(hook));
    }

    pub fn on_stopped(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.hooks.stopped.lock().push(Arc::new(hook));
    }

    pub fn on_finished(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.hooks.finished.lock().push(Arc::new(hook));
    }

    pub fn on_reset(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.hooks.reset.lock().push(Arc::new(hook));
    }

    fn run_hooks(hooks: &Mutex<Vec<HookFn>>) {
        let snapshot: Vec<HookFn> = hooks.lock().iter().map(Arc::clone).collect();
        for hook in snapshot {
            hook();
        }
    }

    /// Run the model to completion on the calling thread.
    ///
    /// Legs: `Idle -> Initialized` (initialization tasks run), then
    /// `Initialized -> Running` (the executive loop), then `Completed` or
    /// `Aborted`, each of which chains back to `Idle`.
    pub fn start(&self) -> Result<(), ModelError> {
        Self::run_hooks(&self.hooks.starting);
        self.machine.lock().transition_to(ModelState::Initialized)?;
        if let Err(err) = self.init.run_all(&self.exec) {
            // Abandon the run; the machine returns to idle via the abort leg.
            self.machine.lock().transition_to(ModelState::Running)?;
            self.machine.lock().transition_to(ModelState::Aborted)?;
            return Err(err);
        }
        self.machine.lock().transition_to(ModelState::Running)?;
        let once: Vec<Box<dyn FnOnce() + Send>> =
            std::mem::take(&mut *self.hooks.started_once.lock());
        for hook in once {
            hook();
        }
        let run = self.exec.start();
        let end_state = self.exec.state();
        match run {
            Ok(()) if end_state == ExecState::Finished => {
                self.machine.lock().transition_to(ModelState::Completed)?;
                Self::run_hooks(&self.hooks.finished);
                Ok(())
            }
            Ok(()) => {
                self.machine.lock().transition_to(ModelState::Aborted)?;
                Self::run_hooks(&self.hooks.stopped);
                Ok(())
            }
            Err(err) => {
                self.machine.lock().transition_to(ModelState::Aborted)?;
                Self::run_hooks(&self.hooks.stopped);
                Err(err.into())
            }
        }
    }

    /// Abort a run in progress.
    pub fn abort(&self) {
        self.exec.abort();
    }

    /// Reset the executive for another run.
    pub fn reset(&self) -> Result<(), ModelError> {
        self.exec.reset()?;
        Self::run_hooks(&self.hooks.reset);
        Ok(())
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
