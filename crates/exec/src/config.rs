// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executive configuration.
//!
//! Every policy toggle the original system kept in static configuration
//! sections lives here instead, fixed at construction.

use smol_str::SmolStr;

#[derive(Debug, Clone)]
pub struct ExecConfig {
    /// Human-readable identity, used in logs and thread names.
    pub name: SmolStr,
    /// When true, past-time requests are silently clamped to `Now`; when
    /// false they fail with `CausalityViolation`.
    pub ignore_causality_violations: bool,
    /// Keep a history of fired events sufficient for rollback. Required for
    /// any executive placed under a coordinator.
    pub retain_past_events: bool,
    /// When true (the default), an error escaping a user handler is logged
    /// and the loop continues; when false the run aborts with it.
    pub swallow_handler_failures: bool,
    /// Capture a backtrace every time a fiber suspends, for diagnostics.
    pub capture_suspend_backtrace: bool,
}

impl Default for ExecConfig {
    fn default() -> Self {
        ExecConfig {
            name: SmolStr::new(format!("exec-{}", nanoid::nanoid!(6))),
            ignore_causality_violations: false,
            retain_past_events: false,
            swallow_handler_failures: true,
            capture_suspend_backtrace: false,
        }
    }
}

impl ExecConfig {
    pub fn named(name: impl AsRef<str>) -> Self {
        ExecConfig { name: SmolStr::new(name.as_ref()), ..ExecConfig::default() }
    }

    pub fn ignore_causality_violations(mut self, ignore: bool) -> Self {
        self.ignore_causality_violations = ignore;
        self
    }

    pub fn retain_past_events(mut self, retain: bool) -> Self {
        self.retain_past_events = retain;
        self
    }

    pub fn swallow_handler_failures(mut self, swallow: bool) -> Self {
        self.swallow_handler_failures = swallow;
        self
    }

    pub fn capture_suspend_backtrace(mut self, capture: bool) -> Self {
        self.capture_suspend_backtrace = capture;
        self
    }
}
