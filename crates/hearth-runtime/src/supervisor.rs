// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of Hearth.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Application supervisor.
//!
//! Owns the single application slot. Each `step` advances the lifecycle by at
//! most one hook call:
//!
//! ```text
//! Unloaded --load--> Initializing --initialize--> Running --tick--> Running
//!    ^  |                 |                          |
//!    +--+ load failed     +--> Failed --initialize---+
//! ```
//!
//! Every call into the module is guarded, so errors and panics come back as
//! a [`Fault`] and the module stays eligible for the next step.

use crate::clock::{Clock, duration_ms, elapsed_ms};
use crate::fault::{Fault, FaultKind, guard};
use crate::plugin::{AppModule, Capabilities, Entrypoint, ModuleLoader};
use crate::runtime::Runtime;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_QUIESCE_TIMEOUT: Duration = Duration::from_secs(2);

/// Pump cadence while waiting out a quiesce
const QUIESCE_PUMP_STEP: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    Unloaded,
    Initializing,
    Running,
    /// `initialize` failed; retried on the next step
    Failed,
}

pub struct Supervisor {
    loader: Box<dyn ModuleLoader>,
    module: Option<Box<dyn AppModule>>,
    capabilities: Capabilities,
    state: PluginState,
    quiescing: bool,
    quiesce_timeout: Duration,
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("module", &self.module.as_ref().map(|m| m.name().to_owned()))
            .field("capabilities", &self.capabilities)
            .field("state", &self.state)
            .field("quiescing", &self.quiescing)
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    pub fn new(loader: Box<dyn ModuleLoader>, quiesce_timeout: Duration) -> Self {
        Self {
            loader,
            module: None,
            capabilities: Capabilities::default(),
            state: PluginState::Unloaded,
            quiescing: false,
            quiesce_timeout,
        }
    }

    pub fn state(&self) -> PluginState {
        self.state
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn is_quiescing(&self) -> bool {
        self.quiescing
    }

    pub fn module_name(&self) -> Option<&str> {
        self.module.as_deref().map(|module| module.name())
    }

    pub fn step(&mut self, runtime: &mut Runtime) -> Result<(), Fault> {
        if self.quiescing {
            debug!("Quiesce in progress, skipping application step");
            return Ok(());
        }

        if self.module.is_none() {
            self.load()?;
        }
        let Some(module) = self.module.as_mut() else {
            return Ok(());
        };

        match self.capabilities.entrypoint() {
            Entrypoint::Plugin => match self.state {
                PluginState::Initializing | PluginState::Failed => {
                    let initialized = guard(FaultKind::Plugin, "app_init_failed", || {
                        module.initialize(runtime)
                    });
                    if let Err(fault) = initialized {
                        self.state = PluginState::Failed;
                        return Err(fault);
                    }
                    self.state = PluginState::Running;
                    info!(module = module.name(), "Application running");
                    runtime.publish_status("running");
                    Ok(())
                }
                PluginState::Running => {
                    guard(FaultKind::Plugin, "app_tick_failed", || module.tick(runtime))
                }
                PluginState::Unloaded => Ok(()),
            },
            Entrypoint::Legacy => {
                info!(module = module.name(), "Invoking legacy entrypoint");
                guard(FaultKind::Plugin, "app_crash", || module.main(runtime))?;
                Err(Fault::plugin(
                    "app_exited",
                    format!("{} main() returned", module.name()),
                ))
            }
            Entrypoint::None => Err(Fault::plugin(
                "app_no_entrypoint",
                format!(
                    "{} exposes neither initialize+tick nor main",
                    module.name()
                ),
            )),
        }
    }

    fn load(&mut self) -> Result<(), Fault> {
        let loader = &mut self.loader;
        let module = guard(FaultKind::Plugin, "app_import_failed", || loader.load())?;

        self.capabilities = module.capabilities();
        info!(
            module = module.name(),
            capabilities = ?self.capabilities,
            entrypoint = ?self.capabilities.entrypoint(),
            "Application loaded"
        );
        self.module = Some(module);
        self.state = PluginState::Initializing;
        Ok(())
    }

    /// Quiet the application ahead of a destructive operation.
    ///
    /// Calls the module's `quiesce` hook if declared, then keeps the bus
    /// pumping for the full timeout without ticking. Hook failures are
    /// reported, never returned.
    pub fn quiesce(&mut self, runtime: &mut Runtime, reason: &str) {
        self.quiescing = true;
        info!(reason, "Quiescing application");

        if self.capabilities.quiesce
            && let Some(module) = self.module.as_mut()
        {
            let result = guard(FaultKind::Plugin, "app_quiesce_failed", || {
                module.quiesce(runtime, reason)
            });
            if let Err(fault) = result {
                warn!("Quiesce hook failed: {}", fault.message);
                runtime.report(&fault);
            }
        }

        let clock = runtime.clock();
        let timeout = duration_ms(self.quiesce_timeout);
        let started = clock.now_ms();
        loop {
            runtime.pump();
            let waited = elapsed_ms(clock.now_ms(), started);
            if waited >= timeout {
                break;
            }
            let step = QUIESCE_PUMP_STEP.min(Duration::from_millis(timeout - waited));
            clock.sleep(step);
        }

        self.quiescing = false;
        debug!("Quiesce complete");
    }
}
