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

//! Bootstrap loop.
//!
//! One iteration:
//! 1. Update the visible signal from the previous iteration's outcome
//! 2. Ensure network, then bus
//! 3. Pump the bus
//! 4. Handle system commands (updates)
//! 5. Heartbeat and log flush
//! 6. Step the application, then drain a few deferred callbacks
//!
//! A panic that escapes all of that drops the device into help mode: it
//! keeps pumping and handling updates but runs no application code for a
//! bounded interval, then resumes. The loop itself never returns.

use crate::config::SupervisorSettings;
use crate::signal::{Indicator, Signal};
use hearth_ota::{Fetcher, UpdateManifest, Updater};
use hearth_runtime::fault::panic_message;
use hearth_runtime::runtime::HEALTH_NEEDS_HELP;
use hearth_runtime::{Fault, Runtime, Supervisor, SystemCommand};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Sleep between iterations of an otherwise idle loop
const LOOP_PACE: Duration = Duration::from_millis(10);

/// Performs the full device restart that follows an installed update
pub trait Restarter {
    /// Does not return on success in a real deployment.
    fn restart(&mut self) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapSettings {
    pub help_steps: u32,
    pub help_step: Duration,
}

impl Default for BootstrapSettings {
    fn default() -> Self {
        Self {
            help_steps: 200,
            help_step: Duration::from_millis(100),
        }
    }
}

impl From<&SupervisorSettings> for BootstrapSettings {
    fn from(settings: &SupervisorSettings) -> Self {
        Self {
            help_steps: settings.help_steps,
            help_step: settings.help_step(),
        }
    }
}

/// What a single call to [`Bootstrap::iterate`] ended in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Iteration {
    Clean,
    /// At least one fault was reported
    Faulted,
    /// A panic escaped and help mode ran
    Help,
}

pub struct Bootstrap {
    runtime: Runtime,
    supervisor: Supervisor,
    updater: Updater<Box<dyn Fetcher>>,
    signal: Signal,
    restarter: Box<dyn Restarter>,
    settings: BootstrapSettings,
    error_state: bool,
    /// Reported on the first iteration only
    boot_faults: Vec<Fault>,
    /// Reported every iteration, the throttle keeps it quiet
    standing_faults: Vec<Fault>,
}

impl fmt::Debug for Bootstrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bootstrap")
            .field("runtime", &self.runtime)
            .field("supervisor", &self.supervisor)
            .field("settings", &self.settings)
            .field("error_state", &self.error_state)
            .finish_non_exhaustive()
    }
}

impl Bootstrap {
    pub fn new(
        runtime: Runtime,
        supervisor: Supervisor,
        updater: Updater<Box<dyn Fetcher>>,
        indicator: Box<dyn Indicator>,
        restarter: Box<dyn Restarter>,
        settings: BootstrapSettings,
    ) -> Self {
        Self {
            runtime,
            supervisor,
            updater,
            signal: Signal::new(indicator),
            restarter,
            settings,
            error_state: false,
            boot_faults: Vec::new(),
            standing_faults: Vec::new(),
        }
    }

    /// Faults to report once, on the first iteration
    #[must_use]
    pub fn with_boot_faults(mut self, faults: Vec<Fault>) -> Self {
        self.boot_faults = faults;
        self
    }

    /// Fault to report on every iteration, e.g. an unreadable config file
    #[must_use]
    pub fn with_standing_fault(mut self, fault: Fault) -> Self {
        self.standing_faults.push(fault);
        self
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut Runtime {
        &mut self.runtime
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn error_state(&self) -> bool {
        self.error_state
    }

    pub fn run_forever(&mut self) -> ! {
        info!(
            device_id = %self.runtime.identity().device_id,
            "🚀 Bootstrap loop starting"
        );
        let clock = self.runtime.clock();
        loop {
            self.iterate();
            clock.sleep(LOOP_PACE);
        }
    }

    /// One guarded pass of the loop. Never panics.
    pub fn iterate(&mut self) -> Iteration {
        match panic::catch_unwind(AssertUnwindSafe(|| self.try_iteration())) {
            Ok(0) => {
                self.error_state = false;
                Iteration::Clean
            }
            Ok(faults) => {
                debug!(faults, "Iteration reported faults");
                self.error_state = true;
                Iteration::Faulted
            }
            Err(payload) => {
                let fault = Fault::unhandled("bootstrap_exception", panic_message(payload.as_ref()));
                if panic::catch_unwind(AssertUnwindSafe(|| self.help(&fault))).is_err() {
                    error!("Help mode itself panicked, resuming loop");
                }
                self.error_state = true;
                Iteration::Help
            }
        }
    }

    /// The unguarded iteration; returns the number of faults reported.
    fn try_iteration(&mut self) -> u32 {
        let now = self.runtime.now();
        self.signal.update(self.error_state, now);

        for fault in std::mem::take(&mut self.boot_faults) {
            self.runtime.report(&fault);
        }
        for fault in &self.standing_faults {
            self.runtime.report(fault);
        }

        if self.runtime.ensure_network() {
            self.runtime.ensure_bus();
        }
        self.runtime.pump();
        self.handle_commands();
        self.runtime.housekeeping();

        if let Err(fault) = self.supervisor.step(&mut self.runtime) {
            self.runtime.report(&fault);
        }
        self.runtime.run_deferred();

        self.runtime.take_fault_count()
    }

    fn help(&mut self, fault: &Fault) {
        self.error_state = true;
        error!(
            steps = self.settings.help_steps,
            "Unhandled fault, entering help mode: {}", fault.message
        );
        self.runtime.report(fault);
        self.runtime.publish_health(HEALTH_NEEDS_HELP);

        let clock = self.runtime.clock();
        for step in 0..self.settings.help_steps {
            self.signal.update(true, clock.now_ms());
            // A failing step must not cut the interval short
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| {
                self.runtime.pump();
                self.handle_commands();
            })) {
                warn!(step, "Help step panicked: {}", panic_message(payload.as_ref()));
            }
            clock.sleep(self.settings.help_step);
        }

        self.runtime.take_fault_count();
        info!("Leaving help mode");
    }

    fn handle_commands(&mut self) {
        while let Some(command) = self.runtime.take_command() {
            match command {
                SystemCommand::Update(payload) => self.handle_update(&payload),
            }
        }
    }

    /// Quiesce, apply, and restart if anything was installed.
    fn handle_update(&mut self, payload: &[u8]) {
        let manifest = match UpdateManifest::from_json(payload) {
            Ok(manifest) => manifest,
            Err(e) => {
                self.runtime
                    .report(&Fault::update("bad_update_payload", e.to_string()));
                return;
            }
        };
        if manifest.is_empty() {
            info!("Update manifest lists no files, nothing to do");
            return;
        }

        info!(files = manifest.files.len(), "📦 Applying update");
        self.runtime.publish_status("updating");
        self.supervisor.quiesce(&mut self.runtime, "update");

        let report = match self.updater.apply(&manifest) {
            Ok(report) => report,
            Err(e) => {
                warn!("Update aborted, keeping current code");
                self.runtime
                    .report(&Fault::update("update_failed", e.to_string()));
                return;
            }
        };

        self.runtime.publish_status("updated");
        info!(
            installed = report.installed.len(),
            skipped = report.skipped.len(),
            "Update applied"
        );

        if report.restart_required() {
            info!("🔄 Restarting to load updated code");
            if let Err(e) = self.restarter.restart() {
                self.runtime
                    .report(&Fault::update("restart_failed", format!("{e:#}")));
            }
        }
    }
}
