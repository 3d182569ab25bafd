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

//! Minimal built-in application: reports uptime.
//!
//! Publishes `<ns>/<id>/uptime` every interval and answers requests on
//! `<ns>/<id>/uptime/get`. Useful as the default module on a freshly flashed
//! board before a real application has been pushed.

use crate::clock::elapsed_ms;
use crate::device_log::LogLevel;
use crate::dispatch::DispatchMode;
use crate::plugin::{AppModule, Capabilities};
use crate::runtime::Runtime;

pub const DEFAULT_UPTIME_INTERVAL_MS: u64 = 60_000;

#[derive(Debug)]
pub struct UptimeModule {
    interval_ms: u64,
    last_publish_ms: Option<u64>,
}

impl Default for UptimeModule {
    fn default() -> Self {
        Self::new(DEFAULT_UPTIME_INTERVAL_MS)
    }
}

impl UptimeModule {
    pub const NAME: &'static str = "uptime";

    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last_publish_ms: None,
        }
    }
}

fn publish_uptime(runtime: &mut Runtime) -> bool {
    let topic = runtime.topics().topic("uptime");
    let uptime = runtime.now().to_string();
    runtime.publish(&topic, uptime.as_bytes(), false)
}

impl AppModule for UptimeModule {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::plugin()
    }

    fn initialize(&mut self, runtime: &mut Runtime) -> anyhow::Result<()> {
        let request = runtime.topics().topic("uptime/get");
        runtime.subscribe(&request, DispatchMode::Deferred, |runtime, _, _| {
            publish_uptime(runtime);
            Ok(())
        });
        runtime.log(LogLevel::Info, "uptime module ready");
        Ok(())
    }

    fn tick(&mut self, runtime: &mut Runtime) -> anyhow::Result<()> {
        let now = runtime.now();
        let due = self
            .last_publish_ms
            .is_none_or(|last| elapsed_ms(now, last) >= self.interval_ms);

        if due && publish_uptime(runtime) {
            self.last_publish_ms = Some(now);
        }
        Ok(())
    }
}
