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

//! A whole device, bootstrap loop included, wired to in-memory doubles.

use hearth_bootstrap::{Bootstrap, BootstrapSettings, Indicator, Iteration, Restarter};
use hearth_ota::{Fetcher, HttpFetcher, Updater};
use hearth_runtime::bus::{BusClient, InboundMessage, LastWill, QoS};
use hearth_runtime::testing::{ManualClock, MemoryBus, MemoryNetwork, test_identity};
use hearth_runtime::{
    AppModule, Clock, ModuleLoader, Runtime, RuntimeSettings, Supervisor, SystemTopics,
};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use tempfile::TempDir;

pub const QUIESCE_TIMEOUT: Duration = Duration::from_millis(200);

pub const HELP_SETTINGS: BootstrapSettings = BootstrapSettings {
    help_steps: 20,
    help_step: Duration::from_millis(100),
};

/// Loader backed by a closure, so tests can count and script loads
pub struct FnLoader<F>(pub F);

impl<F> fmt::Debug for FnLoader<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnLoader")
    }
}

impl<F> ModuleLoader for FnLoader<F>
where
    F: FnMut() -> anyhow::Result<Box<dyn AppModule>>,
{
    fn load(&mut self) -> anyhow::Result<Box<dyn AppModule>> {
        (self.0)()
    }
}

/// Memory bus whose next pumps can be made to panic
#[derive(Debug, Clone)]
struct PanickyBus {
    inner: MemoryBus,
    panicking_pumps: Rc<Cell<u32>>,
}

impl BusClient for PanickyBus {
    fn connect(&mut self) -> bool {
        self.inner.connect()
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    fn subscribe(&mut self, topic: &str) -> bool {
        self.inner.subscribe(topic)
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool, qos: QoS) -> bool {
        self.inner.publish(topic, payload, retain, qos)
    }

    fn set_last_will(&mut self, will: LastWill) {
        self.inner.set_last_will(will);
    }

    fn check_messages(&mut self) -> Vec<InboundMessage> {
        let remaining = self.panicking_pumps.get();
        if remaining > 0 {
            self.panicking_pumps.set(remaining - 1);
            panic!("radio driver fell over");
        }
        self.inner.check_messages()
    }
}

#[derive(Debug)]
struct Dark;

impl Indicator for Dark {
    fn set(&mut self, _on: bool) {}
}

#[derive(Debug)]
struct CountingRestarter(Rc<Cell<u32>>);

impl Restarter for CountingRestarter {
    fn restart(&mut self) -> anyhow::Result<()> {
        self.0.set(self.0.get() + 1);
        Ok(())
    }
}

#[derive(Debug)]
pub struct Device {
    pub boot: Bootstrap,
    pub bus: MemoryBus,
    pub network: MemoryNetwork,
    pub clock: Rc<ManualClock>,
    pub topics: SystemTopics,
    pub restarts: Rc<Cell<u32>>,
    pub root: TempDir,
    panicking_pumps: Rc<Cell<u32>>,
}

impl Device {
    /// Device fetching updates over HTTP
    pub fn new(loader: impl ModuleLoader + 'static) -> Self {
        let fetcher = HttpFetcher::new().unwrap();
        Self::with_fetcher(loader, Box::new(fetcher))
    }

    pub fn with_fetcher(loader: impl ModuleLoader + 'static, fetcher: Box<dyn Fetcher>) -> Self {
        let bus = MemoryBus::new();
        let network = MemoryNetwork::up();
        let clock = Rc::new(ManualClock::new());
        let panicking_pumps = Rc::new(Cell::new(0));
        let restarts = Rc::new(Cell::new(0));
        let root = tempfile::tempdir().unwrap();

        let runtime = Runtime::new(
            test_identity(),
            RuntimeSettings::default(),
            clock.clone(),
            Box::new(network.clone()),
            Box::new(PanickyBus {
                inner: bus.clone(),
                panicking_pumps: Rc::clone(&panicking_pumps),
            }),
        );
        let topics = runtime.topics().clone();
        let retry_clock = Rc::clone(&clock);

        let boot = Bootstrap::new(
            runtime,
            Supervisor::new(Box::new(loader), QUIESCE_TIMEOUT),
            Updater::new(root.path(), fetcher)
                .with_retry(2, Duration::from_millis(50))
                .with_sleep(move |d| retry_clock.sleep(d)),
            Box::new(Dark),
            Box::new(CountingRestarter(Rc::clone(&restarts))),
            HELP_SETTINGS,
        );

        Self {
            boot,
            bus,
            network,
            clock,
            topics,
            restarts,
            root,
            panicking_pumps,
        }
    }

    pub fn run(&mut self, iterations: usize) -> Vec<Iteration> {
        (0..iterations).map(|_| self.boot.iterate()).collect()
    }

    /// Make the bus driver panic on the next pump
    pub fn break_bus_once(&self) {
        self.break_bus(1);
    }

    /// Make the bus driver panic on the next `pumps` pumps
    pub fn break_bus(&self, pumps: u32) {
        self.panicking_pumps.set(pumps);
    }

    /// SOS reports carrying `code`
    pub fn sos_with(&self, code: &str) -> usize {
        self.bus
            .texts_on(&self.topics.sos())
            .iter()
            .filter(|report| report.contains(&format!("\"{code}\"")))
            .count()
    }
}
