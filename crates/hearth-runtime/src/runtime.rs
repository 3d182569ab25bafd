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

//! Runtime shim between the bus and the application.
//!
//! The application sees only the public surface of [`Runtime`]: `publish`,
//! `subscribe`, `unsubscribe`, `diagnostic`, `now` and `log`. The bootstrap
//! loop drives the rest (`ensure_network`, `ensure_bus`, `pump`,
//! `run_deferred`, `housekeeping`, `report`).
//!
//! Control topics (`update`, `ping`) are consumed here and never reach the
//! application's subscriptions.

use crate::bus::{BusClient, InboundMessage, LastWill, NetworkLink, QoS};
use crate::clock::{Clock, duration_ms, elapsed_ms};
use crate::connectivity::{Connectivity, ConnectivitySettings, ConnectivityState};
use crate::device_log::{DEFAULT_LOG_CAPACITY, DEFAULT_LOG_FLUSH_MS, DeviceLog, LogEntry, LogLevel};
use crate::diagnostics::{Diagnostic, DiagnosticThrottle};
use crate::dispatch::{
    Callback, Deferred, DeferredQueue, DispatchMode, Enqueued, Subscription, SubscriptionTable,
};
use crate::fault::{Fault, FaultKind, guard};
use crate::identity::DeviceIdentity;
use crate::topics::{Control, SystemTopics};
use anyhow::anyhow;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const HEALTH_ONLINE: &str = "online";
pub const HEALTH_OFFLINE: &str = "offline";
pub const HEALTH_NEEDS_HELP: &str = "needs_help";

/// Component name stamped on log entries written by the application
const APP_COMPONENT: &str = "app";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub connectivity: ConnectivitySettings,
    pub heartbeat_interval: Duration,
    pub deferred_capacity: usize,
    pub deferred_per_tick: usize,
    pub diagnostic_repeat: Duration,
    pub log_capacity: usize,
    pub log_flush_interval: Duration,
    pub log_min_level: LogLevel,
    /// Published retained on the `version` topic
    pub firmware_version: String,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            connectivity: ConnectivitySettings::default(),
            heartbeat_interval: Duration::from_secs(30),
            deferred_capacity: 32,
            deferred_per_tick: 4,
            diagnostic_repeat: Duration::from_secs(300),
            log_capacity: DEFAULT_LOG_CAPACITY,
            log_flush_interval: Duration::from_millis(DEFAULT_LOG_FLUSH_MS),
            log_min_level: LogLevel::Info,
            firmware_version: env!("CARGO_PKG_VERSION").to_owned(),
        }
    }
}

/// Work the runtime hands back to the bootstrap loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemCommand {
    /// Raw manifest payload received on the `update` topic
    Update(Vec<u8>),
}

pub struct Runtime {
    identity: DeviceIdentity,
    topics: SystemTopics,
    settings: RuntimeSettings,
    clock: Rc<dyn Clock>,
    link: Connectivity,
    subscriptions: SubscriptionTable,
    deferred: DeferredQueue,
    commands: VecDeque<SystemCommand>,
    throttle: DiagnosticThrottle,
    log: DeviceLog,
    last_heartbeat_ms: Option<u64>,
    faults: u32,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("device_id", &self.identity.device_id)
            .field("link", &self.link)
            .field("subscriptions", &self.subscriptions.len())
            .field("deferred", &self.deferred.len())
            .field("commands", &self.commands.len())
            .finish_non_exhaustive()
    }
}

impl Runtime {
    pub fn new(
        identity: DeviceIdentity,
        settings: RuntimeSettings,
        clock: Rc<dyn Clock>,
        network: Box<dyn NetworkLink>,
        bus: Box<dyn BusClient>,
    ) -> Self {
        let topics = SystemTopics::new(&identity.namespace, &identity.device_id);
        let link = Connectivity::new(network, bus, settings.connectivity);
        let deferred = DeferredQueue::new(settings.deferred_capacity);
        let throttle = DiagnosticThrottle::new(duration_ms(settings.diagnostic_repeat));
        let log = DeviceLog::new(
            settings.log_capacity,
            settings.log_min_level,
            duration_ms(settings.log_flush_interval),
        );

        Self {
            identity,
            topics,
            settings,
            clock,
            link,
            subscriptions: SubscriptionTable::new(),
            deferred,
            commands: VecDeque::new(),
            throttle,
            log,
            last_heartbeat_ms: None,
            faults: 0,
        }
    }

    /// Publish at most once. Returns `false` without a session; nothing is
    /// buffered for later.
    pub fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> bool {
        self.link.publish(topic, payload, retain, QoS::AtMostOnce)
    }

    /// Register `callback` for `filter`, replacing any previous entry for the
    /// same filter. The entry outlives reconnects.
    pub fn subscribe<F>(&mut self, filter: &str, mode: DispatchMode, callback: F)
    where
        F: FnMut(&mut Runtime, &str, &[u8]) -> anyhow::Result<()> + 'static,
    {
        let callback: Callback = Rc::new(RefCell::new(callback));
        let replaced = self
            .subscriptions
            .insert(filter, Subscription { callback, mode })
            .is_some();

        let system = self.topics.inbound().iter().any(|known| known == filter);
        if !replaced && !system && self.link.subscribe(filter) {
            debug!(filter, "Subscribed during live session");
        }
    }

    /// Stop routing `filter`. Messages already deferred are still delivered.
    pub fn unsubscribe(&mut self, filter: &str) -> bool {
        self.subscriptions.remove(filter)
    }

    /// Application-level report on the `sos` topic, rate limited like faults.
    pub fn diagnostic(&mut self, kind: &str, message: &str) {
        warn!(kind, "Application diagnostic: {message}");
        self.emit_diagnostic(kind, message);
    }

    /// Monotonic milliseconds
    pub fn now(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn log(&mut self, level: LogLevel, message: &str) {
        self.log_as(level, APP_COMPONENT, message);
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn topics(&self) -> &SystemTopics {
        &self.topics
    }

    pub fn clock(&self) -> Rc<dyn Clock> {
        Rc::clone(&self.clock)
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    pub fn connectivity(&self) -> ConnectivityState {
        self.link.state()
    }

    pub fn has_session(&self) -> bool {
        self.link.has_session()
    }

    pub fn subscriptions(&self) -> &SubscriptionTable {
        &self.subscriptions
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    pub fn ensure_network(&mut self) -> bool {
        let result = self
            .link
            .ensure_network(&self.identity.wifi, self.clock.as_ref());
        match result {
            Ok(()) => true,
            Err(fault) => {
                self.report(&fault);
                false
            }
        }
    }

    /// Returns whether a session is available after the call.
    pub fn ensure_bus(&mut self) -> bool {
        let last_will = LastWill {
            topic: self.topics.health(),
            payload: HEALTH_OFFLINE.as_bytes().to_vec(),
            retain: true,
            qos: QoS::AtLeastOnce,
        };

        let topics = &self.topics;
        let subscriptions = &self.subscriptions;
        let result = self.link.ensure_bus(
            &self.identity.bus,
            last_will,
            || {
                // An application may also ask for a system topic
                let mut filters = topics.inbound().to_vec();
                for filter in subscriptions.filters() {
                    if !filters.iter().any(|known| known == filter) {
                        filters.push(filter.to_owned());
                    }
                }
                filters
            },
            self.clock.as_ref(),
        );

        match result {
            Ok(true) => self.announce(),
            Ok(false) => {}
            Err(fault) => self.report(&fault),
        }
        self.link.has_session()
    }

    fn announce(&mut self) {
        let now = self.now();
        self.publish_health(HEALTH_ONLINE);
        self.publish(&self.topics.boot(), now.to_string().as_bytes(), false);
        let version = self.settings.firmware_version.clone();
        self.publish(&self.topics.version(), version.as_bytes(), true);
        self.last_heartbeat_ms = Some(now);
        info!(device_id = %self.identity.device_id, "Announced online");
    }

    /// Drain the bus and route every message.
    pub fn pump(&mut self) -> usize {
        let messages = self.link.pump();
        let count = messages.len();
        for message in messages {
            self.route(message);
        }
        count
    }

    fn route(&mut self, message: InboundMessage) {
        match self.topics.control(&message.topic) {
            Some(Control::Ping) => {
                debug!("Ping received");
                self.publish_status("alive");
            }
            Some(Control::Update) => {
                info!(bytes = message.payload.len(), "Update command queued");
                self.commands
                    .push_back(SystemCommand::Update(message.payload));
            }
            None => self.dispatch(&message.topic, &message.payload),
        }
    }

    fn dispatch(&mut self, topic: &str, payload: &[u8]) {
        for subscription in self.subscriptions.matching(topic) {
            match subscription.mode {
                DispatchMode::Immediate => self.invoke(&subscription.callback, topic, payload),
                DispatchMode::Deferred => {
                    let outcome = self.deferred.push(Deferred {
                        topic: topic.to_owned(),
                        payload: payload.to_vec(),
                        callback: subscription.callback,
                    });
                    if matches!(outcome, Enqueued::DroppedOldest { episode_start: true }) {
                        let message = format!(
                            "deferred queue full at {}, dropping oldest messages",
                            self.deferred.capacity()
                        );
                        self.emit_diagnostic("deferred_overflow", &message);
                    }
                }
            }
        }
    }

    fn invoke(&mut self, callback: &Callback, topic: &str, payload: &[u8]) {
        let result = guard(FaultKind::Plugin, "callback_error", || {
            let mut callback = callback
                .try_borrow_mut()
                .map_err(|_| anyhow!("callback re-entered while still running"))?;
            (&mut *callback)(self, topic, payload)
        });

        if let Err(fault) = result {
            let fault = Fault::plugin(fault.code, format!("{topic}: {}", fault.message));
            self.report(&fault);
        }
    }

    /// Run up to `deferred_per_tick` queued callbacks in arrival order.
    pub fn run_deferred(&mut self) -> usize {
        let mut ran = 0;
        while ran < self.settings.deferred_per_tick {
            let Some(item) = self.deferred.pop() else {
                break;
            };
            self.invoke(&item.callback, &item.topic, &item.payload);
            ran += 1;
        }
        ran
    }

    pub fn take_command(&mut self) -> Option<SystemCommand> {
        self.commands.pop_front()
    }

    /// Heartbeat and time-based log flush. Heartbeats are skipped, not
    /// queued, while there is no session.
    pub fn housekeeping(&mut self) {
        let now = self.now();

        if self.has_session() {
            let due = self
                .last_heartbeat_ms
                .is_none_or(|last| elapsed_ms(now, last) >= duration_ms(self.settings.heartbeat_interval));
            if due {
                self.publish_health(HEALTH_ONLINE);
                self.last_heartbeat_ms = Some(now);
            }
        }

        let entries = self.log.poll(now);
        self.ship_log(entries);
    }

    /// Log a fault locally and publish it as a (rate limited) diagnostic.
    pub fn report(&mut self, fault: &Fault) {
        self.faults += 1;
        error!(kind = %fault.kind, code = %fault.code, "{}", fault.message);
        self.emit_diagnostic(&fault.code, &fault.message);
    }

    /// Faults reported since the last call
    pub fn take_fault_count(&mut self) -> u32 {
        std::mem::take(&mut self.faults)
    }

    fn emit_diagnostic(&mut self, code: &str, message: &str) {
        let now = self.now();
        let Some(repeats) = self.throttle.check(code, message, now) else {
            debug!(code, "Diagnostic suppressed");
            return;
        };

        let diagnostic = Diagnostic {
            error: code.to_owned(),
            message: message.to_owned(),
            timestamp: now,
            device_id: self.identity.device_id.clone(),
            repeats: (repeats > 0).then_some(repeats),
        };

        let payload = match serde_json::to_vec(&diagnostic) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to serialize diagnostic: {e}");
                return;
            }
        };

        if !self.publish(&self.topics.sos(), &payload, false) {
            debug!(code, "No session, diagnostic logged only");
        }
    }

    pub fn publish_status(&mut self, status: &str) -> bool {
        self.publish(&self.topics.status(), status.as_bytes(), false)
    }

    /// Health is retained so late subscribers see the current state.
    pub fn publish_health(&mut self, health: &str) -> bool {
        self.link.publish(
            &self.topics.health(),
            health.as_bytes(),
            true,
            QoS::AtLeastOnce,
        )
    }

    pub fn log_as(&mut self, level: LogLevel, component: &str, message: &str) {
        let now = self.now();
        let entries = self.log.record(level, component, message, now);
        self.ship_log(entries);
    }

    fn ship_log(&mut self, entries: Vec<LogEntry>) {
        if entries.is_empty() {
            return;
        }
        if !self.has_session() {
            debug!(count = entries.len(), "No session, dropping device log entries");
            return;
        }

        let topic = self.topics.log();
        for entry in entries {
            match serde_json::to_vec(&entry) {
                Ok(payload) => {
                    self.publish(&topic, &payload, false);
                }
                Err(e) => warn!("Failed to serialize log entry: {e}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Rig;
    use std::cell::Cell;

    #[test]
    fn test_ready_announces_and_arms_will() {
        let rig = Rig::connected();

        assert_eq!(rig.bus.texts_on(&rig.topic("health")), vec!["online"]);
        assert_eq!(rig.bus.texts_on(&rig.topic("boot")).len(), 1);
        assert_eq!(
            rig.bus.texts_on(&rig.topic("version")),
            vec![env!("CARGO_PKG_VERSION")]
        );
        assert!(rig.bus.published_on(&rig.topic("version"))[0].retain);

        let will = rig.bus.last_will().unwrap();
        assert_eq!(will.topic, rig.topic("health"));
        assert_eq!(will.payload, b"offline");
        assert!(will.retain);

        assert_eq!(
            rig.bus.subscriptions_in_session(1),
            vec![rig.topic("update"), rig.topic("ping")]
        );
    }

    #[test]
    fn test_system_topic_claimed_by_app_is_subscribed_once() {
        let mut rig = Rig::new();
        let ping = rig.topic("ping");
        rig.runtime
            .subscribe(&ping, DispatchMode::Immediate, |_, _, _| Ok(()));
        rig.runtime
            .subscribe(&ping, DispatchMode::Deferred, |_, _, _| Ok(()));

        rig.runtime.ensure_network();
        rig.runtime.ensure_bus();

        assert_eq!(
            rig.bus.subscriptions_in_session(1),
            vec![rig.topic("update"), ping.clone()]
        );

        // Claiming it again during the live session adds nothing either
        rig.runtime.unsubscribe(&ping);
        rig.runtime
            .subscribe(&ping, DispatchMode::Immediate, |_, _, _| Ok(()));
        assert_eq!(rig.bus.subscriptions_in_session(1).len(), 2);
    }

    #[test]
    fn test_subscriptions_reapplied_after_reconnect() {
        let mut rig = Rig::connected();
        rig.runtime
            .subscribe("home/garage/+/set", DispatchMode::Immediate, |_, _, _| Ok(()));
        rig.runtime
            .subscribe("home/garage/light", DispatchMode::Deferred, |_, _, _| Ok(()));

        rig.bus.drop_session();
        rig.runtime.pump();
        assert!(rig.runtime.ensure_bus());

        let second = rig.bus.subscriptions_in_session(2);
        assert_eq!(second.len(), 4);
        for filter in ["home/garage/+/set", "home/garage/light"] {
            assert_eq!(second.iter().filter(|t| *t == filter).count(), 1);
        }
        assert_eq!(rig.runtime.connectivity().epoch, 2);
    }

    #[test]
    fn test_ping_answered_and_never_forwarded() {
        let mut rig = Rig::connected();
        let seen = Rc::new(Cell::new(0));
        let counter = Rc::clone(&seen);
        rig.runtime.subscribe("#", DispatchMode::Immediate, move |_, _, _| {
            counter.set(counter.get() + 1);
            Ok(())
        });

        rig.bus.inject(&rig.topic("ping"), b"");
        rig.bus.inject(&rig.topic("update"), br#"{"files":[]}"#);
        rig.runtime.pump();

        assert_eq!(seen.get(), 0);
        assert_eq!(rig.bus.texts_on(&rig.topic("status")), vec!["alive"]);
        assert_eq!(
            rig.runtime.take_command(),
            Some(SystemCommand::Update(br#"{"files":[]}"#.to_vec()))
        );
        assert_eq!(rig.runtime.take_command(), None);
    }

    #[test]
    fn test_immediate_callbacks_run_in_arrival_order() {
        let mut rig = Rig::connected();
        let order = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&order);
        rig.runtime
            .subscribe("sensors/#", DispatchMode::Immediate, move |_, topic, payload| {
                sink.borrow_mut()
                    .push(format!("{topic}={}", String::from_utf8_lossy(payload)));
                Ok(())
            });

        rig.bus.inject("sensors/a", b"1");
        rig.bus.inject("sensors/b", b"2");
        rig.bus.inject("other", b"3");
        rig.runtime.pump();

        assert_eq!(*order.borrow(), vec!["sensors/a=1", "sensors/b=2"]);
    }

    #[test]
    fn test_deferred_runs_bounded_per_tick_in_fifo_order() {
        let mut rig = Rig::connected();
        let order = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&order);
        rig.runtime
            .subscribe("q", DispatchMode::Deferred, move |_, _, payload| {
                sink.borrow_mut().push(payload[0]);
                Ok(())
            });

        for i in 0..6u8 {
            rig.bus.inject("q", &[i]);
        }
        rig.runtime.pump();
        assert!(order.borrow().is_empty());

        assert_eq!(rig.runtime.run_deferred(), 4);
        assert_eq!(*order.borrow(), vec![0, 1, 2, 3]);
        assert_eq!(rig.runtime.run_deferred(), 2);
        assert_eq!(*order.borrow(), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(rig.runtime.run_deferred(), 0);
    }

    #[test]
    fn test_failing_callback_is_reported_and_does_not_block_queue() {
        let mut rig = Rig::connected();
        let ran = Rc::new(Cell::new(0));
        let counter = Rc::clone(&ran);
        rig.runtime
            .subscribe("bad", DispatchMode::Deferred, |_, _, _| panic!("bad handler"));
        rig.runtime
            .subscribe("good", DispatchMode::Deferred, move |_, _, _| {
                counter.set(counter.get() + 1);
                Ok(())
            });

        rig.bus.inject("bad", b"");
        rig.bus.inject("good", b"");
        rig.runtime.pump();
        rig.runtime.run_deferred();

        assert_eq!(ran.get(), 1);
        assert_eq!(rig.runtime.take_fault_count(), 1);
        let sos = rig.bus.published_on(&rig.topic("sos"));
        assert_eq!(sos.len(), 1);
        let diagnostic: Diagnostic = serde_json::from_slice(&sos[0].payload).unwrap();
        assert_eq!(diagnostic.error, "callback_error");
        assert!(diagnostic.message.contains("bad handler"));
        assert_eq!(diagnostic.device_id, "test-device");
    }

    #[test]
    fn test_callback_may_mutate_table_reentrantly() {
        let mut rig = Rig::connected();
        rig.runtime
            .subscribe("once", DispatchMode::Immediate, |rt, topic, _| {
                rt.unsubscribe(topic);
                rt.subscribe("after", DispatchMode::Immediate, |_, _, _| Ok(()));
                Ok(())
            });

        rig.bus.inject("once", b"");
        rig.bus.inject("once", b"");
        rig.runtime.pump();

        assert!(!rig.runtime.subscriptions().contains("once"));
        assert!(rig.runtime.subscriptions().contains("after"));
        assert_eq!(rig.runtime.take_fault_count(), 0);
        assert!(rig.bus.subscriptions_in_session(1).contains(&"after".to_owned()));
    }

    #[test]
    fn test_queued_message_survives_unsubscribe() {
        let mut rig = Rig::connected();
        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        rig.runtime
            .subscribe("late", DispatchMode::Deferred, move |_, _, _| {
                flag.set(true);
                Ok(())
            });

        rig.bus.inject("late", b"");
        rig.runtime.pump();
        rig.runtime.unsubscribe("late");
        rig.runtime.run_deferred();

        assert!(ran.get());
    }

    #[test]
    fn test_deferred_overflow_reports_once_per_episode() {
        let settings = RuntimeSettings {
            deferred_capacity: 2,
            ..RuntimeSettings::default()
        };
        let mut rig = Rig::with(crate::testing::test_identity(), settings);
        rig.runtime.ensure_network();
        rig.runtime.ensure_bus();
        rig.runtime
            .subscribe("q", DispatchMode::Deferred, |_, _, _| Ok(()));

        for _ in 0..5 {
            rig.bus.inject("q", b"");
        }
        rig.runtime.pump();

        assert_eq!(rig.runtime.deferred_len(), 2);
        let sos = rig.bus.texts_on(&rig.topic("sos"));
        assert_eq!(sos.len(), 1);
        assert!(sos[0].contains("deferred_overflow"));
    }

    #[test]
    fn test_publish_without_session_is_not_buffered() {
        let mut rig = Rig::new();
        assert!(!rig.runtime.publish("x", b"1", false));

        rig.runtime.ensure_network();
        rig.runtime.ensure_bus();
        assert!(rig.bus.published_on("x").is_empty());
    }

    #[test]
    fn test_heartbeat_interval_and_skip_without_session() {
        let mut rig = Rig::connected();
        let health = rig.topic("health");
        rig.bus.clear_published();

        rig.runtime.housekeeping();
        assert!(rig.bus.published_on(&health).is_empty());

        rig.clock.advance(Duration::from_secs(30));
        rig.runtime.housekeeping();
        assert_eq!(rig.bus.texts_on(&health), vec!["online"]);

        rig.bus.drop_session();
        rig.clock.advance(Duration::from_secs(60));
        rig.runtime.housekeeping();
        assert_eq!(rig.bus.published_on(&health).len(), 1);
    }

    #[test]
    fn test_repeated_fault_is_rate_limited() {
        let mut rig = Rig::connected();
        let fault = Fault::plugin("app_tick_failed", "boom");
        for _ in 0..5 {
            rig.runtime.report(&fault);
        }
        assert_eq!(rig.bus.published_on(&rig.topic("sos")).len(), 1);
        assert_eq!(rig.runtime.take_fault_count(), 5);

        rig.clock.advance(Duration::from_secs(300));
        rig.runtime.report(&fault);
        let sos = rig.bus.published_on(&rig.topic("sos"));
        let diagnostic: Diagnostic = serde_json::from_slice(&sos[1].payload).unwrap();
        assert_eq!(diagnostic.repeats, Some(4));
    }

    #[test]
    fn test_error_log_ships_immediately() {
        let mut rig = Rig::connected();
        rig.runtime.log(LogLevel::Info, "calibrated");
        assert!(rig.bus.published_on(&rig.topic("log")).is_empty());

        rig.runtime.log(LogLevel::Error, "sensor lost");
        let shipped = rig.bus.published_on(&rig.topic("log"));
        assert_eq!(shipped.len(), 2);
        let last: LogEntry = serde_json::from_slice(&shipped[1].payload).unwrap();
        assert_eq!(last.level, LogLevel::Error);
        assert_eq!(last.component, "app");
    }

    #[test]
    fn test_missing_wifi_is_reported_as_configuration() {
        let mut identity = crate::testing::test_identity();
        identity.wifi.ssid = None;
        let mut rig = Rig::with(identity, RuntimeSettings::default());
        rig.network.set_up(false);

        assert!(!rig.runtime.ensure_network());
        assert!(!rig.runtime.ensure_network());
        assert_eq!(rig.runtime.take_fault_count(), 2);
        assert_eq!(rig.network.joins(), 0);
    }
}
