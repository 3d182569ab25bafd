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

//! Deterministic doubles for the clock, network link and bus client.
//!
//! The doubles are cheap handles over shared state, so a test keeps one
//! clone to inspect while the runtime owns another.

use crate::bus::{BusClient, InboundMessage, LastWill, NetworkLink, QoS};
use crate::clock::{Clock, duration_ms};
use crate::identity::{BusEndpoint, DeviceIdentity, WifiCredentials};
use crate::runtime::{Runtime, RuntimeSettings};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

/// Clock that only moves when slept on or advanced
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<u64>,
    slept: Cell<u64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get() + duration_ms(duration));
    }

    /// Total milliseconds spent in `sleep`
    pub fn slept_ms(&self) -> u64 {
        self.slept.get()
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        let ms = duration_ms(duration);
        self.slept.set(self.slept.get() + ms);
        self.now.set(self.now.get() + ms);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
    pub qos: QoS,
}

impl Published {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

#[derive(Debug, Default)]
struct BusInner {
    connected: bool,
    connects: u32,
    failing_connects: u32,
    subscriptions: Vec<(u32, String)>,
    published: Vec<Published>,
    last_will: Option<LastWill>,
    inbox: VecDeque<InboundMessage>,
}

/// In-memory bus client. Subscriptions are recorded per session number.
#[derive(Debug, Clone, Default)]
pub struct MemoryBus {
    inner: Rc<RefCell<BusInner>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message for the next `check_messages`
    pub fn inject(&self, topic: &str, payload: &[u8]) {
        self.inner
            .borrow_mut()
            .inbox
            .push_back(InboundMessage::new(topic, payload));
    }

    pub fn drop_session(&self) {
        self.inner.borrow_mut().connected = false;
    }

    pub fn fail_next_connects(&self, count: u32) {
        self.inner.borrow_mut().failing_connects = count;
    }

    pub fn connects(&self) -> u32 {
        self.inner.borrow().connects
    }

    pub fn last_will(&self) -> Option<LastWill> {
        self.inner.borrow().last_will.clone()
    }

    /// Filters subscribed during the `session`-th successful connect
    pub fn subscriptions_in_session(&self, session: u32) -> Vec<String> {
        self.inner
            .borrow()
            .subscriptions
            .iter()
            .filter(|(s, _)| *s == session)
            .map(|(_, topic)| topic.clone())
            .collect()
    }

    pub fn published(&self) -> Vec<Published> {
        self.inner.borrow().published.clone()
    }

    pub fn published_on(&self, topic: &str) -> Vec<Published> {
        self.inner
            .borrow()
            .published
            .iter()
            .filter(|p| p.topic == topic)
            .cloned()
            .collect()
    }

    /// Payloads published on `topic`, as text
    pub fn texts_on(&self, topic: &str) -> Vec<String> {
        self.published_on(topic).iter().map(Published::text).collect()
    }

    pub fn clear_published(&self) {
        self.inner.borrow_mut().published.clear();
    }
}

impl BusClient for MemoryBus {
    fn connect(&mut self) -> bool {
        let mut inner = self.inner.borrow_mut();
        if inner.failing_connects > 0 {
            inner.failing_connects -= 1;
            return false;
        }
        inner.connected = true;
        inner.connects += 1;
        true
    }

    fn is_connected(&self) -> bool {
        self.inner.borrow().connected
    }

    fn subscribe(&mut self, topic: &str) -> bool {
        let mut inner = self.inner.borrow_mut();
        if !inner.connected {
            return false;
        }
        let session = inner.connects;
        inner.subscriptions.push((session, topic.to_owned()));
        true
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool, qos: QoS) -> bool {
        let mut inner = self.inner.borrow_mut();
        if !inner.connected {
            return false;
        }
        inner.published.push(Published {
            topic: topic.to_owned(),
            payload: payload.to_vec(),
            retain,
            qos,
        });
        true
    }

    fn set_last_will(&mut self, will: LastWill) {
        self.inner.borrow_mut().last_will = Some(will);
    }

    fn check_messages(&mut self) -> Vec<InboundMessage> {
        let mut inner = self.inner.borrow_mut();
        if !inner.connected {
            return Vec::new();
        }
        inner.inbox.drain(..).collect()
    }
}

#[derive(Debug, Default)]
struct NetworkInner {
    up: bool,
    joins: u32,
    failing_joins: u32,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    inner: Rc<RefCell<NetworkInner>>,
}

impl MemoryNetwork {
    pub fn up() -> Self {
        let network = Self::default();
        network.inner.borrow_mut().up = true;
        network
    }

    pub fn down() -> Self {
        Self::default()
    }

    pub fn set_up(&self, up: bool) {
        self.inner.borrow_mut().up = up;
    }

    pub fn fail_next_joins(&self, count: u32) {
        self.inner.borrow_mut().failing_joins = count;
    }

    pub fn joins(&self) -> u32 {
        self.inner.borrow().joins
    }
}

impl NetworkLink for MemoryNetwork {
    fn is_connected(&self) -> bool {
        self.inner.borrow().up
    }

    fn connect(&mut self, _ssid: &str, _password: &str, _timeout: Duration) -> bool {
        let mut inner = self.inner.borrow_mut();
        inner.joins += 1;
        if inner.failing_joins > 0 {
            inner.failing_joins -= 1;
            return false;
        }
        inner.up = true;
        true
    }
}

/// Identity with every credential present
pub fn test_identity() -> DeviceIdentity {
    DeviceIdentity {
        device_id: "test-device".to_owned(),
        namespace: "home/system".to_owned(),
        wifi: WifiCredentials {
            ssid: Some("attic".to_owned()),
            password: Some("pw".to_owned()),
        },
        bus: BusEndpoint {
            host: Some("broker.local".to_owned()),
            ..BusEndpoint::default()
        },
    }
}

/// A runtime wired to in-memory doubles, plus handles to inspect them
#[derive(Debug)]
pub struct Rig {
    pub runtime: Runtime,
    pub bus: MemoryBus,
    pub network: MemoryNetwork,
    pub clock: Rc<ManualClock>,
}

impl Rig {
    pub fn new() -> Self {
        Self::with(test_identity(), RuntimeSettings::default())
    }

    pub fn with(identity: DeviceIdentity, settings: RuntimeSettings) -> Self {
        let bus = MemoryBus::new();
        let network = MemoryNetwork::up();
        let clock = Rc::new(ManualClock::new());
        let runtime = Runtime::new(
            identity,
            settings,
            clock.clone(),
            Box::new(network.clone()),
            Box::new(bus.clone()),
        );
        Self {
            runtime,
            bus,
            network,
            clock,
        }
    }

    /// Rig with the bus session already `Ready`
    pub fn connected() -> Self {
        let mut rig = Self::new();
        rig.runtime.ensure_network();
        rig.runtime.ensure_bus();
        rig
    }

    /// `<ns>/<device_id>/<leaf>` for this rig's identity
    pub fn topic(&self, leaf: &str) -> String {
        self.runtime.topics().topic(leaf)
    }
}

impl Default for Rig {
    fn default() -> Self {
        Self::new()
    }
}
