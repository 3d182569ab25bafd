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

//! Network link and bus session state machine.
//!
//! Both `ensure_*` calls are idempotent and cheap when the link is up. A failed
//! attempt sleeps a fixed backoff through the clock before returning, so the
//! loop never spins hot against a dead access point or broker.

use crate::bus::{BusClient, InboundMessage, LastWill, NetworkLink, QoS};
use crate::clock::Clock;
use crate::fault::Fault;
use crate::identity::{BusEndpoint, WifiCredentials};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_NETWORK_BACKOFF: Duration = Duration::from_millis(500);
pub const DEFAULT_BUS_BACKOFF: Duration = Duration::from_millis(300);
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Subscriptions and announcements done for the current session
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectivityState {
    pub network: NetworkState,
    pub bus: BusState,
    /// Incremented on every transition into `BusState::Ready`
    pub epoch: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivitySettings {
    pub network_backoff: Duration,
    pub bus_backoff: Duration,
    pub join_timeout: Duration,
}

impl Default for ConnectivitySettings {
    fn default() -> Self {
        Self {
            network_backoff: DEFAULT_NETWORK_BACKOFF,
            bus_backoff: DEFAULT_BUS_BACKOFF,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
        }
    }
}

pub struct Connectivity {
    network: Box<dyn NetworkLink>,
    bus: Box<dyn BusClient>,
    state: ConnectivityState,
    settings: ConnectivitySettings,
}

impl fmt::Debug for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connectivity")
            .field("state", &self.state)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Connectivity {
    pub fn new(
        network: Box<dyn NetworkLink>,
        bus: Box<dyn BusClient>,
        settings: ConnectivitySettings,
    ) -> Self {
        Self {
            network,
            bus,
            state: ConnectivityState::default(),
            settings,
        }
    }

    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    pub fn ensure_network(
        &mut self,
        wifi: &WifiCredentials,
        clock: &dyn Clock,
    ) -> Result<(), Fault> {
        if self.network.is_connected() {
            if self.state.network != NetworkState::Connected {
                info!("Network link up");
                self.state.network = NetworkState::Connected;
            }
            return Ok(());
        }

        if self.state.network == NetworkState::Connected {
            warn!("Network link lost");
        }
        self.state.network = NetworkState::Disconnected;

        let (Some(ssid), Some(password)) = (wifi.ssid.as_deref(), wifi.password.as_deref()) else {
            clock.sleep(self.settings.network_backoff);
            return Err(Fault::configuration(
                "wifi_config_missing",
                "network ssid or password not configured",
            ));
        };

        debug!(ssid, "Joining network");
        self.state.network = NetworkState::Connecting;
        if self
            .network
            .connect(ssid, password, self.settings.join_timeout)
            && self.network.is_connected()
        {
            info!(ssid, "Network joined");
            self.state.network = NetworkState::Connected;
            return Ok(());
        }

        self.state.network = NetworkState::Disconnected;
        clock.sleep(self.settings.network_backoff);
        Err(Fault::connectivity(
            "wifi_connect_failed",
            format!("could not join network '{ssid}'"),
        ))
    }

    /// Bring the bus session to `Ready`.
    ///
    /// Returns `Ok(true)` only on the call that made the transition; the
    /// caller publishes its announcements then. `topics` is evaluated only in
    /// that case and each returned filter is subscribed exactly once.
    pub fn ensure_bus(
        &mut self,
        endpoint: &BusEndpoint,
        last_will: LastWill,
        topics: impl FnOnce() -> Vec<String>,
        clock: &dyn Clock,
    ) -> Result<bool, Fault> {
        if self.state.network != NetworkState::Connected {
            self.state.bus = BusState::Disconnected;
            return Ok(false);
        }

        if matches!(self.state.bus, BusState::Connected | BusState::Ready) {
            if self.bus.is_connected() {
                return Ok(false);
            }
            warn!("Bus session dropped");
            self.state.bus = BusState::Disconnected;
        }

        let Some(host) = endpoint.host.as_deref() else {
            clock.sleep(self.settings.bus_backoff);
            return Err(Fault::configuration(
                "mqtt_config_missing",
                "bus host not configured",
            ));
        };

        // Must be in place before the broker sees the session.
        self.bus.set_last_will(last_will);

        self.state.bus = BusState::Connecting;
        if !self.bus.connect() {
            self.state.bus = BusState::Disconnected;
            clock.sleep(self.settings.bus_backoff);
            return Err(Fault::connectivity(
                "mqtt_connect_failed",
                format!("could not connect to {host}:{}", endpoint.port),
            ));
        }
        self.state.bus = BusState::Connected;

        let topics = topics();
        let mut failed = 0usize;
        for topic in &topics {
            if !self.bus.subscribe(topic) {
                warn!(topic = %topic, "Subscribe failed");
                failed += 1;
            }
        }

        self.state.bus = BusState::Ready;
        self.state.epoch += 1;
        info!(
            host,
            port = endpoint.port,
            epoch = self.state.epoch,
            subscriptions = topics.len(),
            failed,
            "Bus session ready"
        );
        Ok(true)
    }

    pub fn has_session(&self) -> bool {
        self.state.bus == BusState::Ready && self.bus.is_connected()
    }

    /// Subscribe during an established session. No-op without one.
    pub fn subscribe(&mut self, topic: &str) -> bool {
        self.has_session() && self.bus.subscribe(topic)
    }

    pub fn publish(&mut self, topic: &str, payload: &[u8], retain: bool, qos: QoS) -> bool {
        if !self.has_session() {
            return false;
        }
        self.bus.publish(topic, payload, retain, qos)
    }

    /// Drain inbound messages. A session found dead afterwards is marked
    /// disconnected so the next `ensure_bus` reconnects.
    pub fn pump(&mut self) -> Vec<InboundMessage> {
        if !matches!(self.state.bus, BusState::Connected | BusState::Ready) {
            return Vec::new();
        }

        let messages = self.bus.check_messages();
        if !self.bus.is_connected() {
            warn!("Bus session dropped while pumping");
            self.state.bus = BusState::Disconnected;
        }
        messages
    }
}
