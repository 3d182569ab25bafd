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

//! Seams to the network link and the pub/sub client.
//!
//! Both are supplied by the host. Neither trait returns errors: a failed
//! operation is a `false`, and the connectivity manager decides what that
//! means for the device.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QoS {
    #[default]
    AtMostOnce,
    AtLeastOnce,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastWill {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
    pub qos: QoS,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Minimal pub/sub client
pub trait BusClient {
    /// Open a session. Blocks at most for the client's own connect timeout.
    fn connect(&mut self) -> bool;

    /// Whether the session opened by the last `connect` is still alive
    fn is_connected(&self) -> bool;

    fn subscribe(&mut self, topic: &str) -> bool;

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool, qos: QoS) -> bool;

    /// Takes effect on the next `connect`
    fn set_last_will(&mut self, will: LastWill);

    /// Non-blocking pump; returns whatever arrived since the last call, in
    /// arrival order.
    fn check_messages(&mut self) -> Vec<InboundMessage>;
}

/// Station-mode network interface
pub trait NetworkLink {
    fn is_connected(&self) -> bool;

    /// Join the network, giving up after `timeout`.
    fn connect(&mut self, ssid: &str, password: &str, timeout: Duration) -> bool;
}
