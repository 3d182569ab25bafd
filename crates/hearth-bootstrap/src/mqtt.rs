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

//! MQTT bus client on top of the synchronous `rumqttc` client.
//!
//! Every `connect` builds a fresh client and event loop with a clean
//! session. A connection error observed while pumping kills the session;
//! the connectivity manager notices through `is_connected` and reconnects.

use hearth_runtime::bus::{BusClient, InboundMessage, LastWill, QoS};
use hearth_runtime::identity::BusEndpoint;
use rumqttc::{
    Client, ConnectReturnCode, Connection, Event, MqttOptions, Packet, RecvTimeoutError,
    TryRecvError,
};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const MIN_KEEPALIVE: Duration = Duration::from_secs(5);
const REQUEST_CAPACITY: usize = 32;
/// Upper bound on events drained per `check_messages`
const MAX_EVENTS_PER_PUMP: usize = 64;

struct Session {
    client: Client,
    connection: Connection,
}

pub struct MqttBus {
    host: Option<String>,
    port: u16,
    client_id: String,
    credentials: Option<(String, String)>,
    keepalive: Duration,
    connect_timeout: Duration,
    will: Option<LastWill>,
    session: Option<Session>,
}

impl fmt::Debug for MqttBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MqttBus")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("client_id", &self.client_id)
            .field("connected", &self.session.is_some())
            .finish_non_exhaustive()
    }
}

fn to_mqtt_qos(qos: QoS) -> rumqttc::QoS {
    match qos {
        QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
        QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
    }
}

impl MqttBus {
    /// Without a host every `connect` fails; the connectivity manager
    /// reports that as a configuration fault before ever calling it.
    pub fn new(endpoint: &BusEndpoint, device_id: &str) -> Self {
        let credentials = endpoint
            .user
            .clone()
            .map(|user| (user, endpoint.password.clone().unwrap_or_default()));

        Self {
            host: endpoint.host.clone(),
            port: endpoint.port,
            client_id: endpoint
                .client_id
                .clone()
                .unwrap_or_else(|| format!("hearth-{device_id}")),
            credentials,
            keepalive: Duration::from_secs(endpoint.keepalive_secs.into()).max(MIN_KEEPALIVE),
            connect_timeout: CONNECT_TIMEOUT,
            will: None,
            session: None,
        }
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn options(&self, host: &str) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, host, self.port);
        options.set_keep_alive(self.keepalive);
        options.set_clean_session(true);
        if let Some((user, password)) = &self.credentials {
            options.set_credentials(user, password);
        }
        if let Some(will) = &self.will {
            options.set_last_will(rumqttc::LastWill::new(
                &will.topic,
                will.payload.clone(),
                to_mqtt_qos(will.qos),
                will.retain,
            ));
        }
        options
    }

    /// Drive the fresh event loop until the broker acknowledges or the
    /// deadline passes.
    fn await_connack(&self, host: &str, connection: &mut Connection) -> bool {
        let deadline = Instant::now() + self.connect_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(host, "MQTT connect timed out");
                return false;
            }
            match connection.recv_timeout(remaining) {
                Ok(Ok(Event::Incoming(Packet::ConnAck(ack)))) => {
                    if ack.code == ConnectReturnCode::Success {
                        return true;
                    }
                    warn!(code = ?ack.code, "MQTT broker refused connection");
                    return false;
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    warn!(host, "MQTT connect failed: {e}");
                    return false;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
    }

    fn drop_session(&mut self, reason: &str) {
        if self.session.take().is_some() {
            info!(reason, "MQTT session closed");
        }
    }
}

impl BusClient for MqttBus {
    fn connect(&mut self) -> bool {
        self.session = None;
        let Some(host) = self.host.clone() else {
            warn!("MQTT host not configured");
            return false;
        };
        let (client, mut connection) = Client::new(self.options(&host), REQUEST_CAPACITY);
        if !self.await_connack(&host, &mut connection) {
            return false;
        }
        info!(host, port = self.port, client_id = %self.client_id, "✅ MQTT connected");
        self.session = Some(Session { client, connection });
        true
    }

    fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    fn subscribe(&mut self, topic: &str) -> bool {
        let Some(session) = &self.session else {
            return false;
        };
        match session.client.try_subscribe(topic, rumqttc::QoS::AtMostOnce) {
            Ok(()) => true,
            Err(e) => {
                warn!(topic, "MQTT subscribe failed: {e}");
                false
            }
        }
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool, qos: QoS) -> bool {
        let Some(session) = &self.session else {
            return false;
        };
        match session
            .client
            .try_publish(topic, to_mqtt_qos(qos), retain, payload.to_vec())
        {
            Ok(()) => true,
            Err(e) => {
                debug!(topic, "MQTT publish failed: {e}");
                false
            }
        }
    }

    fn set_last_will(&mut self, will: LastWill) {
        self.will = Some(will);
    }

    fn check_messages(&mut self) -> Vec<InboundMessage> {
        let mut messages = Vec::new();
        let mut lost = None;

        if let Some(session) = &mut self.session {
            for _ in 0..MAX_EVENTS_PER_PUMP {
                match session.connection.try_recv() {
                    Ok(Ok(Event::Incoming(Packet::Publish(publish)))) => {
                        messages.push(InboundMessage::new(publish.topic, publish.payload.to_vec()));
                    }
                    Ok(Ok(Event::Incoming(Packet::Disconnect))) => {
                        lost = Some("broker disconnect".to_owned());
                        break;
                    }
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => {
                        lost = Some(e.to_string());
                        break;
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        lost = Some("event loop gone".to_owned());
                        break;
                    }
                }
            }
        }

        if let Some(reason) = lost {
            self.drop_session(&reason);
        }
        messages
    }
}
