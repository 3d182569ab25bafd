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

//! Device configuration.
//!
//! Two layouts are accepted in the same file. The flat one
//! (`wifi_ssid`, `mqtt_host`, ...) predates the nested one
//! (`wifi.ssid`, `mqtt.host`, ...); when both are present the nested value
//! wins. Missing required values fall back to defaults and are returned as
//! [`ConfigWarning`]s for the bootstrap loop to report.

use hearth_runtime::RuntimeSettings;
use hearth_runtime::identity::{
    BusEndpoint, DEFAULT_BUS_PORT, DEFAULT_DEVICE_ID, DEFAULT_KEEPALIVE_SECS, DEFAULT_NAMESPACE,
    DeviceIdentity, WifiCredentials,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "/config/device.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A required value that was missing and replaced by a default
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub field: &'static str,
    pub message: String,
}

impl ConfigWarning {
    /// Diagnostic code, e.g. `config_default_mqtt_host`
    pub fn code(&self) -> String {
        format!("config_default_{}", self.field)
    }
}

/// Supervisor tunables, the optional `supervisor` block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorSettings {
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    /// Pump steps spent in help mode after an unhandled fault
    #[serde(default = "default_help_steps")]
    pub help_steps: u32,

    #[serde(default = "default_help_step_ms")]
    pub help_step_ms: u64,

    #[serde(default = "default_quiesce_timeout_ms")]
    pub quiesce_timeout_ms: u64,

    #[serde(default = "default_deferred_capacity")]
    pub deferred_capacity: usize,

    #[serde(default = "default_deferred_per_tick")]
    pub deferred_per_tick: usize,

    #[serde(default = "default_diagnostic_repeat_secs")]
    pub diagnostic_repeat_secs: u64,

    /// Built-in application module to run
    #[serde(default = "default_module")]
    pub module: String,
}

fn default_heartbeat_interval_secs() -> u64 {
    30
}

fn default_help_steps() -> u32 {
    200
}

fn default_help_step_ms() -> u64 {
    100
}

fn default_quiesce_timeout_ms() -> u64 {
    2000
}

fn default_deferred_capacity() -> usize {
    32
}

fn default_deferred_per_tick() -> usize {
    4
}

fn default_diagnostic_repeat_secs() -> u64 {
    300
}

fn default_module() -> String {
    "uptime".to_owned()
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            help_steps: default_help_steps(),
            help_step_ms: default_help_step_ms(),
            quiesce_timeout_ms: default_quiesce_timeout_ms(),
            deferred_capacity: default_deferred_capacity(),
            deferred_per_tick: default_deferred_per_tick(),
            diagnostic_repeat_secs: default_diagnostic_repeat_secs(),
            module: default_module(),
        }
    }
}

impl SupervisorSettings {
    pub fn help_step(&self) -> Duration {
        Duration::from_millis(self.help_step_ms)
    }

    pub fn quiesce_timeout(&self) -> Duration {
        Duration::from_millis(self.quiesce_timeout_ms)
    }
}

/// `mqtt.port` / `mqtt_port` may be written as a number or a string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(i64),
    Text(String),
}

impl PortValue {
    fn to_port(&self) -> Option<u16> {
        let port = match self {
            Self::Number(n) => u16::try_from(*n).ok()?,
            Self::Text(s) => s.trim().parse::<u16>().ok()?,
        };
        (port != 0).then_some(port)
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawWifi {
    ssid: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMqtt {
    host: Option<String>,
    port: Option<PortValue>,
    user: Option<String>,
    password: Option<String>,
    client_id: Option<String>,
    keepalive_secs: Option<u16>,
}

/// File layout as written on the device, both schemas at once
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    device_id: Option<String>,
    namespace: Option<String>,

    wifi_ssid: Option<String>,
    wifi_password: Option<String>,
    mqtt_host: Option<String>,
    mqtt_port: Option<PortValue>,
    mqtt_user: Option<String>,
    mqtt_password: Option<String>,

    #[serde(default)]
    wifi: RawWifi,
    #[serde(default)]
    mqtt: RawMqtt,
    #[serde(default)]
    supervisor: SupervisorSettings,
}

#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub identity: DeviceIdentity,
    pub supervisor: SupervisorSettings,
    pub warnings: Vec<ConfigWarning>,
}

impl DeviceConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(
            path = %path.display(),
            device_id = %config.identity.device_id,
            "✅ Loaded device configuration"
        );
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let raw: RawConfig = serde_json::from_str(text)?;
        Ok(Self::from_raw(raw))
    }

    /// Configuration used when the file can't be loaded at all
    pub fn defaults() -> Self {
        Self::from_raw(RawConfig::default())
    }

    fn from_raw(raw: RawConfig) -> Self {
        let mut warnings = Vec::new();

        let device_id = non_empty(raw.device_id).unwrap_or_else(|| {
            let fallback = default_device_id();
            warnings.push(ConfigWarning {
                field: "device_id",
                message: format!("device_id not configured, using '{fallback}'"),
            });
            fallback
        });

        let namespace = non_empty(raw.namespace)
            .map(|ns| ns.trim_matches('/').to_owned())
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_owned());

        let wifi = WifiCredentials {
            ssid: non_empty(raw.wifi.ssid).or_else(|| non_empty(raw.wifi_ssid)),
            password: non_empty(raw.wifi.password).or_else(|| non_empty(raw.wifi_password)),
        };
        if wifi.ssid.is_none() {
            warnings.push(ConfigWarning {
                field: "wifi_ssid",
                message: "network ssid not configured".to_owned(),
            });
        }

        let port = match raw.mqtt.port.or(raw.mqtt_port) {
            None => DEFAULT_BUS_PORT,
            Some(value) => value.to_port().unwrap_or_else(|| {
                warn!(?value, "Invalid bus port, using {DEFAULT_BUS_PORT}");
                DEFAULT_BUS_PORT
            }),
        };

        let bus = BusEndpoint {
            host: non_empty(raw.mqtt.host).or_else(|| non_empty(raw.mqtt_host)),
            port,
            user: non_empty(raw.mqtt.user).or_else(|| non_empty(raw.mqtt_user)),
            password: non_empty(raw.mqtt.password).or_else(|| non_empty(raw.mqtt_password)),
            client_id: non_empty(raw.mqtt.client_id),
            keepalive_secs: raw.mqtt.keepalive_secs.unwrap_or(DEFAULT_KEEPALIVE_SECS),
        };
        if bus.host.is_none() {
            warnings.push(ConfigWarning {
                field: "mqtt_host",
                message: "bus host not configured".to_owned(),
            });
        }

        for warning in &warnings {
            warn!(field = warning.field, "{}", warning.message);
        }

        Self {
            identity: DeviceIdentity {
                device_id,
                namespace,
                wifi,
                bus,
            },
            supervisor: raw.supervisor,
            warnings,
        }
    }

    pub fn runtime_settings(&self) -> RuntimeSettings {
        RuntimeSettings {
            heartbeat_interval: Duration::from_secs(self.supervisor.heartbeat_interval_secs),
            deferred_capacity: self.supervisor.deferred_capacity,
            deferred_per_tick: self.supervisor.deferred_per_tick,
            diagnostic_repeat: Duration::from_secs(self.supervisor.diagnostic_repeat_secs),
            ..RuntimeSettings::default()
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn default_device_id() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| fs::read_to_string("/etc/hostname").ok())
        .map(|host| host.trim().to_owned())
        .filter(|host| !host.is_empty())
        .map_or_else(|| DEFAULT_DEVICE_ID.to_owned(), |host| format!("device-{host}"))
}
