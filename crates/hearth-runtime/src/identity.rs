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

//! Who the device is and how it reaches the network. Loaded once at boot.

use std::fmt;

pub const DEFAULT_NAMESPACE: &str = "home/system";
pub const DEFAULT_DEVICE_ID: &str = "device-unknown";
pub const DEFAULT_BUS_PORT: u16 = 1883;
pub const DEFAULT_KEEPALIVE_SECS: u16 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub device_id: String,
    /// Topic namespace, system topics live under `<namespace>/<device_id>/`
    pub namespace: String,
    pub wifi: WifiCredentials,
    pub bus: BusEndpoint,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            device_id: DEFAULT_DEVICE_ID.to_owned(),
            namespace: DEFAULT_NAMESPACE.to_owned(),
            wifi: WifiCredentials::default(),
            bus: BusEndpoint::default(),
        }
    }
}

#[derive(Clone, Default, PartialEq, Eq)]
pub struct WifiCredentials {
    pub ssid: Option<String>,
    pub password: Option<String>,
}

impl WifiCredentials {
    pub fn is_complete(&self) -> bool {
        self.ssid.is_some() && self.password.is_some()
    }
}

impl fmt::Debug for WifiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WifiCredentials")
            .field("ssid", &self.ssid)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct BusEndpoint {
    pub host: Option<String>,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub client_id: Option<String>,
    pub keepalive_secs: u16,
}

impl Default for BusEndpoint {
    fn default() -> Self {
        Self {
            host: None,
            port: DEFAULT_BUS_PORT,
            user: None,
            password: None,
            client_id: None,
            keepalive_secs: DEFAULT_KEEPALIVE_SECS,
        }
    }
}

impl fmt::Debug for BusEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusEndpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("client_id", &self.client_id)
            .field("keepalive_secs", &self.keepalive_secs)
            .finish()
    }
}
