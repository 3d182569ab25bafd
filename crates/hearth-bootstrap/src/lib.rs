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

//! Hearth bootstrap
//!
//! The immortal part of the device: loads configuration, owns the main
//! loop, applies over-the-air updates and keeps the device reachable no
//! matter what the application does.

pub mod bootstrap;
pub mod config;
pub mod host;
pub mod mqtt;
pub mod signal;

pub use bootstrap::{Bootstrap, BootstrapSettings, Iteration, Restarter};
pub use config::{ConfigError, ConfigWarning, DeviceConfig, SupervisorSettings};
pub use host::{ExecRestart, HostNetwork, LogIndicator, paths_under_root};
pub use mqtt::MqttBus;
pub use signal::{Indicator, Signal};
