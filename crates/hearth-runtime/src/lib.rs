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

//! Hearth device runtime
//!
//! Everything between the bootstrap loop and the replaceable application.
//!
//! ## Architecture
//!
//! - **Connectivity**: network link and bus session state machine
//! - **Runtime**: the application's only window onto the device; routes bus
//!   messages to subscriptions, immediately or deferred
//! - **Supervisor**: loads, initializes, ticks and quiesces the application
//! - **Diagnostics**: fault taxonomy, rate-limited SOS reports, device log
//!
//! ## Threading
//!
//! Single-threaded and cooperative. State is shared through `Rc`/`RefCell`;
//! nothing here is `Send`. The only blocking is the bounded sleeps routed
//! through [`Clock`].
//!
//! ## Application modules
//!
//! Applications implement [`AppModule`] and declare their hooks through
//! [`Capabilities`]. A [`ModuleLoader`] produces the module; compiled-in
//! modules are registered in a [`ModuleRegistry`].

pub mod builtin;
pub mod bus;
pub mod clock;
pub mod connectivity;
pub mod device_log;
pub mod diagnostics;
pub mod dispatch;
pub mod fault;
pub mod identity;
pub mod plugin;
pub mod runtime;
pub mod supervisor;
pub mod topics;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use builtin::{ModuleRegistry, StaticLoader, UptimeModule};
pub use bus::{BusClient, InboundMessage, LastWill, NetworkLink, QoS};
pub use clock::{Clock, MonotonicClock};
pub use connectivity::{BusState, ConnectivitySettings, ConnectivityState, NetworkState};
pub use device_log::{LogEntry, LogLevel};
pub use diagnostics::Diagnostic;
pub use dispatch::DispatchMode;
pub use fault::{Fault, FaultKind};
pub use identity::{BusEndpoint, DeviceIdentity, WifiCredentials};
pub use plugin::{AppModule, Capabilities, Entrypoint, ModuleLoader};
pub use runtime::{Runtime, RuntimeSettings, SystemCommand};
pub use supervisor::{PluginState, Supervisor};
pub use topics::SystemTopics;
