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

//! Fault taxonomy shared by every boundary function of the supervisor.
//!
//! Nothing below the bootstrap loop is allowed to unwind into it. Boundary
//! functions return `Result<_, Fault>`, and calls into application code are
//! wrapped in [`guard`], which turns both errors and panics into a `Fault`.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// Missing or invalid configuration and credentials
    Configuration,
    /// Network or bus connection failure
    Connectivity,
    /// Import, initialize, tick, quiesce or callback failure in the application
    Plugin,
    /// Manifest, download, verification or install failure
    Update,
    /// Escaped every inner guard and was caught at the loop boundary
    Unhandled,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configuration => "configuration",
            Self::Connectivity => "connectivity",
            Self::Plugin => "plugin",
            Self::Update => "update",
            Self::Unhandled => "unhandled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} fault ({code}): {message}")]
pub struct Fault {
    pub kind: FaultKind,
    /// Short machine-readable code, published as the `error` field
    pub code: String,
    pub message: String,
}

impl Fault {
    pub fn new(kind: FaultKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn configuration(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FaultKind::Configuration, code, message)
    }

    pub fn connectivity(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FaultKind::Connectivity, code, message)
    }

    pub fn plugin(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FaultKind::Plugin, code, message)
    }

    pub fn update(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FaultKind::Update, code, message)
    }

    pub fn unhandled(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FaultKind::Unhandled, code, message)
    }
}

/// Run application code, converting an error or a panic into a `Fault`.
pub fn guard<T>(
    kind: FaultKind,
    code: &str,
    f: impl FnOnce() -> anyhow::Result<T>,
) -> Result<T, Fault> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(Fault::new(kind, code, format!("{e:#}"))),
        Err(payload) => Err(Fault::new(
            kind,
            code,
            format!("panicked: {}", panic_message(payload.as_ref())),
        )),
    }
}

pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
