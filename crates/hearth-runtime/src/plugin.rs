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

//! Application module contract.

use crate::runtime::Runtime;

/// Which optional hooks a module actually implements.
///
/// Read once, right after the module is loaded. The default method bodies
/// on [`AppModule`] exist only so implementors can skip hooks they don't
/// declare; the supervisor never calls an undeclared hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub initialize: bool,
    pub tick: bool,
    pub quiesce: bool,
    /// Legacy blocking entrypoint
    pub main: bool,
}

impl Capabilities {
    /// `initialize` and `tick`
    pub fn plugin() -> Self {
        Self {
            initialize: true,
            tick: true,
            ..Self::default()
        }
    }

    pub fn legacy() -> Self {
        Self {
            main: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_quiesce(mut self) -> Self {
        self.quiesce = true;
        self
    }

    /// Plugin-style hooks win; `main` is only a fallback.
    pub fn entrypoint(self) -> Entrypoint {
        if self.initialize && self.tick {
            Entrypoint::Plugin
        } else if self.main {
            Entrypoint::Legacy
        } else {
            Entrypoint::None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entrypoint {
    Plugin,
    Legacy,
    None,
}

/// Replaceable application driving the device's hardware
pub trait AppModule {
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    /// Register subscriptions and set up hardware. Retried on failure.
    fn initialize(&mut self, _runtime: &mut Runtime) -> anyhow::Result<()> {
        Ok(())
    }

    /// One slice of work; must not block.
    fn tick(&mut self, _runtime: &mut Runtime) -> anyhow::Result<()> {
        Ok(())
    }

    /// Prepare for a destructive operation such as an update.
    fn quiesce(&mut self, _runtime: &mut Runtime, _reason: &str) -> anyhow::Result<()> {
        Ok(())
    }

    /// Legacy blocking entrypoint. Returning at all is a fault.
    fn main(&mut self, _runtime: &mut Runtime) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Produces the application module ("import")
pub trait ModuleLoader {
    fn load(&mut self) -> anyhow::Result<Box<dyn AppModule>>;
}
