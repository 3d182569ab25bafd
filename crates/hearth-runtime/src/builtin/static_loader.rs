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

//! Loaders for application modules compiled into the binary.

use crate::builtin::uptime::UptimeModule;
use crate::plugin::{AppModule, ModuleLoader};
use anyhow::bail;
use std::collections::BTreeMap;
use std::fmt;

/// Constructor for a compiled-in module
pub type ModuleFactory = fn() -> Box<dyn AppModule>;

/// Wraps a Rust constructor as a [`ModuleLoader`]
pub struct StaticLoader<F> {
    name: String,
    factory: F,
}

impl<F> fmt::Debug for StaticLoader<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticLoader")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<F> StaticLoader<F>
where
    F: FnMut() -> anyhow::Result<Box<dyn AppModule>>,
{
    pub fn new(name: impl Into<String>, factory: F) -> Self {
        Self {
            name: name.into(),
            factory,
        }
    }
}

impl<F> ModuleLoader for StaticLoader<F>
where
    F: FnMut() -> anyhow::Result<Box<dyn AppModule>>,
{
    fn load(&mut self) -> anyhow::Result<Box<dyn AppModule>> {
        (self.factory)()
    }
}

/// Name to constructor for every module the binary can run
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    factories: BTreeMap<String, ModuleFactory>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the modules shipped with the runtime
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(UptimeModule::NAME, || Box::new(UptimeModule::default()));
        registry
    }

    pub fn register(&mut self, name: &str, factory: ModuleFactory) {
        self.factories.insert(name.to_owned(), factory);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Loader for `name`. An unknown name still yields a loader, whose every
    /// load fails, so the supervisor reports it like any other import error.
    pub fn loader(&self, name: &str) -> Box<dyn ModuleLoader> {
        let factory = self.factories.get(name).copied();
        let wanted = name.to_owned();
        let known = self.names().collect::<Vec<_>>().join(", ");

        Box::new(StaticLoader::new(name, move || match factory {
            Some(factory) => Ok(factory()),
            None => bail!("unknown module '{wanted}' (available: {known})"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_loads_uptime() {
        let registry = ModuleRegistry::with_builtins();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["uptime"]);

        let module = registry.loader("uptime").load().unwrap();
        assert_eq!(module.name(), "uptime");
    }

    #[test]
    fn test_unknown_module_fails_every_load() {
        let registry = ModuleRegistry::with_builtins();
        let mut loader = registry.loader("thermostat");

        for _ in 0..2 {
            let error = loader.load().err().expect("load should fail").to_string();
            assert_eq!(error, "unknown module 'thermostat' (available: uptime)");
        }
    }
}
