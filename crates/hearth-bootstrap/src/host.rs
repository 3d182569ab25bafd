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

//! Host implementations of the hardware seams, for running on a Linux box.

use crate::bootstrap::Restarter;
use crate::signal::Indicator;
use anyhow::Context;
use hearth_runtime::bus::NetworkLink;
use std::path::{Component, Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::{debug, info};

/// The host's network is managed by the OS and treated as always joined.
#[derive(Debug, Default)]
pub struct HostNetwork;

impl NetworkLink for HostNetwork {
    fn is_connected(&self) -> bool {
        true
    }

    fn connect(&mut self, ssid: &str, _password: &str, _timeout: Duration) -> bool {
        debug!(ssid, "Host network is OS-managed, nothing to join");
        true
    }
}

/// Indicator that logs transitions instead of driving a pin
#[derive(Debug, Default)]
pub struct LogIndicator {
    on: Option<bool>,
}

impl Indicator for LogIndicator {
    fn set(&mut self, on: bool) {
        if self.on != Some(on) {
            debug!(on, "Status indicator");
            self.on = Some(on);
        }
    }
}

/// Restarts by re-executing the current binary with the same arguments.
#[derive(Debug, Default)]
pub struct ExecRestart;

impl Restarter for ExecRestart {
    fn restart(&mut self) -> anyhow::Result<()> {
        let exe = std::env::current_exe().context("cannot locate current executable")?;
        let args: Vec<String> = std::env::args().skip(1).collect();
        info!(exe = %exe.display(), "Re-executing");

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // exec only returns on failure
            let err = Command::new(&exe).args(&args).exec();
            Err(err).with_context(|| format!("exec of {} failed", exe.display()))
        }

        #[cfg(not(unix))]
        {
            Command::new(&exe)
                .args(&args)
                .spawn()
                .with_context(|| format!("spawn of {} failed", exe.display()))?;
            std::process::exit(0)
        }
    }
}

/// Canonical form of `path`; a file that does not exist yet resolves
/// through its parent directory.
fn resolve(path: &Path) -> Option<PathBuf> {
    if let Ok(path) = path.canonicalize() {
        return Some(path);
    }
    let absolute = std::path::absolute(path).ok()?;
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => match parent.canonicalize() {
            Ok(parent) => Some(parent.join(name)),
            Err(_) => Some(absolute),
        },
        _ => Some(absolute),
    }
}

/// Root-relative, `/`-separated names of the `paths` that live under `root`.
///
/// Used to keep the running binary and its config out of reach of updates.
/// Paths outside the root are dropped, updates cannot reach them anyway.
pub fn paths_under_root(root: &Path, paths: &[PathBuf]) -> Vec<String> {
    let Some(root) = resolve(root) else {
        return Vec::new();
    };
    paths
        .iter()
        .filter_map(|path| {
            let path = resolve(path)?;
            let relative = path.strip_prefix(&root).ok()?;
            let parts: Vec<_> = relative
                .components()
                .filter_map(|c| match c {
                    Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                    Component::Prefix(_)
                    | Component::RootDir
                    | Component::CurDir
                    | Component::ParentDir => None,
                })
                .collect();
            (!parts.is_empty()).then(|| parts.join("/"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_host_network_is_always_up() {
        let mut network = HostNetwork;
        assert!(network.is_connected());
        assert!(network.connect("any", "", Duration::ZERO));
    }

    #[test]
    fn test_log_indicator_tracks_state() {
        let mut indicator = LogIndicator::default();
        indicator.set(true);
        indicator.set(true);
        assert_eq!(indicator.on, Some(true));
        indicator.set(false);
        assert_eq!(indicator.on, Some(false));
    }

    #[test]
    fn test_paths_under_root_are_made_relative() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("bin")).unwrap();
        fs::write(root.path().join("bin/hearth"), b"").unwrap();
        fs::write(root.path().join("device.json"), b"{}").unwrap();
        let outside = tempfile::tempdir().unwrap();

        let names = paths_under_root(
            root.path(),
            &[
                root.path().join("bin/hearth"),
                root.path().join("./device.json"),
                outside.path().join("hearth"),
                root.path().to_path_buf(),
            ],
        );

        assert_eq!(names, vec!["bin/hearth", "device.json"]);
    }

    #[test]
    fn test_missing_files_under_root_still_count() {
        let root = tempfile::tempdir().unwrap();
        let names = paths_under_root(root.path(), &[root.path().join("not-yet.json")]);
        assert_eq!(names, vec!["not-yet.json"]);
    }
}
