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

//! Immortal file set: paths an update may never write.

/// Bootstrap directories, matched as path prefixes
const DEFAULT_PREFIXES: [&str; 2] = ["bootstrap/", "devices/bootstrap/"];

/// Bootstrap files living at the device root
const DEFAULT_NAMES: [&str; 3] = ["main.py", "bootstrap_manager.py", "http_updater.py"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImmortalFileSet {
    prefixes: Vec<String>,
    names: Vec<String>,
}

impl Default for ImmortalFileSet {
    fn default() -> Self {
        Self {
            prefixes: DEFAULT_PREFIXES.iter().map(|p| (*p).to_owned()).collect(),
            names: DEFAULT_NAMES.iter().map(|n| (*n).to_owned()).collect(),
        }
    }
}

impl ImmortalFileSet {
    pub fn new(prefixes: Vec<String>, names: Vec<String>) -> Self {
        let prefixes = prefixes
            .into_iter()
            .map(|p| {
                let p = normalize_path(&p);
                if p.is_empty() { p } else { format!("{p}/") }
            })
            .filter(|p| !p.is_empty())
            .collect();
        let names = names
            .into_iter()
            .map(|n| normalize_path(&n))
            .filter(|n| !n.is_empty())
            .collect();
        Self { prefixes, names }
    }

    /// Protect extra root-relative names on top of the current set.
    #[must_use]
    pub fn with_names(mut self, names: impl IntoIterator<Item = String>) -> Self {
        for name in names {
            let name = normalize_path(&name);
            if !name.is_empty() && !self.names.contains(&name) {
                self.names.push(name);
            }
        }
        self
    }

    /// Check a path that has already been through [`normalize_path`].
    pub fn protects(&self, normalized: &str) -> bool {
        if self.names.iter().any(|name| name == normalized) {
            return true;
        }

        self.prefixes.iter().any(|prefix| {
            normalized.starts_with(prefix.as_str())
                || normalized == prefix.trim_end_matches('/')
        })
    }
}

/// Normalize a manifest path into a `/`-separated path relative to the device
/// root.
///
/// Backslashes count as separators, empty and `.` segments are dropped and
/// `..` is resolved lexically. The device root is its own parent, so a
/// traversal like `../main.py` lands on `main.py` instead of escaping.
pub fn normalize_path(raw: &str) -> String {
    let unified = raw.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();

    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("app/main.py"), "app/main.py");
        assert_eq!(normalize_path("/app//main.py"), "app/main.py");
        assert_eq!(normalize_path("app\\lib\\util.py"), "app/lib/util.py");
        assert_eq!(normalize_path("./app/./x.py"), "app/x.py");
        assert_eq!(normalize_path("app/../lib/x.py"), "lib/x.py");
        assert_eq!(normalize_path("../bootstrap_manager.py"), "bootstrap_manager.py");
        assert_eq!(normalize_path("../../../etc/passwd"), "etc/passwd");
        assert_eq!(normalize_path("/"), "");
        assert_eq!(normalize_path(".."), "");
    }

    #[test]
    fn test_default_set_protects_bootstrap_layer() {
        let set = ImmortalFileSet::default();
        assert!(set.protects("main.py"));
        assert!(set.protects("bootstrap_manager.py"));
        assert!(set.protects("http_updater.py"));
        assert!(set.protects("bootstrap/anything.py"));
        assert!(set.protects("devices/bootstrap/main.py"));
        assert!(set.protects("bootstrap"));
    }

    #[test]
    fn test_default_set_allows_application_paths() {
        let set = ImmortalFileSet::default();
        assert!(!set.protects("app/main.py"));
        assert!(!set.protects("lib/bmp3xx.py"));
        assert!(!set.protects("bootstrapper.py"));
        assert!(!set.protects("app/bootstrap/x.py"));
    }

    #[test]
    fn test_traversal_attempts_hit_the_set() {
        let set = ImmortalFileSet::default();
        for raw in [
            "../bootstrap_manager.py",
            "app/../main.py",
            "/main.py",
            "\\bootstrap\\x.py",
            "app/../../devices/bootstrap/main.py",
        ] {
            assert!(set.protects(&normalize_path(raw)), "{raw} should be protected");
        }
    }

    #[test]
    fn test_extra_names_extend_the_defaults() {
        let set = ImmortalFileSet::default()
            .with_names(["hearth".to_owned(), "/config/device.json".to_owned(), String::new()]);
        assert!(set.protects("hearth"));
        assert!(set.protects(&normalize_path("../hearth")));
        assert!(set.protects("config/device.json"));
        assert!(set.protects("main.py"));
        assert!(!set.protects("app/hearth"));
    }

    #[test]
    fn test_custom_set_is_normalized() {
        let set = ImmortalFileSet::new(vec!["/firmware/".to_owned()], vec!["./hearth".to_owned()]);
        assert!(set.protects("firmware/image.bin"));
        assert!(set.protects("hearth"));
        assert!(!set.protects("main.py"));
    }
}
