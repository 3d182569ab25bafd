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

//! System topics under `<namespace>/<device_id>/`

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemTopics {
    base: String,
}

impl SystemTopics {
    pub fn new(namespace: &str, device_id: &str) -> Self {
        let namespace = namespace.trim_matches('/');
        Self {
            base: format!("{namespace}/{device_id}/"),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Device-scoped topic, e.g. `topic("uptime")`
    pub fn topic(&self, leaf: &str) -> String {
        format!("{}{leaf}", self.base)
    }

    pub fn update(&self) -> String {
        self.topic("update")
    }

    pub fn ping(&self) -> String {
        self.topic("ping")
    }

    pub fn sos(&self) -> String {
        self.topic("sos")
    }

    pub fn health(&self) -> String {
        self.topic("health")
    }

    pub fn boot(&self) -> String {
        self.topic("boot")
    }

    pub fn version(&self) -> String {
        self.topic("version")
    }

    pub fn status(&self) -> String {
        self.topic("status")
    }

    pub fn log(&self) -> String {
        self.topic("log")
    }

    /// Inbound control topics the device always subscribes to
    pub fn inbound(&self) -> [String; 2] {
        [self.update(), self.ping()]
    }

    pub fn control(&self, topic: &str) -> Option<Control> {
        let leaf = topic.strip_prefix(self.base.as_str())?;
        match leaf {
            "update" => Some(Control::Update),
            "ping" => Some(Control::Ping),
            _ => None,
        }
    }
}

/// Reserved inbound topics, handled before plugin subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Update,
    Ping,
}
