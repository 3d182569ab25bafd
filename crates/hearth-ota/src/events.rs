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

//! Update events for field diagnostics

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub enum UpdateEvent {
    Started {
        files: usize,
    },
    FileSkipped {
        path: String,
    },
    FileInstalled {
        path: String,
        bytes: u64,
        attempts: u32,
    },
    Failed {
        path: String,
        error: String,
    },
    Completed {
        installed: usize,
        skipped: usize,
    },
}

/// Record an update event.
///
/// Fire-and-forget: a serialization problem is logged and never interrupts
/// the update itself.
pub fn report_event(event: &UpdateEvent) {
    match serde_json::to_string(event) {
        Ok(event_json) => tracing::info!("Update event: {event_json}"),
        Err(e) => tracing::warn!("Failed to serialize update event {event:?}: {e}"),
    }
}
