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

//! SOS payload and repeat suppression

use crate::clock::elapsed_ms;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Body published on the `sos` topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub error: String,
    pub message: String,
    pub timestamp: u64,
    pub device_id: String,

    /// Identical reports swallowed since the previous emission
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeats: Option<u32>,
}

#[derive(Debug)]
struct Seen {
    message: String,
    emitted_at: u64,
    suppressed: u32,
}

/// Keeps a stuck fault from flooding the bus.
///
/// A report is emitted when its code is new, when its message differs from
/// the last one emitted under that code, or when the repeat interval has
/// passed. Everything else is counted and folded into the next emission.
#[derive(Debug)]
pub struct DiagnosticThrottle {
    repeat_interval_ms: u64,
    seen: HashMap<String, Seen>,
}

impl DiagnosticThrottle {
    pub fn new(repeat_interval_ms: u64) -> Self {
        Self {
            repeat_interval_ms,
            seen: HashMap::new(),
        }
    }

    /// `Some(suppressed)` when the report should go out now.
    pub fn check(&mut self, code: &str, message: &str, now: u64) -> Option<u32> {
        let Some(seen) = self.seen.get_mut(code) else {
            self.seen.insert(
                code.to_owned(),
                Seen {
                    message: message.to_owned(),
                    emitted_at: now,
                    suppressed: 0,
                },
            );
            return Some(0);
        };

        if seen.message != message || elapsed_ms(now, seen.emitted_at) >= self.repeat_interval_ms {
            let suppressed = seen.suppressed;
            seen.message = message.to_owned();
            seen.emitted_at = now;
            seen.suppressed = 0;
            Some(suppressed)
        } else {
            seen.suppressed += 1;
            None
        }
    }
}
