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

//! Hearth OTA - fault-tolerant file replacement for device application code
//!
//! An update is a manifest of files. Each file is streamed into a `<dest>.new`
//! sibling, verified against the optional size and SHA-256 from the manifest,
//! and only then renamed over the live path. Paths belonging to the immortal
//! bootstrap layer are skipped no matter what the manifest says, so a bad
//! update can never take away the device's ability to receive the next one.

pub mod error;
pub mod events;
pub mod fetch;
pub mod immortal;
pub mod manifest;
pub mod updater;

pub use error::UpdateError;
pub use fetch::{Fetcher, HttpFetcher, UnavailableFetcher};
pub use immortal::{ImmortalFileSet, normalize_path};
pub use manifest::{FileDescriptor, UpdateManifest};
pub use updater::{ApplyReport, Updater};
