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

//! Update manifest as received on the `update` system topic.
//!
//! ```json
//! {"files": [{"url": "http://host/app/main.py", "path": "app/main.py",
//!             "size": 1234, "sha256": "9f86d0..."}]}
//! ```

use crate::error::{Result, UpdateError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateManifest {
    pub files: Vec<FileDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Source URL
    pub url: String,

    /// Destination path relative to the device root
    pub path: String,

    /// Expected length in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    /// Expected SHA-256, hex encoded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl UpdateManifest {
    /// Parse and validate a manifest payload.
    pub fn from_json(payload: &[u8]) -> Result<Self> {
        let mut manifest: UpdateManifest = serde_json::from_slice(payload)?;
        for file in &mut manifest.files {
            file.validate()?;
        }
        Ok(manifest)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FileDescriptor {
    fn validate(&mut self) -> Result<()> {
        if self.url.trim().is_empty() || self.path.trim().is_empty() {
            return Err(UpdateError::InvalidManifest(
                "file descriptor is missing url or path".to_owned(),
            ));
        }

        if let Some(digest) = self.sha256.take() {
            let digest = digest.trim().to_ascii_lowercase();
            if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(UpdateError::InvalidManifest(format!(
                    "sha256 for {} is not a 64 character hex digest",
                    self.path
                )));
            }
            self.sha256 = Some(digest);
        }

        Ok(())
    }
}
