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

//! Manifest installer: download to `<dest>.new`, verify, rename into place

use crate::error::{Result, UpdateError};
use crate::events::{UpdateEvent, report_event};
use crate::fetch::Fetcher;
use crate::immortal::{ImmortalFileSet, normalize_path};
use crate::manifest::{FileDescriptor, UpdateManifest};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(1);
const CHUNK_SIZE: usize = 1024;
const TEMP_SUFFIX: &str = ".new";

/// Outcome of a fully successful manifest apply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Normalized paths written, in manifest order
    pub installed: Vec<String>,
    /// Normalized paths left alone because they belong to the immortal set
    pub skipped: Vec<String>,
}

impl ApplyReport {
    /// Replaced code only takes effect after a full restart.
    pub fn restart_required(&self) -> bool {
        !self.installed.is_empty()
    }
}

pub struct Updater<F> {
    root: PathBuf,
    immortal: ImmortalFileSet,
    fetcher: F,
    max_attempts: u32,
    retry_delay: Duration,
    chunk_size: usize,
    sleep: Box<dyn Fn(Duration)>,
}

impl<F: fmt::Debug> fmt::Debug for Updater<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Updater")
            .field("root", &self.root)
            .field("immortal", &self.immortal)
            .field("fetcher", &self.fetcher)
            .field("max_attempts", &self.max_attempts)
            .field("retry_delay", &self.retry_delay)
            .finish_non_exhaustive()
    }
}

impl<F: Fetcher> Updater<F> {
    pub fn new(root: impl Into<PathBuf>, fetcher: F) -> Self {
        Self {
            root: root.into(),
            immortal: ImmortalFileSet::default(),
            fetcher,
            max_attempts: MAX_ATTEMPTS,
            retry_delay: RETRY_DELAY,
            chunk_size: CHUNK_SIZE,
            sleep: Box::new(std::thread::sleep),
        }
    }

    #[must_use]
    pub fn with_immortal(mut self, immortal: ImmortalFileSet) -> Self {
        self.immortal = immortal;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, max_attempts: u32, retry_delay: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.retry_delay = retry_delay;
        self
    }

    /// Route the pause between attempts through the caller's clock.
    #[must_use]
    pub fn with_sleep(mut self, sleep: impl Fn(Duration) + 'static) -> Self {
        self.sleep = Box::new(sleep);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Apply every file of the manifest in order.
    ///
    /// Stops at the first file that cannot be installed after all attempts;
    /// files before it stay installed, files after it are not touched.
    pub fn apply(&self, manifest: &UpdateManifest) -> Result<ApplyReport> {
        report_event(&UpdateEvent::Started {
            files: manifest.files.len(),
        });

        let mut report = ApplyReport::default();

        for file in &manifest.files {
            let relative = normalize_path(&file.path);
            if relative.is_empty() {
                let err = UpdateError::InvalidManifest(format!(
                    "path {:?} does not name a file",
                    file.path
                ));
                report_event(&UpdateEvent::Failed {
                    path: file.path.clone(),
                    error: err.to_string(),
                });
                return Err(err);
            }

            if self.immortal.protects(&relative) {
                tracing::info!("Skipping protected path {relative}");
                report_event(&UpdateEvent::FileSkipped {
                    path: relative.clone(),
                });
                report.skipped.push(relative);
                continue;
            }

            match self.install_with_retry(file, &relative) {
                Ok((bytes, attempts)) => {
                    report_event(&UpdateEvent::FileInstalled {
                        path: relative.clone(),
                        bytes,
                        attempts,
                    });
                    report.installed.push(relative);
                }
                Err(e) => {
                    report_event(&UpdateEvent::Failed {
                        path: relative,
                        error: e.to_string(),
                    });
                    return Err(e);
                }
            }
        }

        report_event(&UpdateEvent::Completed {
            installed: report.installed.len(),
            skipped: report.skipped.len(),
        });

        Ok(report)
    }

    fn install_with_retry(&self, file: &FileDescriptor, relative: &str) -> Result<(u64, u32)> {
        let destination = self.root.join(relative);
        let temp = temp_path(&destination);
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                tracing::warn!(
                    "Retrying {relative} (attempt {attempt}/{})",
                    self.max_attempts
                );
                if !self.retry_delay.is_zero() {
                    (self.sleep)(self.retry_delay);
                }
            }

            match self.install_once(file, relative, &destination, &temp) {
                Ok(bytes) => return Ok((bytes, attempt)),
                Err(e) => {
                    tracing::warn!("Installing {relative} failed: {e}");
                    discard(&temp);
                    last_error = Some(e);
                }
            }
        }

        Err(UpdateError::FileFailed {
            path: relative.to_owned(),
            attempts: self.max_attempts,
            source: Box::new(
                last_error
                    .unwrap_or_else(|| UpdateError::Download("No error recorded".to_owned())),
            ),
        })
    }

    fn install_once(
        &self,
        file: &FileDescriptor,
        relative: &str,
        destination: &Path,
        temp: &Path,
    ) -> Result<u64> {
        // A previous attempt or a power cut may have left one behind
        discard(temp);

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }

        let bytes = self.download(file, relative, temp)?;
        replace(temp, destination)?;
        Ok(bytes)
    }

    /// Stream the body into `temp`, hashing on the fly when a digest is expected.
    fn download(&self, file: &FileDescriptor, relative: &str, temp: &Path) -> Result<u64> {
        let mut reader = self.fetcher.open(&file.url)?;
        let mut out = File::create(temp)?;
        let mut hasher = file.sha256.as_ref().map(|_| Sha256::new());
        let mut buf = vec![0u8; self.chunk_size];
        let mut total: u64 = 0;

        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(UpdateError::Download(format!(
                        "Reading {} failed: {e}",
                        file.url
                    )));
                }
            };

            total += n as u64;
            if let Some(expected) = file.size
                && total > expected
            {
                return Err(UpdateError::SizeMismatch {
                    path: relative.to_owned(),
                    expected,
                    actual: total,
                });
            }

            let chunk = &buf[..n];
            out.write_all(chunk)?;
            if let Some(hasher) = hasher.as_mut() {
                hasher.update(chunk);
            }
        }

        out.sync_all()?;

        if let Some(expected) = file.size
            && total != expected
        {
            return Err(UpdateError::SizeMismatch {
                path: relative.to_owned(),
                expected,
                actual: total,
            });
        }

        if let (Some(expected), Some(hasher)) = (file.sha256.as_ref(), hasher) {
            let actual = format!("{:x}", hasher.finalize());
            if actual != *expected {
                return Err(UpdateError::ChecksumMismatch {
                    path: relative.to_owned(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        Ok(total)
    }
}

fn temp_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

/// Remove the live file, then move the verified temp file into its place.
fn replace(temp: &Path, destination: &Path) -> Result<()> {
    match fs::remove_file(destination) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    fs::rename(temp, destination)?;
    Ok(())
}

fn discard(temp: &Path) {
    match fs::remove_file(temp) {
        Ok(()) => tracing::debug!("Removed leftover {}", temp.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Could not remove {}: {e}", temp.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::rc::Rc;
    use tempfile::TempDir;

    #[derive(Default)]
    struct MemoryFetcher {
        bodies: HashMap<String, Vec<u8>>,
        failures: RefCell<HashMap<String, u32>>,
        opened: RefCell<Vec<String>>,
    }

    impl MemoryFetcher {
        fn with(mut self, url: &str, body: &[u8]) -> Self {
            self.bodies.insert(url.to_owned(), body.to_vec());
            self
        }

        fn failing(self, url: &str, times: u32) -> Self {
            self.failures.borrow_mut().insert(url.to_owned(), times);
            self
        }

        fn opened(&self) -> Vec<String> {
            self.opened.borrow().clone()
        }
    }

    impl Fetcher for MemoryFetcher {
        fn open(&self, url: &str) -> Result<Box<dyn Read + '_>> {
            self.opened.borrow_mut().push(url.to_owned());
            if let Some(remaining) = self.failures.borrow_mut().get_mut(url)
                && *remaining > 0
            {
                *remaining -= 1;
                return Err(UpdateError::Download("simulated outage".to_owned()));
            }
            let body = self
                .bodies
                .get(url)
                .cloned()
                .ok_or_else(|| UpdateError::Download(format!("HTTP 404 for {url}")))?;
            Ok(Box::new(Cursor::new(body)))
        }
    }

    fn sha256_hex(data: &[u8]) -> String {
        format!("{:x}", Sha256::digest(data))
    }

    fn file(url: &str, path: &str) -> FileDescriptor {
        FileDescriptor {
            url: url.to_owned(),
            path: path.to_owned(),
            size: None,
            sha256: None,
        }
    }

    fn updater(dir: &TempDir, fetcher: MemoryFetcher) -> Updater<MemoryFetcher> {
        Updater::new(dir.path(), fetcher).with_retry(3, Duration::ZERO)
    }

    #[test]
    fn test_installs_verified_file_into_empty_root() {
        let dir = TempDir::new().unwrap();
        let body = b"def main():\n    pass\n";
        let manifest = UpdateManifest::from_json(
            format!(
                r#"{{"files":[{{"url":"http://x/a.py","path":"app/a.py","sha256":"{}"}}]}}"#,
                sha256_hex(body)
            )
            .as_bytes(),
        )
        .unwrap();

        let updater = updater(&dir, MemoryFetcher::default().with("http://x/a.py", body));
        let report = updater.apply(&manifest).unwrap();

        assert_eq!(report.installed, vec!["app/a.py".to_owned()]);
        assert!(report.restart_required());
        assert_eq!(fs::read(dir.path().join("app/a.py")).unwrap(), body);
        assert!(!dir.path().join("app/a.py.new").exists());
    }

    #[test]
    fn test_protected_file_is_skipped_without_fetching() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.py"), b"immortal").unwrap();
        fs::write(dir.path().join("bootstrap_manager.py"), b"immortal too").unwrap();

        let manifest = UpdateManifest {
            files: vec![
                file("http://x/main.py", "main.py"),
                file("http://x/bm.py", "../bootstrap_manager.py"),
            ],
        };
        let fetcher = MemoryFetcher::default()
            .with("http://x/main.py", b"evil")
            .with("http://x/bm.py", b"evil");
        let updater = updater(&dir, fetcher);

        let report = updater.apply(&manifest).unwrap();

        assert!(report.installed.is_empty());
        assert_eq!(report.skipped, vec!["main.py", "bootstrap_manager.py"]);
        assert!(!report.restart_required());
        assert!(updater.fetcher.opened().is_empty());
        assert_eq!(fs::read(dir.path().join("main.py")).unwrap(), b"immortal");
        assert_eq!(
            fs::read(dir.path().join("bootstrap_manager.py")).unwrap(),
            b"immortal too"
        );
        assert!(!dir.path().join("main.py.new").exists());
    }

    #[test]
    fn test_checksum_mismatch_leaves_destination_unchanged() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("app")).unwrap();
        fs::write(dir.path().join("app/a.py"), b"old").unwrap();

        let mut descriptor = file("http://x/a.py", "app/a.py");
        descriptor.sha256 = Some(sha256_hex(b"what we expected"));
        let manifest = UpdateManifest {
            files: vec![descriptor],
        };

        let updater = updater(&dir, MemoryFetcher::default().with("http://x/a.py", b"tampered"));
        let err = updater.apply(&manifest).unwrap_err();

        match err {
            UpdateError::FileFailed {
                attempts, source, ..
            } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*source, UpdateError::ChecksumMismatch { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fs::read(dir.path().join("app/a.py")).unwrap(), b"old");
        assert!(!dir.path().join("app/a.py.new").exists());
    }

    #[test]
    fn test_size_mismatch_leaves_destination_unchanged() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config.txt"), b"keep").unwrap();

        for size in [3, 100] {
            let mut descriptor = file("http://x/c", "config.txt");
            descriptor.size = Some(size);
            let manifest = UpdateManifest {
                files: vec![descriptor],
            };
            let updater = updater(&dir, MemoryFetcher::default().with("http://x/c", b"0123456789"));

            assert!(updater.apply(&manifest).is_err());
            assert_eq!(fs::read(dir.path().join("config.txt")).unwrap(), b"keep");
            assert!(!dir.path().join("config.txt.new").exists());
        }
    }

    #[test]
    fn test_transient_failures_are_retried() {
        let dir = TempDir::new().unwrap();
        let fetcher = MemoryFetcher::default()
            .with("http://x/a.py", b"fresh")
            .failing("http://x/a.py", 2);
        let manifest = UpdateManifest {
            files: vec![file("http://x/a.py", "app/a.py")],
        };

        let updater = updater(&dir, fetcher);
        let report = updater.apply(&manifest).unwrap();

        assert_eq!(report.installed, vec!["app/a.py"]);
        assert_eq!(updater.fetcher.opened().len(), 3);
        assert_eq!(fs::read(dir.path().join("app/a.py")).unwrap(), b"fresh");
    }

    #[test]
    fn test_retry_delay_goes_through_sleep_hook() {
        let dir = TempDir::new().unwrap();
        let manifest = UpdateManifest {
            files: vec![file("http://x/a.py", "app/a.py")],
        };
        let slept = Rc::new(RefCell::new(Vec::new()));
        let recorder = Rc::clone(&slept);
        let updater = Updater::new(
            dir.path(),
            MemoryFetcher::default().failing("http://x/a.py", 5),
        )
        .with_retry(3, Duration::from_secs(1))
        .with_sleep(move |d| recorder.borrow_mut().push(d));

        let err = updater.apply(&manifest).unwrap_err();

        assert!(matches!(err, UpdateError::FileFailed { attempts: 3, .. }));
        assert_eq!(*slept.borrow(), vec![Duration::from_secs(1); 2]);
    }

    #[test]
    fn test_failed_file_aborts_rest_of_manifest() {
        let dir = TempDir::new().unwrap();
        let fetcher = MemoryFetcher::default().with("http://x/b.py", b"b");
        let manifest = UpdateManifest {
            files: vec![
                file("http://x/missing.py", "app/a.py"),
                file("http://x/b.py", "app/b.py"),
            ],
        };

        let updater = updater(&dir, fetcher);
        assert!(updater.apply(&manifest).is_err());

        assert!(!dir.path().join("app/b.py").exists());
        assert!(
            !updater
                .fetcher
                .opened()
                .contains(&"http://x/b.py".to_owned())
        );
    }

    #[test]
    fn test_replaces_existing_file_and_stale_temp() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("app")).unwrap();
        fs::write(dir.path().join("app/main.py"), b"v1").unwrap();
        fs::write(dir.path().join("app/main.py.new"), b"half written").unwrap();

        let manifest = UpdateManifest {
            files: vec![file("http://x/main.py", "app/main.py")],
        };
        let updater = updater(&dir, MemoryFetcher::default().with("http://x/main.py", b"v2"));
        updater.apply(&manifest).unwrap();

        assert_eq!(fs::read(dir.path().join("app/main.py")).unwrap(), b"v2");
        assert!(!dir.path().join("app/main.py.new").exists());
    }

    #[test]
    fn test_multi_chunk_body_is_hashed_completely() {
        let dir = TempDir::new().unwrap();
        let body: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        let mut descriptor = file("http://x/blob", "lib/blob.bin");
        descriptor.size = Some(5000);
        descriptor.sha256 = Some(sha256_hex(&body));
        let manifest = UpdateManifest {
            files: vec![descriptor],
        };

        let updater = updater(&dir, MemoryFetcher::default().with("http://x/blob", &body));
        updater.apply(&manifest).unwrap();

        assert_eq!(fs::read(dir.path().join("lib/blob.bin")).unwrap(), body);
    }

    #[test]
    fn test_path_naming_nothing_is_invalid() {
        let dir = TempDir::new().unwrap();
        let manifest = UpdateManifest {
            files: vec![file("http://x/a", "/")],
        };
        let updater = updater(&dir, MemoryFetcher::default());
        assert!(matches!(
            updater.apply(&manifest),
            Err(UpdateError::InvalidManifest(_))
        ));
    }
}
