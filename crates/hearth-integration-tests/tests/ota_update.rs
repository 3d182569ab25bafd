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

//! Over-the-air updates pushed over the bus and fetched over HTTP.

use hearth_bootstrap::Iteration;
use hearth_integration_tests::{Device, FnLoader};
use hearth_runtime::{AppModule, Capabilities, Runtime};
use sha2::{Digest, Sha256};
use std::cell::RefCell;
use std::fs;
use std::rc::Rc;

const NEW_APP: &str = "def tick():\n    pass\n";

/// Records quiesce reasons
struct Quiet(Rc<RefCell<Vec<String>>>);

impl AppModule for Quiet {
    fn name(&self) -> &str {
        "quiet"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::plugin().with_quiesce()
    }

    fn quiesce(&mut self, _runtime: &mut Runtime, reason: &str) -> anyhow::Result<()> {
        self.0.borrow_mut().push(reason.to_owned());
        Ok(())
    }
}

fn device() -> (Device, Rc<RefCell<Vec<String>>>) {
    let quiesced = Rc::new(RefCell::new(Vec::new()));
    let reasons = Rc::clone(&quiesced);
    let dev = Device::new(FnLoader(move || -> anyhow::Result<Box<dyn AppModule>> {
        Ok(Box::new(Quiet(Rc::clone(&reasons))))
    }));
    (dev, quiesced)
}

fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

#[test]
fn test_update_installs_files_skips_bootstrap_and_restarts() {
    let mut server = mockito::Server::new();
    let app = server
        .mock("GET", "/app/app.py")
        .with_body(NEW_APP)
        .expect(1)
        .create();
    let main = server.mock("GET", "/main.py").expect(0).create();

    let (mut dev, quiesced) = device();
    dev.run(1);

    let manifest = format!(
        r#"{{"files":[
            {{"url":"{url}/app/app.py","path":"app/app.py","sha256":"{sum}","size":{size}}},
            {{"url":"{url}/main.py","path":"main.py"}}
        ]}}"#,
        url = server.url(),
        sum = sha256_hex(NEW_APP.as_bytes()),
        size = NEW_APP.len(),
    );
    dev.bus.inject(&dev.topics.update(), manifest.as_bytes());

    assert_eq!(dev.run(1), vec![Iteration::Clean]);
    assert_eq!(
        fs::read_to_string(dev.root.path().join("app/app.py")).unwrap(),
        NEW_APP
    );
    assert!(!dev.root.path().join("main.py").exists());
    assert_eq!(*quiesced.borrow(), vec!["update"]);
    assert_eq!(
        dev.bus.texts_on(&dev.topics.status()),
        vec!["running", "updating", "updated"]
    );
    assert_eq!(dev.restarts.get(), 1);

    app.assert();
    main.assert();
}

#[test]
fn test_checksum_mismatch_keeps_old_code() {
    let mut server = mockito::Server::new();
    let app = server
        .mock("GET", "/app/app.py")
        .with_body("truncated")
        .expect(2)
        .create();

    let (mut dev, _) = device();
    fs::create_dir_all(dev.root.path().join("app")).unwrap();
    fs::write(dev.root.path().join("app/app.py"), "old").unwrap();
    dev.run(1);

    let manifest = format!(
        r#"{{"files":[{{"url":"{}/app/app.py","path":"app/app.py","sha256":"{}"}}]}}"#,
        server.url(),
        sha256_hex(NEW_APP.as_bytes()),
    );
    dev.bus.inject(&dev.topics.update(), manifest.as_bytes());
    let slept_before = dev.clock.slept_ms();

    assert_eq!(dev.run(1), vec![Iteration::Faulted]);
    // The pause between attempts runs on the device clock
    assert!(dev.clock.slept_ms() - slept_before >= 50);
    assert_eq!(
        fs::read_to_string(dev.root.path().join("app/app.py")).unwrap(),
        "old"
    );
    assert_eq!(dev.sos_with("update_failed"), 1);
    assert_eq!(dev.restarts.get(), 0);
    app.assert();

    // The application keeps running after a failed update
    assert_eq!(dev.run(1), vec![Iteration::Clean]);
}

#[test]
fn test_empty_manifest_is_ignored() {
    let (mut dev, quiesced) = device();
    dev.run(1);

    dev.bus.inject(&dev.topics.update(), br#"{"files":[]}"#);
    assert_eq!(dev.run(1), vec![Iteration::Clean]);
    assert!(quiesced.borrow().is_empty());
    assert_eq!(dev.bus.texts_on(&dev.topics.status()), vec!["running"]);
}
