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

//! Source side of an update: turns a URL into a byte stream

use crate::error::{Result, UpdateError};
use std::io::Read;
use std::time::Duration;

const USER_AGENT: &str = concat!("hearth-ota/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Opens a readable stream for a manifest URL.
///
/// The updater pulls fixed-size chunks from the returned reader, so an
/// implementation should not buffer the whole body.
pub trait Fetcher {
    fn open(&self, url: &str) -> Result<Box<dyn Read + '_>>;
}

impl<F: Fetcher + ?Sized> Fetcher for Box<F> {
    fn open(&self, url: &str) -> Result<Box<dyn Read + '_>> {
        (**self).open(url)
    }
}

/// Plain HTTP(S) fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| UpdateError::Download(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn open(&self, url: &str) -> Result<Box<dyn Read + '_>> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| UpdateError::Download(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(UpdateError::Download(format!(
                "HTTP {} for {url}",
                response.status()
            )));
        }

        Ok(Box::new(response))
    }
}

/// Stand-in used when no real fetcher could be built; every open fails.
#[derive(Debug, Clone)]
pub struct UnavailableFetcher {
    reason: String,
}

impl UnavailableFetcher {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Fetcher for UnavailableFetcher {
    fn open(&self, url: &str) -> Result<Box<dyn Read + '_>> {
        Err(UpdateError::Download(format!(
            "no fetcher for {url}: {}",
            self.reason
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_fetcher_fails_every_open() {
        let fetcher = UnavailableFetcher::new("TLS backend missing");
        for _ in 0..2 {
            match fetcher.open("http://x/app.py") {
                Err(UpdateError::Download(msg)) => assert!(msg.contains("TLS backend missing")),
                Err(other) => panic!("unexpected error: {other}"),
                Ok(_) => panic!("must not produce a stream"),
            }
        }
    }

    #[test]
    fn test_fetch_streams_body() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/app/main.py")
            .with_status(200)
            .with_body("print('hello')\n")
            .create();

        let fetcher = HttpFetcher::new().unwrap();
        let mut body = String::new();
        fetcher
            .open(&format!("{}/app/main.py", server.url()))
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();

        assert_eq!(body, "print('hello')\n");
        mock.assert();
    }

    #[test]
    fn test_fetch_rejects_error_status() {
        let mut server = mockito::Server::new();
        let _mock = server.mock("GET", "/missing.py").with_status(404).create();

        let fetcher = HttpFetcher::new().unwrap();
        let result = fetcher.open(&format!("{}/missing.py", server.url()));

        match result {
            Err(UpdateError::Download(msg)) => assert!(msg.contains("404")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("404 must not produce a stream"),
        }
    }

    #[test]
    fn test_fetch_unreachable_host() {
        let fetcher = HttpFetcher::new().unwrap();
        let result = fetcher.open("http://127.0.0.1:9/nothing");
        assert!(matches!(result, Err(UpdateError::Download(_))));
    }
}
