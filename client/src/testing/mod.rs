//! Network tests run against a tunnel
//!
//! Everything here shells out through a [`protocol::CommandRunner`] or talks
//! to the tool server through a [`ControlPlane`], so the orchestrator can be
//! exercised with in-memory fakes.

mod control;
mod diagnostics;
mod transfer;
mod web;

#[cfg(test)]
pub mod fakes;

pub use control::{ControlPlane, HttpControlPlane};
pub use diagnostics::{diagnostic_args, run_diagnostic};
pub use transfer::FileTransferVerifier;
pub use web::run_web_test;

/// Hostname of `url`, if it parses
pub fn host_of(url: &str) -> Option<String> {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
}

/// Port of `url`, falling back to the scheme default
pub fn port_of(url: &str) -> Option<u16> {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.port_or_known_default())
}

/// Whether `url` points at an anonymity-network service
pub fn is_onion(url: &str) -> bool {
    host_of(url).is_some_and(|h| h.ends_with(protocol::ONION_SUFFIX))
}
