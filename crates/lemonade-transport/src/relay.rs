//! Relay sets and the shared relay pool.
//!
//! Many clients are expected to reuse one [`RelayPool`] so that the relay
//! connections behind it are not duplicated. The pool is shared by `Arc` and
//! is read-only once built.

use std::sync::{Arc, OnceLock};

/// Relays run for ContextVM servers.
pub const DEFAULT_RELAYS: &[&str] =
    &["wss://relay.contextvm.org", "wss://relay2.contextvm.org", "wss://cvm.otherstuff.ai"];

/// General purpose public relays.
pub const COMMON_RELAYS: &[&str] =
    &["wss://relay.damus.io", "wss://relay.nostr.net", "wss://nos.lol", "wss://nostr.mom"];

/// Relays that index profile metadata.
pub const METADATA_RELAYS: &[&str] =
    &["wss://purplepag.es/", "wss://nos.lol", "wss://relay.damus.io"];

/// Local development relay.
pub const DEV_RELAYS: &[&str] = &["ws://localhost:10547"];

/// Provides the relays a transport publishes to and subscribes on.
pub trait RelayHandler: Send + Sync + std::fmt::Debug {
    /// Relay URLs, normalized and free of duplicates.
    fn relays(&self) -> &[String];
}

/// A deduplicated set of relay URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayPool {
    relays: Vec<String>,
}

impl RelayPool {
    /// Build a pool from relay URLs.
    ///
    /// URLs are trimmed and a single trailing slash is dropped, so
    /// `wss://nos.lol/` and `wss://nos.lol` share a connection. Order of
    /// first appearance is kept; empty entries are ignored.
    pub fn new<I, S>(relays: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for relay in relays {
            let url = normalize(relay.as_ref());
            if !url.is_empty() && !normalized.iter().any(|r| r == url) {
                normalized.push(url.to_string());
            }
        }
        Self { relays: normalized }
    }

    /// Process-wide pool over [`DEFAULT_RELAYS`].
    ///
    /// Created on first use and never torn down. Long-lived services should
    /// construct their own pool and inject it instead.
    pub fn shared() -> Arc<Self> {
        static SHARED: OnceLock<Arc<RelayPool>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(Self::new(DEFAULT_RELAYS))))
    }

    /// Number of distinct relays.
    pub fn len(&self) -> usize {
        self.relays.len()
    }

    /// True if the pool has no relays.
    pub fn is_empty(&self) -> bool {
        self.relays.is_empty()
    }
}

impl RelayHandler for RelayPool {
    fn relays(&self) -> &[String] {
        &self.relays
    }
}

fn normalize(url: &str) -> &str {
    let url = url.trim();
    url.strip_suffix('/').unwrap_or(url)
}
