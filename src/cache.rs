use crate::types::DiscoveredServer;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use time::{format_description::well_known, OffsetDateTime};

/// Default freshness window for cached scan results.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 120;

/// Results of the most recent completed scan.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanCacheEntry {
    pub servers: Vec<DiscoveredServer>,
    /// Unix epoch milliseconds.
    pub timestamp_ms: u64,
}

impl ScanCacheEntry {
    pub fn is_stale_at(&self, now_ms: u64, ttl_secs: u64) -> bool {
        now_ms.saturating_sub(self.timestamp_ms) > ttl_secs.saturating_mul(1000)
    }

    pub fn age_at(&self, now_ms: u64) -> String {
        format_age(now_ms.saturating_sub(self.timestamp_ms))
    }

    /// RFC 3339 rendering of the entry timestamp.
    pub fn scanned_at(&self) -> String {
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(self.timestamp_ms) * 1_000_000)
            .ok()
            .and_then(|t| t.format(&well_known::Rfc3339).ok())
            .unwrap_or_else(|| String::from("1970-01-01T00:00:00Z"))
    }
}

/// Single-entry, time-boxed store for the last scan's servers.
///
/// Shared between scan completion and readers by reference (wrap in `Arc` as
/// needed); the entry is guarded by a mutex and replaced wholesale.
#[derive(Debug, Default)]
pub struct ScanCache {
    entry: Mutex<Option<ScanCacheEntry>>,
}

impl ScanCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<ScanCacheEntry> {
        self.lock().clone()
    }

    /// Store `servers` stamped with the current time, discarding any prior entry.
    pub fn set(&self, servers: Vec<DiscoveredServer>) {
        self.set_at(servers, now_ms());
    }

    pub fn set_at(&self, servers: Vec<DiscoveredServer>, timestamp_ms: u64) {
        *self.lock() = Some(ScanCacheEntry {
            servers,
            timestamp_ms,
        });
    }

    /// True when empty or older than `ttl_secs`.
    pub fn is_stale(&self, ttl_secs: u64) -> bool {
        self.is_stale_at(now_ms(), ttl_secs)
    }

    pub fn is_stale_at(&self, now_ms: u64, ttl_secs: u64) -> bool {
        self.lock()
            .as_ref()
            .map_or(true, |e| e.is_stale_at(now_ms, ttl_secs))
    }

    pub fn clear(&self) {
        *self.lock() = None;
    }

    /// `"<n>s ago"` / `"<n>m ago"`, or `None` when empty. Display only.
    pub fn age(&self) -> Option<String> {
        let now = now_ms();
        self.lock().as_ref().map(|e| e.age_at(now))
    }

    fn lock(&self) -> MutexGuard<'_, Option<ScanCacheEntry>> {
        // The entry is always written whole, so a poisoned guard is still consistent.
        self.entry.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub fn format_age(elapsed_ms: u64) -> String {
    let secs = elapsed_ms / 1000;
    if secs < 60 {
        format!("{secs}s ago")
    } else {
        format!("{}m ago", secs / 60)
    }
}

/// Current wall-clock time in Unix epoch milliseconds.
pub fn now_ms() -> u64 {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    u64::try_from(nanos / 1_000_000).unwrap_or(0)
}
