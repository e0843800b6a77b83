//! Result cache contract used by the request layer, plus an in-process store.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

pub const FEAR_METER_QUERY: &str = "crypto-fear-meter";

/// One year.
const MAX_TTL_SECS: u64 = 365 * 24 * 3600;

pub fn whale_query(source: &str) -> String {
    format!("crypto-whale:{source}")
}

/// Stable key for a logical query identifier.
pub fn cache_key(query: &str) -> String {
    hex::encode(Sha256::digest(query.as_bytes()))
}

pub trait ResultCache {
    fn get(&self, key: &str, now: DateTime<Utc>) -> Option<Value>;
    fn set(&mut self, key: &str, value: Value, ttl_secs: u64, now: DateTime<Utc>);
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: HashMap<String, (DateTime<Utc>, Value)>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired entries.
    pub fn purge(&mut self, now: DateTime<Utc>) {
        self.entries.retain(|_, (expires, _)| *expires > now);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ResultCache for MemoryCache {
    fn get(&self, key: &str, now: DateTime<Utc>) -> Option<Value> {
        self.entries
            .get(key)
            .filter(|(expires, _)| *expires > now)
            .map(|(_, v)| v.clone())
    }

    fn set(&mut self, key: &str, value: Value, ttl_secs: u64, now: DateTime<Utc>) {
        let ttl = Duration::seconds(ttl_secs.min(MAX_TTL_SECS) as i64);
        self.entries.insert(key.to_string(), (now + ttl, value));
    }
}
