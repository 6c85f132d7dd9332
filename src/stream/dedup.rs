//! Dedup Filter (C2, spec §4.2). Atomic "set if absent with TTL" keyed by
//! transaction signature. An empty/sentinel signature is replaced by
//! `id:<stream_record_id>` so dedup never collapses unrelated records that
//! happen to share a blank signature.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::util::now_unix;

pub struct DedupFilter {
    ttl_seconds: i64,
    seen: Mutex<HashMap<String, i64>>,
}

impl DedupFilter {
    pub fn new(ttl_seconds: i64) -> Self {
        Self { ttl_seconds, seen: Mutex::new(HashMap::new()) }
    }

    fn key_for(signature: &str, stream_record_id: i64) -> String {
        if signature.is_empty() {
            format!("id:{stream_record_id}")
        } else {
            signature.to_string()
        }
    }

    /// Returns `true` on first occurrence (caller should process the record);
    /// `false` if already seen within the TTL (caller should skip it).
    pub fn check_and_set(&self, signature: &str, stream_record_id: i64) -> bool {
        let key = Self::key_for(signature, stream_record_id);
        let now = now_unix();
        let mut seen = self.seen.lock().unwrap();
        if let Some(&expires_at) = seen.get(&key) {
            if expires_at > now {
                return false;
            }
        }
        seen.insert(key, now + self.ttl_seconds);
        true
    }

    /// Drop expired entries. Call periodically to bound memory; correctness
    /// does not depend on this since `check_and_set` re-validates expiry.
    pub fn sweep_expired(&self) {
        let now = now_unix();
        self.seen.lock().unwrap().retain(|_, &mut expires_at| expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
