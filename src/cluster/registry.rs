//! Wallet profile registry (C10, spec §4.10). Holds the funding-enrichment
//! result and cluster root for each wallet the enrichment worker has
//! resolved, so readers (alert formatting, future lookups) don't need to
//! re-query the external enrichment service.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::model::WalletProfile;

pub struct WalletRegistry {
    profiles: RwLock<HashMap<String, WalletProfile>>,
}

impl Default for WalletRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WalletRegistry {
    pub fn new() -> Self {
        Self { profiles: RwLock::new(HashMap::new()) }
    }

    /// Inserts or refreshes a wallet's profile. `first_seen` is kept at its
    /// earliest recorded value rather than overwritten on every call.
    pub fn upsert(&self, address: &str, first_seen: i64, funded_by: Option<String>, cluster_id: String) {
        let mut profiles = self.profiles.write().unwrap();
        match profiles.get_mut(address) {
            Some(existing) => {
                existing.first_seen = existing.first_seen.min(first_seen);
                existing.funded_by = funded_by.or_else(|| existing.funded_by.clone());
                existing.cluster_id = cluster_id;
            }
            None => {
                profiles.insert(
                    address.to_string(),
                    WalletProfile {
                        address: address.to_string(),
                        first_seen,
                        funded_by,
                        cluster_id,
                    },
                );
            }
        }
    }

    pub fn get(&self, address: &str) -> Option<WalletProfile> {
        self.profiles.read().unwrap().get(address).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_then_get_round_trips() {
        let registry = WalletRegistry::new();
        registry.upsert("A", 100, Some("B".to_string()), "B".to_string());
        let profile = registry.get("A").unwrap();
        assert_eq!(profile.funded_by, Some("B".to_string()));
        assert_eq!(profile.cluster_id, "B");
    }

    #[test]
    fn first_seen_keeps_earliest_value() {
        let registry = WalletRegistry::new();
        registry.upsert("A", 200, None, "A".to_string());
        registry.upsert("A", 100, Some("F".to_string()), "A".to_string());
        let profile = registry.get("A").unwrap();
        assert_eq!(profile.first_seen, 100);
        assert_eq!(profile.funded_by, Some("F".to_string()));
    }

    #[test]
    fn unknown_wallet_returns_none() {
        let registry = WalletRegistry::new();
        assert!(registry.get("missing").is_none());
    }
}
