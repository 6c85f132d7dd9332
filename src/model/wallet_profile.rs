//! Wallet identity and cluster membership (C10). See spec §3, §4.10.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletProfile {
    pub address: String,
    pub first_seen: i64,
    pub funded_by: Option<String>,
    /// Union-find root at query time; recomputed on read, not stored durably.
    pub cluster_id: String,
}
