pub mod registry;
pub mod scorer;
pub mod union_find;

pub use registry::WalletRegistry;
pub use scorer::{CtoComponents, CtoScore, ScoreInputs, Scorer};
pub use union_find::UnionFind;
