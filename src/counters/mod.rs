pub mod bucket;
pub mod hll;
pub mod store;
pub mod topk;

pub use bucket::WindowKind;
pub use store::{AggregateSnapshot, CounterStore, WindowSnapshot};
