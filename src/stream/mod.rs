pub mod dedup;
pub mod durable;

pub use dedup::DedupFilter;
pub use durable::{DurableStream, SqliteDurableStream, StreamRecord};
