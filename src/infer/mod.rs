pub mod swap_inferencer;

pub use swap_inferencer::{InferConfig, infer};
