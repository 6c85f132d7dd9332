pub mod state_manager;

pub use state_manager::{StateManager, StateManagerConfig};
