pub mod delta;
pub mod mode;
pub mod raw_transaction;
pub mod rule;
pub mod swap;
pub mod token_profile;
pub mod wallet_profile;

pub use delta::{Delta, ExtractedDeltas};
pub use mode::{Mode, ModeCell};
pub use raw_transaction::{RawTransaction, TokenBalance, NATIVE_MINT};
pub use rule::{Op, RawPredicate, RawTriggerRule};
pub use swap::{InferenceOutcome, MintTouchEvent, Side, SwapEvent};
pub use token_profile::{TokenProfile, TokenState};
pub use wallet_profile::WalletProfile;
