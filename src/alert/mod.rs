pub mod channel;
pub mod dispatcher;
pub mod payload;
pub mod ratelimit;

pub use channel::{AlertChannel, DiscordChannel, SendOutcome, TelegramChannel};
pub use dispatcher::{AlertDispatcher, DispatcherConfig};
pub use payload::{AlertPayload, CtoComponentsPayload, TopBuyer};
pub use ratelimit::ChannelRateLimiter;
