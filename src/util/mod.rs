pub mod backoff;

pub use backoff::ExponentialBackoff;

/// Current unix timestamp in seconds. Centralized so tests can substitute a
/// fixed clock by constructing values directly instead of calling this.
pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Current unix timestamp in milliseconds.
pub fn now_unix_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
