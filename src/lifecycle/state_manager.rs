//! State Manager (C7, spec §4.7). COLD/WARM/HOT lifecycle per mint, TTLs,
//! and the alert cooldown gate. HOT promotion additionally reports whether
//! backfill should be scheduled (the Orchestrator drives the actual replay
//! through C8/C4/C5).

use std::collections::HashMap;
use std::sync::Mutex;

use crate::model::{TokenProfile, TokenState};

pub struct StateManagerConfig {
    pub hot_ttl_seconds: i64,
    pub warm_ttl_seconds: i64,
    pub alert_cooldown_seconds: i64,
}

struct Entry {
    profile: TokenProfile,
    last_activity_at: i64,
}

pub struct StateManager {
    config: StateManagerConfig,
    mints: Mutex<HashMap<String, Entry>>,
}

impl StateManager {
    pub fn new(config: StateManagerConfig) -> Self {
        Self { config, mints: Mutex::new(HashMap::new()) }
    }

    fn entry<'a>(mints: &'a mut HashMap<String, Entry>, mint: &str, now: i64) -> &'a mut Entry {
        mints.entry(mint.to_string()).or_insert_with(|| Entry {
            profile: TokenProfile::new_cold(mint.to_string(), now),
            last_activity_at: now,
        })
    }

    /// COLD -> WARM on first activity (SwapEvent or MintTouchEvent).
    pub fn record_activity(&self, mint: &str, now: i64) {
        let mut mints = self.mints.lock().unwrap();
        let entry = Self::entry(&mut mints, mint, now);
        entry.last_activity_at = now;
        if entry.profile.state == TokenState::Cold {
            entry.profile.state = TokenState::Warm;
            entry.profile.state_since = now;
        }
    }

    /// WARM -> HOT on any trigger fire. Returns `true` if this is a fresh
    /// promotion (was not already HOT) so the caller can schedule backfill.
    pub fn promote_hot(&self, mint: &str, now: i64) -> bool {
        let mut mints = self.mints.lock().unwrap();
        let entry = Self::entry(&mut mints, mint, now);
        entry.last_activity_at = now;
        let was_hot = entry.profile.state == TokenState::Hot;
        if !was_hot {
            entry.profile.state = TokenState::Hot;
            entry.profile.state_since = now;
        }
        entry.profile.hot_ttl_expires_at = Some(now + self.config.hot_ttl_seconds);
        !was_hot
    }

    /// Per-mint alert cooldown gate (spec §4.7: "independent of state").
    /// Returns `true` if an alert may be sent, and records the send.
    pub fn gate_alert(&self, mint: &str, now: i64) -> bool {
        let mut mints = self.mints.lock().unwrap();
        let entry = Self::entry(&mut mints, mint, now);
        let allowed = entry
            .profile
            .last_alert_at
            .map(|t| now - t >= self.config.alert_cooldown_seconds)
            .unwrap_or(true);
        if allowed {
            entry.profile.last_alert_at = Some(now);
        }
        allowed
    }

    /// Sweeps HOT -> WARM (TTL expiry) and WARM -> COLD (inactivity) for
    /// every known mint. Called once per detector tick.
    pub fn tick(&self, now: i64) {
        let mut mints = self.mints.lock().unwrap();
        for entry in mints.values_mut() {
            match entry.profile.state {
                TokenState::Hot => {
                    if let Some(expiry) = entry.profile.hot_ttl_expires_at {
                        if now >= expiry {
                            entry.profile.state = TokenState::Warm;
                            entry.profile.state_since = now;
                            entry.profile.hot_ttl_expires_at = None;
                        }
                    }
                }
                TokenState::Warm => {
                    if now - entry.last_activity_at >= self.config.warm_ttl_seconds {
                        entry.profile.state = TokenState::Cold;
                        entry.profile.state_since = now;
                    }
                }
                TokenState::Cold => {}
            }
        }
    }

    pub fn state_of(&self, mint: &str) -> Option<TokenState> {
        self.mints.lock().unwrap().get(mint).map(|e| e.profile.state)
    }

    pub fn snapshot(&self, mint: &str) -> Option<TokenProfile> {
        self.mints.lock().unwrap().get(mint).map(|e| e.profile.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> StateManagerConfig {
        StateManagerConfig { hot_ttl_seconds: 3600, warm_ttl_seconds: 1800, alert_cooldown_seconds: 300 }
    }

    #[test]
    fn first_activity_moves_cold_to_warm() {
        let sm = StateManager::new(config());
        sm.record_activity("M", 100);
        assert_eq!(sm.state_of("M"), Some(TokenState::Warm));
    }

    #[test]
    fn trigger_fire_promotes_to_hot_and_reports_first_promotion() {
        let sm = StateManager::new(config());
        sm.record_activity("M", 100);
        let fresh = sm.promote_hot("M", 101);
        assert!(fresh);
        assert_eq!(sm.state_of("M"), Some(TokenState::Hot));

        let fresh_again = sm.promote_hot("M", 102);
        assert!(!fresh_again);
    }

    #[test]
    fn hot_expires_to_warm_exactly_at_ttl() {
        let sm = StateManager::new(config());
        sm.record_activity("M", 0);
        sm.promote_hot("M", 0); // hot_ttl_expires_at = 3600
        sm.tick(3599);
        assert_eq!(sm.state_of("M"), Some(TokenState::Hot));
        sm.tick(3600);
        assert_eq!(sm.state_of("M"), Some(TokenState::Warm));
    }

    #[test]
    fn warm_falls_back_to_cold_after_inactivity() {
        let sm = StateManager::new(config());
        sm.record_activity("M", 0);
        sm.tick(1799);
        assert_eq!(sm.state_of("M"), Some(TokenState::Warm));
        sm.tick(1800);
        assert_eq!(sm.state_of("M"), Some(TokenState::Cold));
    }

    #[test]
    fn alert_cooldown_gates_independent_of_state() {
        let sm = StateManager::new(config());
        assert!(sm.gate_alert("M", 100));
        assert!(!sm.gate_alert("M", 200));
        assert!(sm.gate_alert("M", 400));
    }
}
