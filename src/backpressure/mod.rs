//! Backpressure Controller (C9, spec §4.9). Samples lag and buffer length
//! every second, publishes a process-wide `Mode` (spec §9: "a single
//! atomically-loaded enum ... no cross-component synchronization beyond this
//! load"), and applies hysteresis on recovery.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::model::{Mode, ModeCell};

#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub lag_warn_s: i64,
    pub lag_crit_s: i64,
    pub buf_warn: u64,
    pub buf_crit: u64,
}

/// Consecutive confirming samples required before recovering toward NORMAL
/// (spec §4.9: "Hysteresis: require 5 consecutive samples").
const RECOVERY_CONFIRMATIONS: u32 = 5;

pub struct BackpressureController {
    thresholds: Mutex<Thresholds>,
    mode: ModeCell,
    consecutive_recovery_samples: AtomicU32,
}

impl BackpressureController {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds: Mutex::new(thresholds),
            mode: ModeCell::new(Mode::Normal),
            consecutive_recovery_samples: AtomicU32::new(0),
        }
    }

    pub fn set_thresholds(&self, thresholds: Thresholds) {
        *self.thresholds.lock().unwrap() = thresholds;
    }

    pub fn mode(&self) -> Mode {
        self.mode.load()
    }

    fn target_mode(thresholds: &Thresholds, lag_s: i64, buffer_len: u64) -> Mode {
        if lag_s >= thresholds.lag_crit_s || buffer_len >= thresholds.buf_crit {
            Mode::Critical
        } else if lag_s >= thresholds.lag_warn_s || buffer_len >= thresholds.buf_warn {
            Mode::Degraded
        } else {
            Mode::Normal
        }
    }

    /// Feed one sample (spec: sampled every second). Returns the mode after
    /// applying this sample.
    pub fn sample(&self, lag_s: i64, buffer_len: u64) -> Mode {
        let thresholds = *self.thresholds.lock().unwrap();
        let target = Self::target_mode(&thresholds, lag_s, buffer_len);
        let current = self.mode.load();

        let severity = |m: Mode| match m {
            Mode::Normal => 0,
            Mode::Degraded => 1,
            Mode::Critical => 2,
        };

        let new_mode = if severity(target) >= severity(current) {
            self.consecutive_recovery_samples.store(0, Ordering::Relaxed);
            target
        } else {
            let confirmations = self.consecutive_recovery_samples.fetch_add(1, Ordering::Relaxed) + 1;
            if confirmations >= RECOVERY_CONFIRMATIONS {
                self.consecutive_recovery_samples.store(0, Ordering::Relaxed);
                target
            } else {
                current
            }
        };

        if new_mode != current {
            log::warn!("⚠️ backpressure mode {} -> {}", current.as_str(), new_mode.as_str());
        }
        self.mode.store(new_mode);
        new_mode
    }
}
