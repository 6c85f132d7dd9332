//! Process-wide backpressure mode, published by the backpressure controller (C9)
//! and read by the delta extractor, swap inferencer, clusterer and dispatcher.

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Degraded,
    Critical,
}

impl Mode {
    fn as_u8(self) -> u8 {
        match self {
            Mode::Normal => 0,
            Mode::Degraded => 1,
            Mode::Critical => 2,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => Mode::Normal,
            1 => Mode::Degraded,
            _ => Mode::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Normal => "NORMAL",
            Mode::Degraded => "DEGRADED",
            Mode::Critical => "CRITICAL",
        }
    }
}

/// Single atomically-loaded process mode (see spec §9, "global/process-wide mode").
/// No cross-component synchronization beyond this load.
#[derive(Debug)]
pub struct ModeCell(AtomicU8);

impl ModeCell {
    pub fn new(initial: Mode) -> Self {
        Self(AtomicU8::new(initial.as_u8()))
    }

    pub fn load(&self) -> Mode {
        Mode::from_u8(self.0.load(Ordering::Relaxed))
    }

    pub fn store(&self, mode: Mode) {
        self.0.store(mode.as_u8(), Ordering::Relaxed);
    }
}

impl Default for ModeCell {
    fn default() -> Self {
        Self::new(Mode::Normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_atomic() {
        let cell = ModeCell::new(Mode::Normal);
        assert_eq!(cell.load(), Mode::Normal);
        cell.store(Mode::Critical);
        assert_eq!(cell.load(), Mode::Critical);
        cell.store(Mode::Degraded);
        assert_eq!(cell.load(), Mode::Degraded);
    }
}
