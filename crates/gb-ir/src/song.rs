//! The top-level song grid: 15 modes.

use crate::event::Event;
use crate::pattern::Mode;
use crate::{NUM_EVENTS, NUM_MODES, NUM_PATTERNS, NUM_TRACKS};

/// The complete event grid.
///
/// 15 modes x 32 patterns x 8 tracks x 16 events = 61,440 events, four
/// bytes each. On constrained targets this is the dominant static
/// allocation, so the storage is flat fixed-size arrays and is never
/// grown.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Song {
    modes: [Mode; NUM_MODES],
}

impl Song {
    /// A zeroed song.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a mode. Out-of-range indices clamp to the last mode.
    pub fn mode(&self, mode: usize) -> &Mode {
        &self.modes[mode.min(NUM_MODES - 1)]
    }

    pub fn mode_mut(&mut self, mode: usize) -> &mut Mode {
        &mut self.modes[mode.min(NUM_MODES - 1)]
    }

    /// Read the event at (mode, pattern, track, step).
    pub fn event(&self, mode: usize, pattern: usize, track: usize, step: usize) -> Event {
        self.mode(mode).pattern(pattern).event(track, step)
    }

    pub fn event_mut(
        &mut self,
        mode: usize,
        pattern: usize,
        track: usize,
        step: usize,
    ) -> &mut Event {
        self.mode_mut(mode).pattern_mut(pattern).event_mut(track, step)
    }

    /// Zero the whole grid.
    pub fn clear(&mut self) {
        for mode in &mut self.modes {
            mode.clear();
        }
    }

    /// Exact size of the event data in bytes.
    pub const fn memory_footprint() -> usize {
        NUM_MODES * NUM_PATTERNS * NUM_TRACKS * NUM_EVENTS * core::mem::size_of::<Event>()
    }
}
