//! Patterns (8 tracks) and modes (32 patterns).

use crate::event::{Event, Track};
use crate::{NUM_PATTERNS, NUM_TRACKS};

/// Eight tracks of sixteen steps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pattern {
    tracks: [Track; NUM_TRACKS],
}

impl Pattern {
    /// Read a track. Out-of-range indices clamp to the last track.
    pub fn track(&self, track: usize) -> &Track {
        &self.tracks[track.min(NUM_TRACKS - 1)]
    }

    pub fn track_mut(&mut self, track: usize) -> &mut Track {
        &mut self.tracks[track.min(NUM_TRACKS - 1)]
    }

    /// Read the event at (track, step).
    pub fn event(&self, track: usize, step: usize) -> Event {
        self.track(track).event(step)
    }

    pub fn event_mut(&mut self, track: usize, step: usize) -> &mut Event {
        self.track_mut(track).event_mut(step)
    }

    pub fn clear(&mut self) {
        for track in &mut self.tracks {
            track.clear();
        }
    }
}

/// Thirty-two patterns. Each mode's script output occupies one MIDI channel.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Mode {
    patterns: [Pattern; NUM_PATTERNS],
}

impl Mode {
    /// Read a pattern. Out-of-range indices clamp to the last pattern.
    pub fn pattern(&self, pattern: usize) -> &Pattern {
        &self.patterns[pattern.min(NUM_PATTERNS - 1)]
    }

    pub fn pattern_mut(&mut self, pattern: usize) -> &mut Pattern {
        &mut self.patterns[pattern.min(NUM_PATTERNS - 1)]
    }

    pub fn clear(&mut self) {
        for pattern in &mut self.patterns {
            pattern.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_event_access() {
        let mut pattern = Pattern::default();
        pattern.event_mut(2, 10).set_switch(true);

        assert!(pattern.event(2, 10).switch());
        assert!(!pattern.event(2, 9).switch());
        assert!(!pattern.event(1, 10).switch());
    }

    #[test]
    fn pattern_track_index_clamps() {
        let mut pattern = Pattern::default();
        pattern.event_mut(99, 0).set_switch(true);
        assert!(pattern.event(7, 0).switch());
    }

    #[test]
    fn mode_pattern_index_clamps() {
        let mut mode = Mode::default();
        mode.pattern_mut(99).event_mut(0, 0).set_switch(true);
        assert!(mode.pattern(31).event(0, 0).switch());
    }

    #[test]
    fn clear_zeroes_every_step() {
        let mut mode = Mode::default();
        mode.pattern_mut(3).event_mut(4, 5).set_pot(0, 64);
        mode.clear();
        assert_eq!(mode.pattern(3).event(4, 5), Event::empty());
    }
}
