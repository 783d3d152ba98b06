//! The mode-0 meta-sequencer.
//!
//! Mode 0 runs at one-sixteenth the step rate: its step advances once
//! per bar. Each active event on mode 0 / pattern 0 / track 0 publishes
//! its four pot values as global musical parameters: pattern selection
//! for every playing mode, scale root, scale type, and velocity offset.

use gb_ir::{Event, Song, NUM_EVENTS, NUM_MODES, NUM_PATTERNS};

/// Song-mode step cursor and the parameters it drives.
pub struct Mode0Sequencer {
    step: usize,
    /// 1-16, derived from the highest active step on track 0.
    loop_length: usize,
    scale_root: u8,
    scale_type: u8,
    velocity_offsets: [i8; NUM_MODES],
    /// -1 means no override; play the user's current pattern.
    pattern_overrides: [i8; NUM_MODES],
}

impl Default for Mode0Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl Mode0Sequencer {
    pub fn new() -> Self {
        Self {
            step: 0,
            loop_length: NUM_EVENTS,
            scale_root: 0,
            scale_type: 0,
            velocity_offsets: [0; NUM_MODES],
            pattern_overrides: [-1; NUM_MODES],
        }
    }

    pub fn start(&mut self) {
        self.step = 0;
    }

    /// Advance one bar, wrapping at the loop length.
    pub fn advance_step(&mut self) {
        self.step = (self.step + 1) % self.loop_length;
    }

    pub fn current_step(&self) -> usize {
        self.step
    }

    pub fn loop_length(&self) -> usize {
        self.loop_length
    }

    /// Derive the loop length from the highest switched-on step of
    /// mode 0 / pattern 0 / track 0. An empty track keeps the full
    /// 16-step loop.
    pub fn calculate_loop_length(&mut self, song: &Song) {
        let track = song.mode(0).pattern(0).track(0);

        let mut max_step = None;
        for step in 0..NUM_EVENTS {
            if track.event(step).switch() {
                max_step = Some(step);
            }
        }

        self.loop_length = match max_step {
            Some(step) => (step + 1).clamp(1, NUM_EVENTS),
            None => NUM_EVENTS,
        };
        if self.step >= self.loop_length {
            self.step = 0;
        }
    }

    /// Read the track-0 event at the current song-mode step and, when
    /// its switch is on, publish its pots to every playing mode. An
    /// inactive step keeps the previous parameters.
    pub fn apply_parameters(&mut self, song: &Song) {
        let event = song.event(0, 0, 0, self.step);
        if !event.switch() {
            return;
        }

        let pattern = Self::pattern_from_pot(event.pot(0));
        let velocity = Self::velocity_from_pot(event.pot(3));
        for mode in 1..NUM_MODES {
            self.pattern_overrides[mode] = pattern;
            self.velocity_offsets[mode] = velocity;
        }

        self.scale_root = Self::scale_root_from_pot(event.pot(1));
        self.scale_type = Self::scale_type_from_pot(event.pot(2));
    }

    /// Apply a single event's parameters to one target mode, used when
    /// editing mode 0 with the target-mode cursor.
    pub fn parse_event(&mut self, event: Event, target_mode: usize) {
        if target_mode >= NUM_MODES || !event.switch() {
            return;
        }

        self.pattern_overrides[target_mode] = Self::pattern_from_pot(event.pot(0));
        self.scale_root = Self::scale_root_from_pot(event.pot(1));
        self.scale_type = Self::scale_type_from_pot(event.pot(2));
        self.velocity_offsets[target_mode] = Self::velocity_from_pot(event.pot(3));
    }

    /// Pattern override for a mode, or -1 for "no override". Out-of-range
    /// modes read as -1.
    pub fn pattern_override(&self, mode: usize) -> i8 {
        if mode >= NUM_MODES {
            return -1;
        }
        self.pattern_overrides[mode]
    }

    /// Velocity offset for a mode. Out-of-range modes read as 0.
    pub fn velocity_offset(&self, mode: usize) -> i8 {
        if mode >= NUM_MODES {
            return 0;
        }
        self.velocity_offsets[mode]
    }

    pub fn scale_root(&self) -> u8 {
        self.scale_root
    }

    pub fn scale_type(&self) -> u8 {
        self.scale_type
    }

    fn pattern_from_pot(pot: u8) -> i8 {
        ((usize::from(pot) * NUM_PATTERNS / 128).min(NUM_PATTERNS - 1)) as i8
    }

    fn scale_root_from_pot(pot: u8) -> u8 {
        ((usize::from(pot) * 12 / 128).min(11)) as u8
    }

    fn scale_type_from_pot(pot: u8) -> u8 {
        ((usize::from(pot) * 8 / 128).min(7)) as u8
    }

    fn velocity_from_pot(pot: u8) -> i8 {
        (i16::from(pot) - 64).clamp(-64, 63) as i8
    }
}
