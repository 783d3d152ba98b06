//! Transport state: tempo, position cursors, step timing.

use gb_ir::{NUM_MODES, NUM_PATTERNS, NUM_TRACKS};

use crate::STEPS_PER_BAR;

/// Wait after the last tempo change before scripts are reinitialized.
const TEMPO_DEBOUNCE_MS: u32 = 1000;

/// Playback transport and edit cursors.
///
/// Step timing: at 120 BPM one beat is 500ms and a bar is 16 steps over
/// 4 beats, so one step is 125ms: `(60_000 / bpm) / 4`.
pub struct PlaybackState {
    playing: bool,
    tempo: i32,
    current_mode: usize,
    current_pattern: usize,
    current_track: usize,
    current_step: usize,
    /// Mode edited by the song sequencer's target-mode cursor (1-14).
    target_mode: usize,
    last_step_time_ms: u32,
    step_interval_ms: u32,
    reinit_pending: bool,
    last_tempo_change_ms: u32,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackState {
    pub fn new() -> Self {
        let mut state = Self {
            playing: false,
            tempo: 120,
            current_mode: 1,
            current_pattern: 0,
            current_track: 0,
            current_step: 0,
            target_mode: 1,
            last_step_time_ms: 0,
            step_interval_ms: 0,
            reinit_pending: false,
            last_tempo_change_ms: 0,
        };
        state.recalculate_step_interval();
        state
    }

    pub fn start(&mut self, now_ms: u32) {
        self.playing = true;
        self.current_step = 0;
        self.last_step_time_ms = now_ms;
    }

    pub fn stop(&mut self) {
        self.playing = false;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// True when playing and a full step interval has elapsed.
    pub fn should_advance_step(&self, now_ms: u32) -> bool {
        self.playing && now_ms.wrapping_sub(self.last_step_time_ms) >= self.step_interval_ms
    }

    pub fn advance_step(&mut self, now_ms: u32) {
        self.last_step_time_ms = now_ms;
        self.current_step = (self.current_step + 1) % STEPS_PER_BAR;
    }

    /// Clamp to 1-1000 BPM, recompute the step interval, and arm the
    /// debounced script-reinit request.
    pub fn set_tempo(&mut self, bpm: i32, now_ms: u32) {
        self.tempo = bpm.clamp(1, 1000);
        self.recalculate_step_interval();
        self.reinit_pending = true;
        self.last_tempo_change_ms = now_ms;
    }

    pub fn tempo(&self) -> i32 {
        self.tempo
    }

    pub fn step_interval_ms(&self) -> u32 {
        self.step_interval_ms
    }

    /// Out-of-range values are ignored.
    pub fn set_mode(&mut self, mode: usize) {
        if mode < NUM_MODES {
            self.current_mode = mode;
        }
    }

    pub fn set_pattern(&mut self, pattern: usize) {
        if pattern < NUM_PATTERNS {
            self.current_pattern = pattern;
        }
    }

    pub fn set_track(&mut self, track: usize) {
        if track < NUM_TRACKS {
            self.current_track = track;
        }
    }

    /// Target mode is 1-14; mode 0 cannot be a target.
    pub fn set_target_mode(&mut self, mode: usize) {
        if (1..NUM_MODES).contains(&mode) {
            self.target_mode = mode;
        }
    }

    pub fn current_mode(&self) -> usize {
        self.current_mode
    }

    pub fn current_pattern(&self) -> usize {
        self.current_pattern
    }

    pub fn current_track(&self) -> usize {
        self.current_track
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn target_mode(&self) -> usize {
        self.target_mode
    }

    /// True once the tempo has been stable for the debounce window.
    pub fn is_reinit_pending(&self, now_ms: u32) -> bool {
        self.reinit_pending
            && now_ms.wrapping_sub(self.last_tempo_change_ms) >= TEMPO_DEBOUNCE_MS
    }

    pub fn clear_reinit_pending(&mut self) {
        self.reinit_pending = false;
    }

    fn recalculate_step_interval(&mut self) {
        self.step_interval_ms = ((60_000 / self.tempo) / 4) as u32;
    }
}
