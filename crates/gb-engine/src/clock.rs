//! MIDI clock emission at 24 PPQN.
//!
//! Pulses are timed against an absolute anchor captured at `start()`, so
//! a late update loop catches up by emitting every missed pulse rather
//! than letting the clock drift. Per-pulse deadlines are recomputed from
//! the integer tempo so whole-beat boundaries land exactly.

use gb_hal::{HardwareSink, MidiMessage};

use crate::MIDI_PPQN;

/// Emits MIDI real-time clock, start, and stop.
pub struct MidiClockManager {
    tempo: i32,
    /// Absolute anchor captured at start().
    start_time_ms: u32,
    pulse_count: u32,
    /// Interval between pulses; kept as f64 for introspection and to
    /// avoid cumulative rounding at fractional intervals.
    interval_ms: f64,
    running: bool,
}

impl Default for MidiClockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MidiClockManager {
    pub fn new() -> Self {
        let mut clock = Self {
            tempo: 120,
            start_time_ms: 0,
            pulse_count: 0,
            interval_ms: 0.0,
            running: false,
        };
        clock.recalculate_interval();
        clock
    }

    /// Anchor the clock at `now_ms`, reset the pulse count, and emit
    /// MIDI Start.
    pub fn start(&mut self, now_ms: u32, hw: &mut dyn HardwareSink) {
        self.start_time_ms = now_ms;
        self.pulse_count = 0;
        self.running = true;
        hw.send_midi(&MidiMessage::new(&[0xFA], now_ms));
    }

    /// Emit MIDI Stop and halt pulse emission. Idempotent: a second stop
    /// sends nothing.
    pub fn stop(&mut self, now_ms: u32, hw: &mut dyn HardwareSink) {
        if self.running {
            self.running = false;
            hw.send_midi(&MidiMessage::new(&[0xFC], now_ms));
        }
    }

    /// Emit every pulse that has come due since the last call.
    pub fn update(&mut self, now_ms: u32, hw: &mut dyn HardwareSink) {
        if !self.running {
            return;
        }

        let elapsed = f64::from(now_ms.wrapping_sub(self.start_time_ms));
        while elapsed > self.pulse_deadline(self.pulse_count) {
            hw.send_midi(&MidiMessage::new(&[0xF8], now_ms));
            self.pulse_count += 1;
        }
    }

    /// Recompute the pulse interval. The anchor and pulse count are kept,
    /// so emission continues relative to the original start; a stop/start
    /// pair resets the anchor.
    pub fn set_tempo(&mut self, bpm: i32) {
        self.tempo = bpm.max(1);
        self.recalculate_interval();
    }

    pub fn tempo(&self) -> i32 {
        self.tempo
    }

    /// Interval between pulses in milliseconds (~20.833 at 120 BPM).
    pub fn interval_ms(&self) -> f64 {
        self.interval_ms
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    fn recalculate_interval(&mut self) {
        self.interval_ms = 60_000.0 / f64::from(self.tempo) / f64::from(MIDI_PPQN);
    }

    /// Milliseconds after the anchor at which pulse `n` is due. Computed
    /// as one division so that e.g. pulse 24 at 120 BPM lands on exactly
    /// 500.0 rather than 24 * 20.8333... = 499.999....
    fn pulse_deadline(&self, pulse: u32) -> f64 {
        f64::from(pulse) * 60_000.0 / (f64::from(self.tempo) * f64::from(MIDI_PPQN))
    }
}
