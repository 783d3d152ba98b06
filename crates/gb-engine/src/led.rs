//! LED feedback state machine.
//!
//! One physical LED carries all user feedback through distinct blink
//! waveforms. Triggering a pattern turns the LED on immediately;
//! `update` drives the waveform from elapsed time. Saving and Error are
//! finite and fall back to the tempo pulse when done.

use gb_hal::HardwareSink;

/// How long the tempo pulse stays lit each beat.
const TEMPO_PULSE_MS: u32 = 50;

/// The available LED waveforms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LedPattern {
    /// One 50ms pulse, retriggered by the engine every beat.
    TempoBeat,
    /// Fast double-blink loop: 100ms on, 50ms off, 100ms on, 150ms off.
    ButtonHeld,
    /// Five 100ms/100ms blinks over one second, then back to TempoBeat.
    Saving,
    /// Slow pulse: one second on, one second off.
    Loading,
    /// Three 50ms/50ms blinks over 300ms, then back to TempoBeat.
    Error,
    /// Long/short loop: 200ms on, 100ms off.
    MirrorMode,
}

impl LedPattern {
    /// Name mapping used by the script API. Unknown names fall back to
    /// the tempo pulse.
    pub fn from_name(name: &str) -> Self {
        match name {
            "tempo" => LedPattern::TempoBeat,
            "held" => LedPattern::ButtonHeld,
            "saving" => LedPattern::Saving,
            "loading" => LedPattern::Loading,
            "error" => LedPattern::Error,
            "mirror" => LedPattern::MirrorMode,
            _ => LedPattern::TempoBeat,
        }
    }
}

/// Drives the LED waveform for the active pattern.
pub struct LedController {
    pattern: LedPattern,
    on: bool,
    brightness: u8,
    pattern_start_ms: u32,
    phase_start_ms: u32,
}

impl Default for LedController {
    fn default() -> Self {
        Self::new()
    }
}

impl LedController {
    pub fn new() -> Self {
        Self {
            pattern: LedPattern::TempoBeat,
            on: false,
            brightness: 255,
            pattern_start_ms: 0,
            phase_start_ms: 0,
        }
    }

    /// Switch to a pattern and light the LED.
    pub fn trigger(
        &mut self,
        pattern: LedPattern,
        brightness: u8,
        now_ms: u32,
        hw: &mut dyn HardwareSink,
    ) {
        self.pattern = pattern;
        self.brightness = brightness;
        self.pattern_start_ms = now_ms;
        self.phase_start_ms = now_ms;
        self.on = true;
        hw.set_led(true);
    }

    /// Trigger by script-facing name.
    pub fn trigger_by_name(
        &mut self,
        name: &str,
        brightness: u8,
        now_ms: u32,
        hw: &mut dyn HardwareSink,
    ) {
        self.trigger(LedPattern::from_name(name), brightness, now_ms, hw);
    }

    pub fn pattern(&self) -> LedPattern {
        self.pattern
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    /// Advance the waveform.
    pub fn update(&mut self, now_ms: u32, hw: &mut dyn HardwareSink) {
        let pattern_elapsed = now_ms.wrapping_sub(self.pattern_start_ms);
        let phase_elapsed = now_ms.wrapping_sub(self.phase_start_ms);

        match self.pattern {
            LedPattern::TempoBeat => {
                if self.on && phase_elapsed >= TEMPO_PULSE_MS {
                    self.set(false, hw);
                }
            }

            LedPattern::ButtonHeld => {
                if pattern_elapsed < 100 {
                    self.set(true, hw);
                } else if pattern_elapsed < 150 {
                    self.set(false, hw);
                } else if pattern_elapsed < 250 {
                    self.set(true, hw);
                } else if pattern_elapsed < 400 {
                    self.set(false, hw);
                } else {
                    self.pattern_start_ms = now_ms;
                }
            }

            LedPattern::Saving => {
                let cycle = phase_elapsed / 200;
                if cycle >= 5 {
                    self.pattern = LedPattern::TempoBeat;
                    self.set(false, hw);
                } else {
                    self.set(phase_elapsed % 200 < 100, hw);
                }
            }

            LedPattern::Loading => {
                self.set(pattern_elapsed % 2000 < 1000, hw);
            }

            LedPattern::Error => {
                let cycle = phase_elapsed / 100;
                if cycle >= 3 {
                    self.pattern = LedPattern::TempoBeat;
                    self.set(false, hw);
                } else {
                    self.set(phase_elapsed % 100 < 50, hw);
                }
            }

            LedPattern::MirrorMode => {
                if pattern_elapsed < 200 {
                    self.set(true, hw);
                } else if pattern_elapsed < 300 {
                    self.set(false, hw);
                } else {
                    self.pattern_start_ms = now_ms;
                }
            }
        }
    }

    /// Write the LED only on transitions.
    fn set(&mut self, on: bool, hw: &mut dyn HardwareSink) {
        if self.on != on {
            self.on = on;
            hw.set_led(on);
        }
    }
}
