//! Hardware and audio sink interfaces for the gridbox sequencer.
//!
//! The core engine talks to the outside world through two capability
//! traits: [`HardwareSink`] (buttons, pots, LED, MIDI out, monotonic
//! time) and [`AudioSink`] (a MIDI-to-audio renderer). Platform crates
//! implement them for real hardware; [`VirtualHardware`] and
//! [`VirtualAudio`] implement them in memory for tests and headless runs.

mod traits;
mod virtual_sink;

pub use traits::{AudioSink, HardwareSink, MidiMessage};
pub use virtual_sink::{VirtualAudio, VirtualHardware};

/// Step buttons on the front panel.
pub const NUM_BUTTONS: usize = 16;

/// Rotary pots (mode, tempo, pattern, track selectors).
pub const NUM_ROTARY_POTS: usize = 4;

/// Slider pots (per-mode parameters, captured into events).
pub const NUM_SLIDER_POTS: usize = 4;
