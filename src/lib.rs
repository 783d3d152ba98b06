//! gridbox — a 15-channel polyphonic step sequencer / groovebox core.
//!
//! The workspace splits along the data flow: `gb-ir` holds the
//! bit-packed event grid, `gb-formats` persists it, `gb-hal` defines the
//! hardware and audio sink interfaces, and `gb-engine` runs the
//! cooperative playback loop. This crate re-exports the pieces a host
//! shell needs.

pub use gb_engine::{
    Engine, FnScript, InitContext, LedController, LedPattern, LedRequest, MidiClockManager,
    MidiScheduler, Mode0Sequencer, ModeScript, PlaybackState, ScheduledMidiEvent, ScriptCompiler,
    ScriptContext, ScriptError, ScriptLoader, ScriptOutput, StepEvent, MIDI_PPQN,
    SCHEDULER_CAPACITY, STEPS_PER_BAR,
};
pub use gb_formats::FormatError;
pub use gb_hal::{AudioSink, HardwareSink, MidiMessage, VirtualAudio, VirtualHardware};
pub use gb_ir::{Event, Mode, Pattern, Song, Track, NUM_EVENTS, NUM_MODES, NUM_PATTERNS, NUM_TRACKS};
