//! Sink traits and the wire-level MIDI message type.

use arrayvec::ArrayVec;

/// A raw MIDI message with an absolute timestamp.
///
/// Channel voice and system real-time messages are at most three bytes,
/// so the payload lives inline and the type is cheap to copy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MidiMessage {
    pub data: ArrayVec<u8, 3>,
    pub timestamp_ms: u32,
}

impl MidiMessage {
    /// Build a message from raw bytes. Bytes past the third are ignored.
    pub fn new(bytes: &[u8], timestamp_ms: u32) -> Self {
        let mut data = ArrayVec::new();
        for &b in bytes.iter().take(3) {
            data.push(b);
        }
        Self { data, timestamp_ms }
    }

    /// Status byte, if the message is non-empty.
    pub fn status(&self) -> Option<u8> {
        self.data.first().copied()
    }
}

/// Front-panel and MIDI transport capabilities supplied by the platform.
///
/// All methods are expected to be non-blocking; the engine calls them
/// from its cooperative update loop.
pub trait HardwareSink {
    /// Bring the hardware up. Returns false on failure, in which case the
    /// engine refuses to start.
    fn init(&mut self) -> bool;

    fn shutdown(&mut self);

    /// Consume a press of step button 0-15. Returns true at most once per
    /// physical press.
    fn read_button(&mut self, button: usize) -> bool;

    /// Rotary pot 0-3, scaled to 0-127.
    fn read_rotary_pot(&mut self, pot: usize) -> u8;

    /// Slider pot 0-3, scaled to 0-127.
    fn read_slider_pot(&mut self, pot: usize) -> u8;

    fn send_midi(&mut self, msg: &MidiMessage);

    fn set_led(&mut self, on: bool);

    fn led(&self) -> bool;

    /// Monotonic milliseconds since startup.
    fn now_ms(&self) -> u32;

    /// Per-loop poll hook (GPIO scan, MIDI port pump, ...).
    fn update(&mut self) {}

    /// Input injection for hosts without physical controls. Physical
    /// implementations leave these as no-ops.
    fn simulate_button(&mut self, _button: usize, _pressed: bool) {}
    fn simulate_rotary_pot(&mut self, _pot: usize, _value: u8) {}
    fn simulate_slider_pot(&mut self, _pot: usize, _value: u8) {}
}

/// An optional MIDI-to-audio renderer (internal synthesizer).
pub trait AudioSink {
    /// Bring the synthesizer up. Returns false on failure.
    fn init(&mut self) -> bool;

    /// Load an instrument bank. Returns false on failure.
    fn load_soundfont(&mut self, path: &str) -> bool;

    /// True once the sink can accept MIDI.
    fn is_ready(&self) -> bool;

    /// Feed one raw MIDI message.
    fn send_midi(&mut self, data: &[u8]);

    fn set_gain(&mut self, gain: f32);

    fn gain(&self) -> f32;
}
