//! In-memory sink implementations for tests and headless hosts.

use std::cell::RefCell;
use std::rc::Rc;

use crate::traits::{AudioSink, HardwareSink, MidiMessage};
use crate::{NUM_BUTTONS, NUM_ROTARY_POTS, NUM_SLIDER_POTS};

struct HardwareState {
    now_ms: u32,
    buttons: [bool; NUM_BUTTONS],
    rotary: [u8; NUM_ROTARY_POTS],
    sliders: [u8; NUM_SLIDER_POTS],
    led: bool,
    init_ok: bool,
    sent: Vec<MidiMessage>,
    led_changes: Vec<bool>,
}

/// A hardware sink backed by plain memory.
///
/// Time is a settable counter, button presses are latched until read,
/// and every MIDI message and LED transition is recorded. The handle is
/// cheaply cloneable over shared state, so a host can lend one clone to
/// the engine and keep another for driving time and inspecting output.
/// The rotary defaults sit at neutral positions (mode 1, ~120 BPM,
/// pattern 0, track 0) so an idle input scan leaves engine defaults
/// alone.
#[derive(Clone)]
pub struct VirtualHardware {
    state: Rc<RefCell<HardwareState>>,
}

impl Default for VirtualHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualHardware {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(HardwareState {
                now_ms: 0,
                buttons: [false; NUM_BUTTONS],
                // 9 -> mode 1, 42 -> 119 BPM (inside the tempo hysteresis)
                rotary: [9, 42, 0, 0],
                sliders: [0; NUM_SLIDER_POTS],
                led: false,
                init_ok: true,
                sent: Vec::new(),
                led_changes: Vec::new(),
            })),
        }
    }

    /// Make the next `init()` call fail.
    pub fn fail_init(&self) {
        self.state.borrow_mut().init_ok = false;
    }

    pub fn set_time(&self, ms: u32) {
        self.state.borrow_mut().now_ms = ms;
    }

    pub fn advance_time(&self, ms: u32) {
        self.state.borrow_mut().now_ms += ms;
    }

    /// Every MIDI message sent so far, in order.
    pub fn sent_messages(&self) -> Vec<MidiMessage> {
        self.state.borrow().sent.clone()
    }

    pub fn clear_messages(&self) {
        self.state.borrow_mut().sent.clear();
    }

    /// Count messages whose status byte matches.
    pub fn count_status(&self, status: u8) -> usize {
        self.state
            .borrow()
            .sent
            .iter()
            .filter(|m| m.status() == Some(status))
            .count()
    }

    /// LED on/off transitions in the order they happened.
    pub fn led_changes(&self) -> Vec<bool> {
        self.state.borrow().led_changes.clone()
    }

    pub fn led_state(&self) -> bool {
        self.state.borrow().led
    }

    /// Latch a button press without going through the trait.
    pub fn press_button(&self, button: usize) {
        if button < NUM_BUTTONS {
            self.state.borrow_mut().buttons[button] = true;
        }
    }

    pub fn set_rotary(&self, pot: usize, value: u8) {
        if pot < NUM_ROTARY_POTS {
            self.state.borrow_mut().rotary[pot] = value.min(127);
        }
    }

    pub fn set_slider(&self, pot: usize, value: u8) {
        if pot < NUM_SLIDER_POTS {
            self.state.borrow_mut().sliders[pot] = value.min(127);
        }
    }
}

impl HardwareSink for VirtualHardware {
    fn init(&mut self) -> bool {
        self.state.borrow().init_ok
    }

    fn shutdown(&mut self) {}

    fn read_button(&mut self, button: usize) -> bool {
        if button >= NUM_BUTTONS {
            return false;
        }
        let mut state = self.state.borrow_mut();
        let pressed = state.buttons[button];
        state.buttons[button] = false;
        pressed
    }

    fn read_rotary_pot(&mut self, pot: usize) -> u8 {
        self.state.borrow().rotary.get(pot).copied().unwrap_or(0)
    }

    fn read_slider_pot(&mut self, pot: usize) -> u8 {
        self.state.borrow().sliders.get(pot).copied().unwrap_or(0)
    }

    fn send_midi(&mut self, msg: &MidiMessage) {
        self.state.borrow_mut().sent.push(msg.clone());
    }

    fn set_led(&mut self, on: bool) {
        let mut state = self.state.borrow_mut();
        state.led = on;
        state.led_changes.push(on);
    }

    fn led(&self) -> bool {
        self.state.borrow().led
    }

    fn now_ms(&self) -> u32 {
        self.state.borrow().now_ms
    }

    fn simulate_button(&mut self, button: usize, pressed: bool) {
        if pressed {
            self.press_button(button);
        }
    }

    fn simulate_rotary_pot(&mut self, pot: usize, value: u8) {
        self.set_rotary(pot, value);
    }

    fn simulate_slider_pot(&mut self, pot: usize, value: u8) {
        self.set_slider(pot, value);
    }
}

struct AudioState {
    ready: bool,
    gain: f32,
    soundfont: Option<String>,
    received: Vec<Vec<u8>>,
}

/// An audio sink that records the MIDI it is fed.
#[derive(Clone)]
pub struct VirtualAudio {
    state: Rc<RefCell<AudioState>>,
}

impl Default for VirtualAudio {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualAudio {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(AudioState {
                ready: false,
                gain: 1.0,
                soundfont: None,
                received: Vec::new(),
            })),
        }
    }

    pub fn received(&self) -> Vec<Vec<u8>> {
        self.state.borrow().received.clone()
    }

    pub fn soundfont(&self) -> Option<String> {
        self.state.borrow().soundfont.clone()
    }
}

impl AudioSink for VirtualAudio {
    fn init(&mut self) -> bool {
        self.state.borrow_mut().ready = true;
        true
    }

    fn load_soundfont(&mut self, path: &str) -> bool {
        self.state.borrow_mut().soundfont = Some(path.to_string());
        true
    }

    fn is_ready(&self) -> bool {
        self.state.borrow().ready
    }

    fn send_midi(&mut self, data: &[u8]) {
        self.state.borrow_mut().received.push(data.to_vec());
    }

    fn set_gain(&mut self, gain: f32) {
        self.state.borrow_mut().gain = gain;
    }

    fn gain(&self) -> f32 {
        self.state.borrow().gain
    }
}
