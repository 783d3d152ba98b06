//! Host side of the per-mode script extension.
//!
//! Each mode slot runs one isolated script with two entry points:
//! `init(ctx)` and `process_event(track, event)`. The script runtime
//! itself lives behind the [`ModeScript`] and [`ScriptCompiler`] traits;
//! this module owns the calling convention, the per-context output
//! buffer, channel assignment, and error containment. A failed script
//! never takes down its neighbours: a load failure leaves an invalid
//! context that produces nothing, and a runtime fault produces nothing
//! for that tick only.

use tracing::warn;

use gb_ir::Event;

use crate::led::LedPattern;
use crate::scheduler::ScheduledMidiEvent;

/// Error type for script loading and execution.
#[derive(Debug)]
pub enum ScriptError {
    /// The source failed to parse or evaluate
    Compile(String),
    /// A required entry point is missing
    MissingEntryPoint(&'static str),
    /// A fault inside a script call
    Runtime(String),
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScriptError::Compile(msg) => write!(f, "failed to load script: {}", msg),
            ScriptError::MissingEntryPoint(name) => {
                write!(f, "script missing required function: {}()", name)
            }
            ScriptError::Runtime(msg) => write!(f, "script error: {}", msg),
        }
    }
}

impl std::error::Error for ScriptError {}

/// Parameters handed to a script's `init` entry point.
#[derive(Clone, Copy, Debug)]
pub struct InitContext {
    pub tempo: i32,
    pub mode_number: u8,
    pub midi_channel: u8,
    pub scale_root: u8,
    pub scale_type: u8,
    pub velocity_offset: i8,
}

impl InitContext {
    /// Context with neutral musical parameters, as used at load time.
    pub fn new(tempo: i32, mode_number: u8, midi_channel: u8) -> Self {
        Self {
            tempo,
            mode_number,
            midi_channel,
            scale_root: 0,
            scale_type: 0,
            velocity_offset: 0,
        }
    }
}

/// Step data handed to `process_event`.
#[derive(Clone, Copy, Debug)]
pub struct StepEvent {
    pub switch: bool,
    pub pots: [u8; 4],
}

impl From<Event> for StepEvent {
    fn from(event: Event) -> Self {
        Self { switch: event.switch(), pots: event.pots() }
    }
}

/// An LED pattern requested by a script via `led(name, brightness)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LedRequest {
    pub pattern: LedPattern,
    pub brightness: u8,
}

/// The host API exposed to scripts during `process_event`.
///
/// Scripts accumulate output by calling these methods; their return
/// value is ignored. The buffer is cleared before each call and drained
/// by the engine afterwards, which is also how LED requests travel back
/// without the script holding a reference to the engine.
pub struct ScriptOutput {
    channel: u8,
    events: Vec<ScheduledMidiEvent>,
    led: Option<LedRequest>,
}

impl ScriptOutput {
    fn new() -> Self {
        Self { channel: 0, events: Vec::new(), led: None }
    }

    /// Queue a Note On on the context's channel.
    pub fn note(&mut self, pitch: u8, velocity: u8, delta_ms: u32) {
        self.events
            .push(ScheduledMidiEvent::note_on(pitch, velocity, self.channel, delta_ms));
    }

    /// Queue a Note Off on the context's channel.
    pub fn off(&mut self, pitch: u8, delta_ms: u32) {
        self.events
            .push(ScheduledMidiEvent::note_off(pitch, self.channel, delta_ms));
    }

    /// Queue a Control Change on the context's channel.
    pub fn cc(&mut self, controller: u8, value: u8, delta_ms: u32) {
        self.events.push(ScheduledMidiEvent::control_change(
            controller, value, self.channel, delta_ms,
        ));
    }

    /// Queue All Notes Off on the context's channel.
    pub fn stopall(&mut self, delta_ms: u32) {
        self.events
            .push(ScheduledMidiEvent::all_notes_off(self.channel, delta_ms));
    }

    /// Request an LED pattern by name. Unknown names fall back to the
    /// tempo pulse. The last request in a call wins.
    pub fn led(&mut self, name: &str, brightness: u8) {
        self.led = Some(LedRequest { pattern: LedPattern::from_name(name), brightness });
    }

    fn clear(&mut self) {
        self.events.clear();
        self.led = None;
    }
}

/// One compiled mode script. Implemented by the embedded runtime
/// binding; [`FnScript`] is the in-process implementation used by tests
/// and demo content.
pub trait ModeScript {
    /// Called on load and whenever the engine reinitializes modes.
    fn init(&mut self, ctx: &InitContext) -> Result<(), ScriptError>;

    /// Called once per (track, step) while playing.
    fn process_event(
        &mut self,
        track: u8,
        event: &StepEvent,
        out: &mut ScriptOutput,
    ) -> Result<(), ScriptError>;

    /// Display name, read from the script's globals where supported.
    fn mode_name(&self) -> Option<String> {
        None
    }

    /// Labels for the four slider pots.
    fn slider_labels(&self) -> Option<[String; 4]> {
        None
    }
}

/// Compiles a script source file into a runnable [`ModeScript`].
pub trait ScriptCompiler {
    fn compile(&self, path: &std::path::Path) -> Result<Box<dyn ModeScript>, ScriptError>;
}

/// One mode slot: a script plus its channel, validity, and reusable
/// output buffer.
pub struct ScriptContext {
    script: Option<Box<dyn ModeScript>>,
    valid: bool,
    error: Option<String>,
    output: ScriptOutput,
}

impl Default for ScriptContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptContext {
    pub fn new() -> Self {
        Self {
            script: None,
            valid: false,
            error: None,
            output: ScriptOutput::new(),
        }
    }

    /// Install a compiled script directly.
    pub fn with_script(script: Box<dyn ModeScript>) -> Self {
        Self {
            script: Some(script),
            valid: true,
            error: None,
            output: ScriptOutput::new(),
        }
    }

    /// Compile and install a script from a source file. On failure the
    /// context becomes invalid and retains the error message.
    pub fn load(&mut self, compiler: &dyn ScriptCompiler, path: &std::path::Path) -> bool {
        match compiler.compile(path) {
            Ok(script) => {
                self.script = Some(script);
                self.valid = true;
                self.error = None;
                true
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "script load failed");
                self.script = None;
                self.valid = false;
                self.error = Some(e.to_string());
                false
            }
        }
    }

    /// MIDI channel used by the host API calls.
    pub fn set_channel(&mut self, channel: u8) {
        self.output.channel = channel & 0x0F;
    }

    pub fn channel(&self) -> u8 {
        self.output.channel
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Run the script's `init`. An init failure invalidates the context.
    pub fn call_init(&mut self, ctx: &InitContext) -> bool {
        if !self.valid {
            return false;
        }
        let Some(script) = self.script.as_mut() else {
            return false;
        };
        match script.init(ctx) {
            Ok(()) => true,
            Err(e) => {
                warn!(mode = ctx.mode_number, error = %e, "script init failed");
                self.valid = false;
                self.error = Some(e.to_string());
                false
            }
        }
    }

    /// Run `process_event` and hand back the accumulated MIDI plus any
    /// LED request. An invalid context or a runtime fault yields nothing;
    /// a fault does not invalidate the context.
    pub fn call_process_event(
        &mut self,
        track: u8,
        event: Event,
    ) -> (&[ScheduledMidiEvent], Option<LedRequest>) {
        self.output.clear();

        if !self.valid {
            return (&[], None);
        }
        let Some(script) = self.script.as_mut() else {
            return (&[], None);
        };

        let step = StepEvent::from(event);
        if let Err(e) = script.process_event(track, &step, &mut self.output) {
            warn!(track, error = %e, "script process_event failed");
            self.output.clear();
        }

        let led = self.output.led.take();
        (&self.output.events, led)
    }

    /// Display name, "Invalid" when the context is unusable.
    pub fn mode_name(&self) -> String {
        if !self.valid {
            return "Invalid".to_string();
        }
        self.script
            .as_ref()
            .and_then(|s| s.mode_name())
            .unwrap_or_else(|| "Unnamed".to_string())
    }

    /// Slider labels, defaulting to S1-S4.
    pub fn slider_labels(&self) -> [String; 4] {
        self.script
            .as_ref()
            .filter(|_| self.valid)
            .and_then(|s| s.slider_labels())
            .unwrap_or_else(|| {
                ["S1".to_string(), "S2".to_string(), "S3".to_string(), "S4".to_string()]
            })
    }
}

type InitFn = Box<dyn FnMut(&InitContext) + Send>;
type EventFn = Box<dyn FnMut(u8, &StepEvent, &mut ScriptOutput) + Send>;

/// A [`ModeScript`] built from closures.
pub struct FnScript {
    name: Option<String>,
    labels: Option<[String; 4]>,
    on_init: Option<InitFn>,
    on_event: EventFn,
}

impl FnScript {
    pub fn new(on_event: impl FnMut(u8, &StepEvent, &mut ScriptOutput) + Send + 'static) -> Self {
        Self {
            name: None,
            labels: None,
            on_init: None,
            on_event: Box::new(on_event),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_labels(mut self, labels: [&str; 4]) -> Self {
        self.labels = Some(labels.map(str::to_string));
        self
    }

    pub fn with_init(mut self, on_init: impl FnMut(&InitContext) + Send + 'static) -> Self {
        self.on_init = Some(Box::new(on_init));
        self
    }
}

impl ModeScript for FnScript {
    fn init(&mut self, ctx: &InitContext) -> Result<(), ScriptError> {
        if let Some(f) = self.on_init.as_mut() {
            f(ctx);
        }
        Ok(())
    }

    fn process_event(
        &mut self,
        track: u8,
        event: &StepEvent,
        out: &mut ScriptOutput,
    ) -> Result<(), ScriptError> {
        (self.on_event)(track, event, out);
        Ok(())
    }

    fn mode_name(&self) -> Option<String> {
        self.name.clone()
    }

    fn slider_labels(&self) -> Option<[String; 4]> {
        self.labels.clone()
    }
}
