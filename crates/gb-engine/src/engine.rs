//! The composition root: wires transport, scheduling, scripts, LED
//! feedback, and autosave into one cooperative update loop.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use gb_formats::FormatError;
use gb_hal::{AudioSink, HardwareSink, MidiMessage, NUM_BUTTONS, NUM_SLIDER_POTS};
use gb_ir::{Event, Song, NUM_EVENTS, NUM_MODES, NUM_TRACKS};

use crate::clock::MidiClockManager;
use crate::led::{LedController, LedPattern};
use crate::loader::ScriptLoader;
use crate::mode0::Mode0Sequencer;
use crate::playback_state::PlaybackState;
use crate::scheduler::{MidiScheduler, ScheduledMidiEvent};
use crate::script::InitContext;

/// Continuous dirtiness before an automatic binary snapshot.
const AUTOSAVE_AFTER_MS: u32 = 20_000;

/// General-MIDI program per mode, sent as a Program Change on (re)init.
/// Mode 10 plays drums; channel 10 ignores the program anyway.
const DEFAULT_MODE_PROGRAMS: [u8; NUM_MODES] = [
    0,  // mode 0: song sequencer, no output
    48, // strings ensemble
    33, // electric bass (finger)
    38, // synth bass 1
    81, // sawtooth lead
    24, // nylon guitar
    88, // new age pad
    56, // trumpet
    4,  // electric piano 1
    81, // sawtooth lead
    0,  // drums
    40, // violin
    16, // drawbar organ
    65, // alto sax
    98, // crystal fx
];

/// The playback engine.
///
/// Owns the song grid and every runtime component; borrows the
/// platform's hardware sink for its lifetime. Call [`Engine::update`]
/// at ~60 Hz.
pub struct Engine<'h> {
    song: Song,
    hw: &'h mut dyn HardwareSink,
    audio: Option<Box<dyn AudioSink>>,
    scheduler: MidiScheduler,
    clock: MidiClockManager,
    led: LedController,
    playback: PlaybackState,
    mode0: Mode0Sequencer,
    scripts: ScriptLoader,
    mode_programs: [u8; NUM_MODES],
    initialized: bool,
    dirty: bool,
    dirty_since_ms: u32,
    autosave_path: PathBuf,
}

impl<'h> Engine<'h> {
    pub fn new(song: Song, hw: &'h mut dyn HardwareSink, scripts: ScriptLoader) -> Self {
        let mut engine = Self {
            song,
            hw,
            audio: None,
            scheduler: MidiScheduler::new(),
            clock: MidiClockManager::new(),
            led: LedController::new(),
            playback: PlaybackState::new(),
            mode0: Mode0Sequencer::new(),
            scripts,
            mode_programs: DEFAULT_MODE_PROGRAMS,
            initialized: false,
            dirty: false,
            dirty_since_ms: 0,
            autosave_path: std::env::temp_dir().join("gridbox_autosave.bin"),
        };
        engine.mode0.calculate_loop_length(&engine.song);
        engine
    }

    /// Bring the hardware up. Until this succeeds, `start` refuses to
    /// run.
    pub fn initialize(&mut self) -> bool {
        self.initialized = self.hw.init();
        if !self.initialized {
            warn!("hardware init failed");
        }
        self.initialized
    }

    /// Start playback: reset the transport, anchor the MIDI clock, and
    /// reinitialize every mode script.
    pub fn start(&mut self) {
        if !self.initialized {
            warn!("refusing to start: hardware not initialized");
            return;
        }
        let now = self.hw.now_ms();
        self.mode0.calculate_loop_length(&self.song);
        self.playback.start(now);
        self.mode0.start();
        self.clock.start(now, &mut *self.hw);
        self.reinit_scripts();
    }

    /// Stop playback. Idempotent: a second stop changes nothing.
    pub fn stop(&mut self) {
        let now = self.hw.now_ms();
        self.playback.stop();
        self.clock.stop(now, &mut *self.hw);
        self.scheduler.clear();
    }

    /// One cooperative tick: drain the scheduler, run the LED waveform,
    /// catch the clock up, service the debounced script reinit and the
    /// autosave window, read input, and advance the step when due.
    pub fn update(&mut self) {
        let now = self.hw.now_ms();

        let audio: Option<&mut dyn AudioSink> = match self.audio.as_mut() {
            Some(a) => Some(&mut **a),
            None => None,
        };
        self.scheduler.update(now, &mut *self.hw, audio);
        self.led.update(now, &mut *self.hw);
        self.clock.update(now, &mut *self.hw);

        if self.playback.is_reinit_pending(now) {
            self.reinit_scripts();
            self.playback.clear_reinit_pending();
        }

        self.check_autosave(now);
        self.handle_input(now);

        if !self.playback.is_playing() {
            return;
        }

        if self.playback.should_advance_step(now) {
            self.process_step(now);
            self.playback.advance_step(now);
            // The song sequencer runs at 1/16th speed: one step per bar.
            if self.playback.current_step() == 0 {
                self.mode0.advance_step();
            }
        }
    }

    /// Evaluate every mode's script for the current step and queue the
    /// MIDI they produce.
    fn process_step(&mut self, now: u32) {
        let step = self.playback.current_step();
        let current_mode = self.playback.current_mode();
        let current_pattern = self.playback.current_pattern();

        // Song-mode parameters apply at the top of each bar.
        if step == 0 && current_mode == 0 {
            self.mode0.apply_parameters(&self.song);
        }

        for mode_num in 1..NUM_MODES {
            // In the song sequencer the published override picks each
            // mode's pattern; in edit modes everything audits the
            // current pattern.
            let pattern_to_play = if current_mode == 0 {
                let over = self.mode0.pattern_override(mode_num);
                if over >= 0 {
                    over as usize
                } else {
                    current_pattern
                }
            } else {
                current_pattern
            };

            let Some(context) = self.scripts.context_mut(mode_num) else {
                continue;
            };
            if !context.is_valid() {
                continue;
            }

            for track in 0..NUM_TRACKS {
                let event = self.song.event(mode_num, pattern_to_play, track, step);
                let (midi, led_request) = context.call_process_event(track as u8, event);
                self.scheduler.schedule_all(midi, now);
                if let Some(request) = led_request {
                    self.led
                        .trigger(request.pattern, request.brightness, now, &mut *self.hw);
                }
            }
        }

        // Beat indicator every 4 steps.
        if step % 4 == 0 {
            self.led.trigger(LedPattern::TempoBeat, 255, now, &mut *self.hw);
        }
    }

    /// Map the rotary pots onto global controls and apply button edits.
    fn handle_input(&mut self, now: u32) {
        let r0 = i32::from(self.hw.read_rotary_pot(0));
        let new_mode = ((r0 * 15) / 128).min(14) as usize;
        if new_mode != self.playback.current_mode() {
            self.playback.set_mode(new_mode);
        }

        let new_tempo = 60 + (i32::from(self.hw.read_rotary_pot(1)) * 180) / 127;
        if (new_tempo - self.playback.tempo()).abs() > 5 {
            self.playback.set_tempo(new_tempo, now);
            self.clock.set_tempo(self.playback.tempo());
        }

        let r2 = i32::from(self.hw.read_rotary_pot(2));
        let new_pattern = ((r2 * 32) / 128).min(31) as usize;
        if new_pattern != self.playback.current_pattern() {
            self.playback.set_pattern(new_pattern);
        }

        let current_mode = self.playback.current_mode();
        let r3 = i32::from(self.hw.read_rotary_pot(3));
        if current_mode == 0 {
            // In the song sequencer the fourth pot picks the target mode.
            let new_target = (1 + (r3 * 14) / 128).min(14) as usize;
            if new_target != self.playback.target_mode() {
                self.playback.set_target_mode(new_target);
            }
        } else {
            let new_track = ((r3 * 8) / 128).min(7) as usize;
            if new_track != self.playback.current_track() {
                self.playback.set_track(new_track);
            }
        }

        for button in 0..NUM_BUTTONS {
            if !self.hw.read_button(button) {
                continue;
            }

            // Song-sequencer edits always land on mode 0 / pattern 0 /
            // track 0; everywhere else the cursors pick the target.
            let (edit_mode, edit_pattern, edit_track) = if current_mode == 0 {
                (0, 0, 0)
            } else {
                (
                    current_mode,
                    self.playback.current_pattern(),
                    self.playback.current_track(),
                )
            };

            let event = self.song.event_mut(edit_mode, edit_pattern, edit_track, button);
            let turning_on = !event.switch();
            event.set_switch(turning_on);

            // Parameter lock: latch the slider positions the moment the
            // step turns on.
            if turning_on {
                let mut locked = [0u8; NUM_SLIDER_POTS];
                for (pot, value) in locked.iter_mut().enumerate() {
                    *value = self.hw.read_slider_pot(pot);
                }
                let event = self.song.event_mut(edit_mode, edit_pattern, edit_track, button);
                for (pot, value) in locked.into_iter().enumerate() {
                    event.set_pot(pot, value);
                }
            }

            self.mark_dirty(now);
            if current_mode == 0 {
                self.mode0.calculate_loop_length(&self.song);
            }
        }
    }

    /// Re-run every valid script's `init` with the current tempo and
    /// song-mode parameters, then queue each playing mode's Program
    /// Change.
    fn reinit_scripts(&mut self) {
        let now = self.hw.now_ms();
        debug!(tempo = self.playback.tempo(), "reinitializing mode scripts");
        for mode_num in 0..NUM_MODES {
            self.reinit_mode(mode_num, now);
        }
    }

    fn reinit_mode(&mut self, mode_num: usize, now: u32) {
        let channel = ScriptLoader::channel_for_slot(mode_num);
        let init = InitContext {
            tempo: self.playback.tempo(),
            mode_number: mode_num as u8,
            midi_channel: channel,
            scale_root: self.mode0.scale_root(),
            scale_type: self.mode0.scale_type(),
            velocity_offset: self.mode0.velocity_offset(mode_num),
        };

        let Some(context) = self.scripts.context_mut(mode_num) else {
            return;
        };
        if !context.is_valid() {
            return;
        }
        context.call_init(&init);

        if mode_num > 0 {
            let program = self.mode_programs[mode_num];
            self.scheduler
                .schedule(&ScheduledMidiEvent::program_change(program, channel, 0), now);
        }
    }

    fn mark_dirty(&mut self, now: u32) {
        if !self.dirty {
            self.dirty = true;
            self.dirty_since_ms = now;
        }
    }

    fn check_autosave(&mut self, now: u32) {
        if !self.dirty || now.wrapping_sub(self.dirty_since_ms) < AUTOSAVE_AFTER_MS {
            return;
        }

        match gb_formats::save_binary(&self.song, &self.autosave_path) {
            Ok(()) => {
                info!(path = %self.autosave_path.display(), "autosaved song");
                self.dirty = false;
                self.led.trigger(LedPattern::Saving, 255, now, &mut *self.hw);
            }
            Err(e) => {
                warn!(path = %self.autosave_path.display(), error = %e, "autosave failed");
                // Keep the dirty flag but re-arm the window.
                self.dirty_since_ms = now;
                self.led.trigger(LedPattern::Error, 255, now, &mut *self.hw);
            }
        }
    }

    // --- Host-facing API ---

    pub fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn tempo(&self) -> i32 {
        self.playback.tempo()
    }

    pub fn current_mode(&self) -> usize {
        self.playback.current_mode()
    }

    pub fn current_pattern(&self) -> usize {
        self.playback.current_pattern()
    }

    pub fn current_track(&self) -> usize {
        self.playback.current_track()
    }

    pub fn current_step(&self) -> usize {
        self.playback.current_step()
    }

    pub fn song_mode_step(&self) -> usize {
        self.mode0.current_step()
    }

    pub fn target_mode(&self) -> usize {
        self.playback.target_mode()
    }

    pub fn led_pattern(&self) -> LedPattern {
        self.led.pattern()
    }

    pub fn led_is_on(&self) -> bool {
        self.led.is_on()
    }

    pub fn set_tempo(&mut self, bpm: i32) {
        let now = self.hw.now_ms();
        self.playback.set_tempo(bpm, now);
        self.clock.set_tempo(self.playback.tempo());
    }

    pub fn set_mode(&mut self, mode: usize) {
        self.playback.set_mode(mode);
    }

    pub fn set_pattern(&mut self, pattern: usize) {
        self.playback.set_pattern(pattern);
    }

    pub fn set_track(&mut self, track: usize) {
        self.playback.set_track(track);
    }

    /// Toggle the switch of the event under the edit cursor.
    pub fn toggle_current_switch(&mut self) {
        let now = self.hw.now_ms();
        let event = self.song.event_mut(
            self.playback.current_mode(),
            self.playback.current_pattern(),
            self.playback.current_track(),
            self.playback.current_step(),
        );
        let on = !event.switch();
        event.set_switch(on);
        self.mark_dirty(now);
    }

    /// Write one pot of the event under the edit cursor.
    pub fn set_current_pot(&mut self, pot: usize, value: u8) {
        if pot >= NUM_SLIDER_POTS {
            return;
        }
        let now = self.hw.now_ms();
        self.song
            .event_mut(
                self.playback.current_mode(),
                self.playback.current_pattern(),
                self.playback.current_track(),
                self.playback.current_step(),
            )
            .set_pot(pot, value);
        self.mark_dirty(now);
    }

    /// The 16 events of the current mode/pattern/track.
    pub fn current_track_events(&self) -> [Event; NUM_EVENTS] {
        let mode = self.playback.current_mode();
        let pattern = self.playback.current_pattern();
        let track = self.playback.current_track();
        core::array::from_fn(|step| self.song.event(mode, pattern, track, step))
    }

    pub fn song(&self) -> &Song {
        &self.song
    }

    /// Direct grid access for hosts. Edits made here do not mark the
    /// song dirty.
    pub fn song_mut(&mut self) -> &mut Song {
        &mut self.song
    }

    pub fn simulate_button(&mut self, button: usize, pressed: bool) {
        self.hw.simulate_button(button, pressed);
    }

    pub fn simulate_rotary_pot(&mut self, pot: usize, value: u8) {
        self.hw.simulate_rotary_pot(pot, value);
    }

    pub fn simulate_slider_pot(&mut self, pot: usize, value: u8) {
        self.hw.simulate_slider_pot(pot, value);
    }

    /// Save the song as a sparse JSON file and clear the dirty flag.
    pub fn save_song(&mut self, path: &Path, name: &str) -> Result<(), FormatError> {
        gb_formats::save_json(&self.song, path, name, self.playback.tempo())?;
        self.dirty = false;
        Ok(())
    }

    /// Replace the grid from a sparse JSON file, apply its tempo, and
    /// return the stored name and tempo.
    pub fn load_song(&mut self, path: &Path) -> Result<(String, i32), FormatError> {
        let (song, name, tempo) = gb_formats::load_json(path)?;
        let now = self.hw.now_ms();
        self.song = song;
        self.playback.set_tempo(tempo, now);
        self.clock.set_tempo(self.playback.tempo());
        self.mode0.calculate_loop_length(&self.song);
        self.dirty = false;
        Ok((name, tempo))
    }

    /// Where the autosave snapshot lands.
    pub fn set_autosave_path(&mut self, path: PathBuf) {
        self.autosave_path = path;
    }

    /// Seed the grid with a small demo arrangement: a drum kit on mode 1
    /// and an acid line on mode 2.
    pub fn load_demo_content(&mut self) {
        let now = self.hw.now_ms();

        // Kick on the quarter notes.
        for step in [0, 4, 8, 12] {
            let event = self.song.event_mut(1, 0, 0, step);
            event.set_switch(true);
            event.set_pot(0, 100);
            event.set_pot(1, 50);
        }
        // Snare backbeat.
        for step in [4, 12] {
            let event = self.song.event_mut(1, 0, 1, step);
            event.set_switch(true);
            event.set_pot(0, 90);
            event.set_pot(1, 30);
        }
        // Hats on the eighths.
        for step in (0..NUM_EVENTS).step_by(2) {
            let event = self.song.event_mut(1, 0, 2, step);
            event.set_switch(true);
            event.set_pot(0, 70);
            event.set_pot(1, 20);
        }

        // Acid line: running roots with variation.
        for step in [0, 3, 6, 9, 12, 15] {
            let event = self.song.event_mut(2, 0, 0, step);
            event.set_switch(true);
            event.set_pot(0, 32);
            event.set_pot(1, 40);
            event.set_pot(2, 10);
            event.set_pot(3, 60);
        }
        // Fifths for movement.
        for step in [2, 5, 8, 11, 14] {
            let event = self.song.event_mut(2, 0, 3, step);
            event.set_switch(true);
            event.set_pot(0, 32);
            event.set_pot(1, 30);
            event.set_pot(2, 80);
            event.set_pot(3, 90);
        }
        // Low accent for depth.
        let event = self.song.event_mut(2, 0, 0, 7);
        event.set_switch(true);
        event.set_pot(0, 0);
        event.set_pot(1, 60);
        event.set_pot(2, 5);
        event.set_pot(3, 40);

        self.mark_dirty(now);
    }

    /// Trigger an LED pattern by its script-facing name.
    pub fn trigger_led_pattern(&mut self, name: &str) {
        let now = self.hw.now_ms();
        self.led.trigger_by_name(name, 255, now, &mut *self.hw);
    }

    /// Reload one mode's script from the script directory and
    /// reinitialize it.
    pub fn reload_mode(&mut self, mode: usize) -> bool {
        let tempo = self.playback.tempo();
        if !self.scripts.reload_slot(mode, tempo) {
            return false;
        }
        let now = self.hw.now_ms();
        self.reinit_mode(mode, now);
        true
    }

    pub fn scripts(&self) -> &ScriptLoader {
        &self.scripts
    }

    // --- Audio routing ---

    /// Install the internal synthesizer, optionally loading a soundfont.
    pub fn init_audio(&mut self, mut sink: Box<dyn AudioSink>, soundfont: Option<&str>) -> bool {
        if !sink.init() {
            warn!("audio sink init failed");
            return false;
        }
        if let Some(path) = soundfont {
            if !sink.load_soundfont(path) {
                warn!(path, "soundfont load failed");
                return false;
            }
        }
        self.audio = Some(sink);
        true
    }

    pub fn set_use_internal_audio(&mut self, on: bool) {
        self.scheduler.set_use_internal_audio(on);
    }

    pub fn set_use_external_midi(&mut self, on: bool) {
        self.scheduler.set_use_external_midi(on);
    }

    pub fn uses_internal_audio(&self) -> bool {
        self.scheduler.use_internal_audio()
    }

    pub fn uses_external_midi(&self) -> bool {
        self.scheduler.use_external_midi()
    }

    pub fn is_audio_ready(&self) -> bool {
        self.audio.as_ref().is_some_and(|a| a.is_ready())
    }

    pub fn set_audio_gain(&mut self, gain: f32) {
        if let Some(audio) = self.audio.as_mut() {
            audio.set_gain(gain);
        }
    }

    pub fn audio_gain(&self) -> f32 {
        self.audio.as_ref().map_or(0.0, |a| a.gain())
    }

    // --- Program map ---

    /// Set a mode's General-MIDI program and send the Program Change
    /// immediately.
    pub fn set_mode_program(&mut self, mode: usize, program: u8) {
        if mode >= NUM_MODES {
            return;
        }
        self.mode_programs[mode] = program & 0x7F;
        if mode > 0 {
            let channel = ScriptLoader::channel_for_slot(mode);
            let now = self.hw.now_ms();
            self.hw
                .send_midi(&MidiMessage::new(&[0xC0 | channel, program & 0x7F], now));
        }
    }

    pub fn mode_program(&self, mode: usize) -> u8 {
        if mode >= NUM_MODES {
            return 0;
        }
        self.mode_programs[mode]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::FnScript;
    use gb_hal::VirtualHardware;

    fn loader_with_pitch_script(slots: &[usize]) -> ScriptLoader {
        let mut loader = ScriptLoader::new();
        for &slot in slots {
            loader.install(
                slot,
                Box::new(FnScript::new(|track, event, out| {
                    if event.switch && track == 0 {
                        out.note(60, event.pots[1], 0);
                    }
                })),
                120,
            );
        }
        loader
    }

    #[test]
    fn refuses_to_start_without_hardware() {
        let hw = VirtualHardware::new();
        hw.fail_init();
        let mut lent = hw.clone();
        let mut engine = Engine::new(Song::new(), &mut lent, ScriptLoader::new());

        assert!(!engine.initialize());
        engine.start();
        assert!(!engine.is_playing());
    }

    #[test]
    fn start_emits_midi_start_and_program_changes() {
        let hw = VirtualHardware::new();
        let mut lent = hw.clone();
        let mut engine = Engine::new(Song::new(), &mut lent, loader_with_pitch_script(&[1]));

        assert!(engine.initialize());
        engine.start();
        assert!(engine.is_playing());
        // Drain the queued program change.
        engine.update();

        assert_eq!(hw.count_status(0xFA), 1);
        // Mode 1 -> channel 0 program change.
        assert_eq!(hw.count_status(0xC0), 1);
    }

    #[test]
    fn double_stop_is_one_stop() {
        let hw = VirtualHardware::new();
        let mut lent = hw.clone();
        let mut engine = Engine::new(Song::new(), &mut lent, ScriptLoader::new());
        engine.initialize();
        engine.start();
        engine.stop();
        engine.stop();

        assert_eq!(hw.count_status(0xFC), 1);
    }

    #[test]
    fn button_press_parameter_locks_sliders() {
        let hw = VirtualHardware::new();
        let mut lent = hw.clone();
        let mut engine = Engine::new(Song::new(), &mut lent, ScriptLoader::new());
        engine.initialize();

        engine.simulate_slider_pot(0, 7);
        engine.simulate_slider_pot(1, 11);
        engine.simulate_slider_pot(2, 13);
        engine.simulate_slider_pot(3, 17);
        engine.simulate_button(5, true);
        engine.update();

        let event = engine.song().event(1, 0, 0, 5);
        assert!(event.switch());
        assert_eq!(event.pots(), [7, 11, 13, 17]);
        assert!(engine.is_dirty());
    }

    #[test]
    fn second_press_toggles_off_and_preserves_pots() {
        let hw = VirtualHardware::new();
        let mut lent = hw.clone();
        let mut engine = Engine::new(Song::new(), &mut lent, ScriptLoader::new());
        engine.initialize();

        engine.simulate_slider_pot(0, 42);
        engine.simulate_button(3, true);
        engine.update();
        engine.simulate_button(3, true);
        engine.update();

        let event = engine.song().event(1, 0, 0, 3);
        assert!(!event.switch());
        assert_eq!(event.pot(0), 42);
    }

    #[test]
    fn mode0_button_edits_land_on_track_zero() {
        let hw = VirtualHardware::new();
        let mut lent = hw.clone();
        let mut engine = Engine::new(Song::new(), &mut lent, ScriptLoader::new());
        engine.initialize();

        engine.simulate_rotary_pot(0, 0); // select mode 0
        engine.simulate_button(9, true);
        engine.update();

        assert_eq!(engine.current_mode(), 0);
        assert!(engine.song().event(0, 0, 0, 9).switch());
    }

    #[test]
    fn rotary_pots_map_to_cursors() {
        let hw = VirtualHardware::new();
        let mut lent = hw.clone();
        let mut engine = Engine::new(Song::new(), &mut lent, ScriptLoader::new());
        engine.initialize();

        engine.simulate_rotary_pot(0, 127); // mode 14
        engine.simulate_rotary_pot(2, 64); // pattern 16
        engine.simulate_rotary_pot(3, 127); // track 7
        engine.update();

        assert_eq!(engine.current_mode(), 14);
        assert_eq!(engine.current_pattern(), 16);
        assert_eq!(engine.current_track(), 7);
    }

    #[test]
    fn target_mode_cursor_in_mode_zero() {
        let hw = VirtualHardware::new();
        let mut lent = hw.clone();
        let mut engine = Engine::new(Song::new(), &mut lent, ScriptLoader::new());
        engine.initialize();

        engine.simulate_rotary_pot(0, 0); // mode 0
        engine.simulate_rotary_pot(3, 127); // target mode 14
        engine.update();

        assert_eq!(engine.current_mode(), 0);
        assert_eq!(engine.target_mode(), 14);
        assert_eq!(engine.current_track(), 0);
    }

    #[test]
    fn tempo_hysteresis_ignores_small_moves() {
        let hw = VirtualHardware::new();
        let mut lent = hw.clone();
        let mut engine = Engine::new(Song::new(), &mut lent, ScriptLoader::new());
        engine.initialize();

        // 42 -> 119 BPM, within +/-5 of the 120 default.
        engine.simulate_rotary_pot(1, 42);
        engine.update();
        assert_eq!(engine.tempo(), 120);

        // 127 -> 240 BPM, far outside the band.
        engine.simulate_rotary_pot(1, 127);
        engine.update();
        assert_eq!(engine.tempo(), 240);
    }

    #[test]
    fn tempo_change_reinit_is_debounced() {
        let hw = VirtualHardware::new();
        let mut lent = hw.clone();
        let mut engine = Engine::new(Song::new(), &mut lent, loader_with_pitch_script(&[1, 2]));
        engine.initialize();
        engine.start();
        engine.update();
        hw.clear_messages();

        // Turn the tempo pot at t=500: 56 -> 139 BPM.
        hw.set_time(500);
        engine.simulate_rotary_pot(1, 56);
        engine.update();
        assert_eq!(engine.tempo(), 139);

        hw.set_time(1499);
        engine.update();
        assert_eq!(hw.count_status(0xC0), 0);

        // Debounce expires: reinit queues one program change per loaded
        // playing mode.
        hw.set_time(1500);
        engine.update();
        hw.set_time(1501);
        engine.update();
        assert_eq!(hw.count_status(0xC0), 2);

        // The pending flag fired exactly once.
        hw.set_time(1600);
        engine.update();
        assert_eq!(hw.count_status(0xC0), 2);
    }

    #[test]
    fn autosave_after_twenty_seconds_dirty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autosave.bin");

        let hw = VirtualHardware::new();
        let mut lent = hw.clone();
        let mut engine = Engine::new(Song::new(), &mut lent, ScriptLoader::new());
        engine.initialize();
        engine.set_autosave_path(path.clone());

        engine.simulate_button(0, true);
        engine.update();
        assert!(engine.is_dirty());
        assert!(!path.exists());

        hw.set_time(19_999);
        engine.update();
        assert!(engine.is_dirty());
        assert!(!path.exists());

        hw.set_time(20_000);
        engine.update();
        assert!(!engine.is_dirty());
        assert!(path.exists());
        assert_eq!(engine.led_pattern(), LedPattern::Saving);
    }

    #[test]
    fn demo_content_matches_layout() {
        let hw = VirtualHardware::new();
        let mut lent = hw.clone();
        let mut engine = Engine::new(Song::new(), &mut lent, ScriptLoader::new());

        engine.load_demo_content();

        assert!(engine.song().event(1, 0, 0, 0).switch());
        assert_eq!(engine.song().event(1, 0, 0, 0).pots(), [100, 50, 0, 0]);
        assert!(engine.song().event(1, 0, 1, 4).switch());
        assert!(engine.song().event(1, 0, 2, 14).switch());
        assert!(engine.song().event(2, 0, 0, 7).switch());
        assert_eq!(engine.song().event(2, 0, 0, 7).pots(), [0, 60, 5, 40]);
        assert!(engine.is_dirty());
    }

    #[test]
    fn mode_program_roundtrip_and_bounds() {
        let hw = VirtualHardware::new();
        let mut lent = hw.clone();
        let mut engine = Engine::new(Song::new(), &mut lent, ScriptLoader::new());

        assert_eq!(engine.mode_program(1), 48);
        engine.set_mode_program(1, 12);
        assert_eq!(engine.mode_program(1), 12);
        engine.set_mode_program(99, 5);
        assert_eq!(engine.mode_program(0), 0);

        // The live program change went straight out.
        assert_eq!(hw.count_status(0xC0), 1);
    }
}
