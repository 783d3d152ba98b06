//! Allocation-free update loop tests.
//!
//! The step path — input scan, script evaluation, scheduling, clock and
//! LED updates — must not touch the heap once warm. These tests run the
//! engine against a non-recording sink with the allocator disabled.

use assert_no_alloc::{assert_no_alloc, AllocDisabler};

#[cfg(debug_assertions)]
#[global_allocator]
static A: AllocDisabler = AllocDisabler;

use std::cell::Cell;
use std::rc::Rc;

use gridbox::{Engine, FnScript, HardwareSink, MidiMessage, ScriptLoader, Song};

/// A sink that discards everything; time is shared with the test so it
/// can be advanced while the engine holds the borrow.
struct NullHardware {
    now: Rc<Cell<u32>>,
}

impl HardwareSink for NullHardware {
    fn init(&mut self) -> bool {
        true
    }

    fn shutdown(&mut self) {}

    fn read_button(&mut self, _button: usize) -> bool {
        false
    }

    fn read_rotary_pot(&mut self, pot: usize) -> u8 {
        // Neutral positions: mode 1, ~120 BPM, pattern 0, track 0.
        [9, 42, 0, 0].get(pot).copied().unwrap_or(0)
    }

    fn read_slider_pot(&mut self, _pot: usize) -> u8 {
        0
    }

    fn send_midi(&mut self, _msg: &MidiMessage) {}

    fn set_led(&mut self, _on: bool) {}

    fn led(&self) -> bool {
        false
    }

    fn now_ms(&self) -> u32 {
        self.now.get()
    }
}

fn demo_loader() -> ScriptLoader {
    let mut scripts = ScriptLoader::new();
    scripts.install(
        1,
        Box::new(FnScript::new(|track, event, out| {
            if event.switch && track < 3 {
                let pitch = 36 + track * 2;
                out.note(pitch, event.pots[0], 0);
                out.off(pitch, 60);
            }
        })),
        120,
    );
    scripts.install(
        2,
        Box::new(FnScript::new(|_track, event, out| {
            if event.switch {
                let pitch = 24 + event.pots[0] / 6;
                out.note(pitch, 100, 0);
                out.off(pitch, 30 + u32::from(event.pots[1]));
            }
        })),
        120,
    );
    scripts
}

#[test]
fn update_loop_is_alloc_free_once_warm() {
    let now = Rc::new(Cell::new(0));
    let mut hw = NullHardware { now: Rc::clone(&now) };

    let mut engine = Engine::new(Song::new(), &mut hw, demo_loader());
    assert!(engine.initialize());
    engine.load_demo_content();
    engine.start();

    // Warm-up: two bars size the script output buffers.
    let mut t = 0;
    while t < 4_000 {
        now.set(t);
        engine.update();
        t += 5;
    }

    assert_no_alloc(|| {
        let mut t = 4_000;
        while t < 8_000 {
            now.set(t);
            engine.update();
            t += 5;
        }
    });
}

#[test]
fn scheduler_churn_is_alloc_free() {
    use gridbox::{MidiScheduler, ScheduledMidiEvent};

    let now = Rc::new(Cell::new(0));
    let mut hw = NullHardware { now: Rc::clone(&now) };
    let mut scheduler = MidiScheduler::new();

    let on = ScheduledMidiEvent::note_on(60, 100, 0, 3);
    let off = ScheduledMidiEvent::note_off(60, 0, 9);

    assert_no_alloc(|| {
        for t in 0..10_000u32 {
            scheduler.schedule(&on, t);
            scheduler.schedule(&off, t);
            scheduler.update(t, &mut hw, None);
        }
    });
}
