//! End-to-end scenarios: program the grid, run the clock, observe the
//! MIDI wire.

use gridbox::{
    Engine, FnScript, MidiMessage, ScriptLoader, Song, VirtualHardware, NUM_MODES,
};

/// Drive the engine with 5ms ticks from `from_ms` to `to_ms` inclusive.
fn run(engine: &mut Engine<'_>, hw: &VirtualHardware, from_ms: u32, to_ms: u32) {
    let mut t = from_ms;
    while t <= to_ms {
        hw.set_time(t);
        engine.update();
        t += 5;
    }
}

fn note_ons(hw: &VirtualHardware) -> Vec<MidiMessage> {
    hw.sent_messages()
        .into_iter()
        .filter(|m| m.status().map(|s| s & 0xF0) == Some(0x90))
        .collect()
}

fn place_backbeat(song: &mut Song) {
    for step in [0, 4, 8, 12] {
        let event = song.event_mut(1, 0, 0, step);
        event.set_switch(true);
        event.set_pot(0, 100);
        event.set_pot(1, 50);
    }
}

#[test]
fn backbeat_without_scripts_is_silent() {
    let hw = VirtualHardware::new();
    let mut lent = hw.clone();
    let mut engine = Engine::new(Song::new(), &mut lent, ScriptLoader::new());
    engine.initialize();

    place_backbeat(engine.song_mut());
    engine.start();
    run(&mut engine, &hw, 0, 2100);

    assert!(note_ons(&hw).is_empty());
}

#[test]
fn backbeat_with_drum_script_plays_quarter_notes() {
    let hw = VirtualHardware::new();
    let mut lent = hw.clone();

    let mut scripts = ScriptLoader::new();
    scripts.install(
        1,
        Box::new(FnScript::new(|track, event, out| {
            if track == 0 && event.switch {
                out.note(60, event.pots[0], 0);
            }
        })),
        120,
    );

    let mut engine = Engine::new(Song::new(), &mut lent, scripts);
    engine.initialize();
    place_backbeat(engine.song_mut());
    engine.start();

    // One full bar at 120 BPM: steps fire every 125ms.
    run(&mut engine, &hw, 0, 2100);

    let notes = note_ons(&hw);
    assert_eq!(notes.len(), 4);
    for note in &notes {
        assert_eq!(note.data.as_slice(), &[0x90, 0x3C, 0x64]);
    }
    // One every 500ms.
    for pair in notes.windows(2) {
        assert_eq!(pair[1].timestamp_ms - pair[0].timestamp_ms, 500);
    }
}

#[test]
fn clock_runs_at_24_ppqn() {
    let hw = VirtualHardware::new();
    let mut lent = hw.clone();
    let mut engine = Engine::new(Song::new(), &mut lent, ScriptLoader::new());
    engine.initialize();
    engine.start();
    hw.clear_messages();

    let mut t = 20;
    while t <= 500 {
        hw.set_time(t);
        engine.update();
        t += 20;
    }

    assert_eq!(hw.count_status(0xF8), 24);
}

#[test]
fn mode0_overrides_every_playing_mode_pattern() {
    let hw = VirtualHardware::new();
    let mut lent = hw.clone();

    // Every playing mode gets a script whose pitch is the event's first
    // pot, so the wire tells us which pattern was consulted.
    let mut scripts = ScriptLoader::new();
    for mode in 1..NUM_MODES {
        scripts.install(
            mode,
            Box::new(FnScript::new(|track, event, out| {
                if track == 0 && event.switch {
                    out.note(event.pots[0], 100, 0);
                }
            })),
            120,
        );
    }

    let mut engine = Engine::new(Song::new(), &mut lent, scripts);
    engine.initialize();

    {
        let song = engine.song_mut();
        // Bait in pattern 0: would play pitch 5 if the override failed.
        // The expected notes live in pattern 16.
        for mode in 1..NUM_MODES {
            let decoy = song.event_mut(mode, 0, 0, 0);
            decoy.set_switch(true);
            decoy.set_pot(0, 5);

            let real = song.event_mut(mode, 16, 0, 0);
            real.set_switch(true);
            real.set_pot(0, (30 + mode) as u8);
        }
        // Song-sequencer step 0: pot 0 = 64 selects pattern 16.
        let program = song.event_mut(0, 0, 0, 0);
        program.set_switch(true);
        program.set_pot(0, 64);
    }

    // The override only applies while the song sequencer is in control.
    engine.simulate_rotary_pot(0, 0);
    engine.update();
    assert_eq!(engine.current_mode(), 0);

    engine.start();
    run(&mut engine, &hw, 0, 150);

    let pitches: Vec<u8> = note_ons(&hw).iter().map(|m| m.data[1]).collect();
    assert_eq!(pitches.len(), NUM_MODES - 1);
    assert!(!pitches.contains(&5));
    for mode in 1..NUM_MODES {
        assert!(pitches.contains(&((30 + mode) as u8)));
    }
}

#[test]
fn edit_modes_ignore_mode0_overrides() {
    let hw = VirtualHardware::new();
    let mut lent = hw.clone();

    let mut scripts = ScriptLoader::new();
    scripts.install(
        1,
        Box::new(FnScript::new(|track, event, out| {
            if track == 0 && event.switch {
                out.note(event.pots[0], 100, 0);
            }
        })),
        120,
    );

    let mut engine = Engine::new(Song::new(), &mut lent, scripts);
    engine.initialize();

    {
        let song = engine.song_mut();
        let current = song.event_mut(1, 0, 0, 0);
        current.set_switch(true);
        current.set_pot(0, 40);

        let other = song.event_mut(1, 16, 0, 0);
        other.set_switch(true);
        other.set_pot(0, 90);

        let program = song.event_mut(0, 0, 0, 0);
        program.set_switch(true);
        program.set_pot(0, 64);
    }

    // Stay in edit mode 1: the song sequencer's selection must not leak.
    engine.start();
    run(&mut engine, &hw, 0, 150);

    let pitches: Vec<u8> = note_ons(&hw).iter().map(|m| m.data[1]).collect();
    assert_eq!(pitches, vec![40]);
}

#[test]
fn song_round_trips_through_the_engine() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    let hw = VirtualHardware::new();
    let mut lent = hw.clone();
    let mut engine = Engine::new(Song::new(), &mut lent, ScriptLoader::new());
    engine.initialize();

    for (mode, pattern, track, step) in [(1, 0, 0, 0), (3, 7, 2, 9), (14, 31, 7, 15)] {
        let event = engine.song_mut().event_mut(mode, pattern, track, step);
        event.set_switch(true);
        event.set_pot(0, (step * 3) as u8);
    }
    engine.set_tempo(150);
    engine.save_song(&path, "roundtrip").unwrap();
    let saved = engine.song().clone();

    let hw2 = VirtualHardware::new();
    let mut lent2 = hw2.clone();
    let mut engine2 = Engine::new(Song::new(), &mut lent2, ScriptLoader::new());
    engine2.initialize();

    let (name, tempo) = engine2.load_song(&path).unwrap();
    assert_eq!(name, "roundtrip");
    assert_eq!(tempo, 150);
    assert_eq!(engine2.tempo(), 150);
    assert_eq!(engine2.song(), &saved);
    assert!(!engine2.is_dirty());
}
