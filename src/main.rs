//! gridbox headless runner.
//!
//! Drives the engine at ~60 Hz against the wall clock with the virtual
//! hardware sink, so the core can be exercised without a GUI or physical
//! controls:
//!
//!   cargo run -- --demo
//!   cargo run -- --song path/to/song.json --duration-secs 16
//!   cargo run -- --demo --internal-audio --tempo 140

use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use clap::Parser;

use gridbox::{Engine, FnScript, ScriptLoader, Song, VirtualAudio, VirtualHardware};

#[derive(Parser)]
#[command(name = "gridbox", about = "15-channel step sequencer / groovebox core")]
struct Cli {
    /// Song file (sparse JSON) to load at startup
    #[arg(long)]
    song: Option<PathBuf>,

    /// Seed the grid with the demo arrangement and built-in modes
    #[arg(long)]
    demo: bool,

    /// Tempo override in BPM (1-1000)
    #[arg(long)]
    tempo: Option<i32>,

    /// How long to run before stopping, in seconds
    #[arg(long, default_value_t = 8)]
    duration_secs: u64,

    /// Route MIDI to the internal audio sink instead of external out
    #[arg(long)]
    internal_audio: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let hw = VirtualHardware::new();
    let monitor = hw.clone();
    let mut lent = hw.clone();

    let mut scripts = ScriptLoader::new();
    if cli.demo {
        install_demo_modes(&mut scripts);
    }

    let mut engine = Engine::new(Song::new(), &mut lent, scripts);
    if !engine.initialize() {
        bail!("hardware init failed");
    }

    if cli.internal_audio {
        if !engine.init_audio(Box::new(VirtualAudio::new()), None) {
            bail!("audio init failed");
        }
        engine.set_use_internal_audio(true);
        engine.set_use_external_midi(false);
    }

    if let Some(path) = &cli.song {
        let (name, tempo) = engine.load_song(path)?;
        println!("Loaded \"{}\" at {} BPM", name, tempo);
    }
    if cli.demo {
        engine.load_demo_content();
        println!("Demo arrangement loaded (drums on mode 1, acid line on mode 2)");
    }
    if let Some(bpm) = cli.tempo {
        engine.set_tempo(bpm);
    }

    engine.start();
    println!("Playing at {} BPM...", engine.tempo());

    let started = Instant::now();
    let run_for = Duration::from_secs(cli.duration_secs);
    while started.elapsed() < run_for {
        monitor.set_time(started.elapsed().as_millis() as u32);
        engine.update();

        print!(
            "\rMode {:2} | Pat {:2} | Step {:2} | Bar step {:2}",
            engine.current_mode(),
            engine.current_pattern(),
            engine.current_step(),
            engine.song_mode_step(),
        );
        let _ = std::io::stdout().flush();

        std::thread::sleep(Duration::from_millis(16));
    }

    engine.stop();
    println!();
    let note_ons = monitor
        .sent_messages()
        .iter()
        .filter(|m| m.status().map(|s| s & 0xF0) == Some(0x90))
        .count();
    println!(
        "Done. {} note-ons, {} clock pulses sent.",
        note_ons,
        monitor.count_status(0xF8),
    );

    Ok(())
}

/// Built-in stand-ins for the drum and bass mode scripts, so the demo
/// arrangement makes sound without an external script runtime.
fn install_demo_modes(scripts: &mut ScriptLoader) {
    // Mode 1: kick / snare / closed hat on the first three tracks.
    scripts.install(
        1,
        Box::new(
            FnScript::new(|track, event, out| {
                if !event.switch {
                    return;
                }
                let pitch = match track {
                    0 => 36,
                    1 => 38,
                    2 => 42,
                    _ => return,
                };
                out.note(pitch, event.pots[0], 0);
                out.off(pitch, 60);
            })
            .with_name("Drums")
            .with_labels(["Vel", "Decay", "Tone", "Snap"]),
        ),
        120,
    );

    // Mode 2: bassline; pot 0 picks the note inside two octaves above
    // C1, pot 1 scales the gate length.
    scripts.install(
        2,
        Box::new(
            FnScript::new(|_track, event, out| {
                if !event.switch {
                    return;
                }
                let pitch = 24 + event.pots[0] / 6;
                let gate = 30 + u32::from(event.pots[1]);
                out.note(pitch, 100, 0);
                out.off(pitch, gate);
            })
            .with_name("Bass")
            .with_labels(["Note", "Gate", "Slide", "Filter"]),
        ),
        120,
    );
}
