//! Sparse human-readable song files.
//!
//! Only events with their switch on are written; loading starts from a
//! cleared grid, so every inactive slot comes back zeroed.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use gb_ir::{Song, NUM_EVENTS, NUM_MODES, NUM_PATTERNS, NUM_TRACKS};

use crate::FormatError;

/// Version string written to and required from song files.
pub const JSON_VERSION: &str = "1.0";

#[derive(Serialize, Deserialize)]
struct SongFile {
    version: String,
    name: String,
    tempo: i32,
    events: Vec<EventEntry>,
}

#[derive(Serialize, Deserialize)]
struct EventEntry {
    mode: i32,
    pattern: i32,
    track: i32,
    step: i32,
    switch: bool,
    pots: Vec<u8>,
}

/// Serialize the active events of a song to pretty-printed JSON.
pub fn encode_song_json(song: &Song, name: &str, tempo: i32) -> Result<String, FormatError> {
    let mut events = Vec::new();

    for mode in 0..NUM_MODES {
        for pattern in 0..NUM_PATTERNS {
            for track in 0..NUM_TRACKS {
                for step in 0..NUM_EVENTS {
                    let event = song.event(mode, pattern, track, step);
                    if event.switch() {
                        events.push(EventEntry {
                            mode: mode as i32,
                            pattern: pattern as i32,
                            track: track as i32,
                            step: step as i32,
                            switch: true,
                            pots: event.pots().to_vec(),
                        });
                    }
                }
            }
        }
    }

    let file = SongFile {
        version: JSON_VERSION.to_string(),
        name: name.to_string(),
        tempo,
        events,
    };

    Ok(serde_json::to_string_pretty(&file)?)
}

/// Parse a song file. Returns the rebuilt grid plus the stored name and
/// tempo. Entries with out-of-range coordinates are skipped.
pub fn decode_song_json(text: &str) -> Result<(Song, String, i32), FormatError> {
    let file: SongFile = serde_json::from_str(text)?;

    if file.version != JSON_VERSION {
        return Err(FormatError::UnsupportedVersion);
    }

    let mut song = Song::new();
    for entry in &file.events {
        let in_range = (0..NUM_MODES as i32).contains(&entry.mode)
            && (0..NUM_PATTERNS as i32).contains(&entry.pattern)
            && (0..NUM_TRACKS as i32).contains(&entry.track)
            && (0..NUM_EVENTS as i32).contains(&entry.step);
        if !in_range || entry.pots.len() != 4 {
            continue;
        }

        let event = song.event_mut(
            entry.mode as usize,
            entry.pattern as usize,
            entry.track as usize,
            entry.step as usize,
        );
        event.set_switch(entry.switch);
        for (i, &value) in entry.pots.iter().enumerate() {
            event.set_pot(i, value);
        }
    }

    Ok((song, file.name, file.tempo))
}

/// Write a song file.
pub fn save_json(song: &Song, path: &Path, name: &str, tempo: i32) -> Result<(), FormatError> {
    let text = encode_song_json(song, name, tempo)?;
    fs::write(path, text)?;
    Ok(())
}

/// Read a song file.
pub fn load_json(path: &Path) -> Result<(Song, String, i32), FormatError> {
    let text = fs::read_to_string(path)?;
    decode_song_json(&text)
}
