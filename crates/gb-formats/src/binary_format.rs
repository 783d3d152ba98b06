//! Dense binary snapshot of the full event grid.
//!
//! Layout: 4 magic bytes "GRVB", a little-endian u32 version, then every
//! packed event word little-endian in loop order mode -> pattern ->
//! track -> step. The file size is fixed at 245,768 bytes.

use std::fs;
use std::path::Path;

use gb_ir::{Event, Song, NUM_EVENTS, NUM_MODES, NUM_PATTERNS, NUM_TRACKS};

use crate::FormatError;

/// Magic bytes at the start of every snapshot.
pub const MAGIC: [u8; 4] = *b"GRVB";

/// Current snapshot version.
pub const VERSION: u32 = 1;

/// Header plus one word per event.
pub const BINARY_FILE_SIZE: usize = 8 + Song::memory_footprint();

/// Serialize a song into snapshot bytes.
pub fn encode_song(song: &Song) -> Vec<u8> {
    let mut out = Vec::with_capacity(BINARY_FILE_SIZE);
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());

    for mode in 0..NUM_MODES {
        for pattern in 0..NUM_PATTERNS {
            for track in 0..NUM_TRACKS {
                for step in 0..NUM_EVENTS {
                    let word = song.event(mode, pattern, track, step).to_packed();
                    out.extend_from_slice(&word.to_le_bytes());
                }
            }
        }
    }

    out
}

/// Parse snapshot bytes back into a song.
pub fn decode_song(data: &[u8]) -> Result<Song, FormatError> {
    if data.len() < 8 {
        return Err(FormatError::UnexpectedEof);
    }
    if data[0..4] != MAGIC {
        return Err(FormatError::InvalidHeader);
    }

    let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    if version != VERSION {
        return Err(FormatError::UnsupportedVersion);
    }

    if data.len() < BINARY_FILE_SIZE {
        return Err(FormatError::UnexpectedEof);
    }

    let mut song = Song::new();
    let mut offset = 8;
    for mode in 0..NUM_MODES {
        for pattern in 0..NUM_PATTERNS {
            for track in 0..NUM_TRACKS {
                for step in 0..NUM_EVENTS {
                    let word = u32::from_le_bytes([
                        data[offset],
                        data[offset + 1],
                        data[offset + 2],
                        data[offset + 3],
                    ]);
                    *song.event_mut(mode, pattern, track, step) = Event::from_packed(word);
                    offset += 4;
                }
            }
        }
    }

    Ok(song)
}

/// Write a snapshot file.
pub fn save_binary(song: &Song, path: &Path) -> Result<(), FormatError> {
    fs::write(path, encode_song(song))?;
    Ok(())
}

/// Read a snapshot file.
pub fn load_binary(path: &Path) -> Result<Song, FormatError> {
    let data = fs::read(path)?;
    decode_song(&data)
}
