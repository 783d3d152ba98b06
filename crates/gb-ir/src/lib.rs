//! Core grid types for the gridbox sequencer.
//!
//! This crate defines the bit-packed event grid shared by the playback
//! engine, the persistence layer, and the host shell: a `Song` of 15
//! `Mode`s, each 32 `Pattern`s of 8 `Track`s of 16 `Event`s.
//!
//! Designed to be `no_std` compatible; the grid is flat, statically sized
//! storage with no allocation.

#![cfg_attr(not(feature = "std"), no_std)]

mod event;
mod pattern;
mod song;

pub use event::{Event, Track};
pub use pattern::{Mode, Pattern};
pub use song::Song;

/// Modes per song (one MIDI channel each; mode 0 is the song sequencer).
pub const NUM_MODES: usize = 15;

/// Patterns per mode.
pub const NUM_PATTERNS: usize = 32;

/// Tracks per pattern.
pub const NUM_TRACKS: usize = 8;

/// Events per track (one per step button).
pub const NUM_EVENTS: usize = 16;
