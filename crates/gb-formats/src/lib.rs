//! Persistence formats for the gridbox song grid.
//!
//! Two formats: a dense binary snapshot (fixed size, suitable for flash
//! storage) and a sparse human-readable JSON file that keeps only active
//! events.

mod binary_format;
mod json_format;

pub use binary_format::{
    decode_song, encode_song, load_binary, save_binary, BINARY_FILE_SIZE, MAGIC, VERSION,
};
pub use json_format::{decode_song_json, encode_song_json, load_json, save_json, JSON_VERSION};

/// Error type for song persistence.
#[derive(Debug)]
pub enum FormatError {
    /// Invalid file header or magic bytes
    InvalidHeader,
    /// Unsupported format version
    UnsupportedVersion,
    /// Unexpected end of file
    UnexpectedEof,
    /// I/O error
    Io(std::io::Error),
    /// Malformed JSON
    Json(serde_json::Error),
}

impl std::fmt::Display for FormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatError::InvalidHeader => write!(f, "invalid header"),
            FormatError::UnsupportedVersion => write!(f, "unsupported format version"),
            FormatError::UnexpectedEof => write!(f, "unexpected end of file"),
            FormatError::Io(e) => write!(f, "i/o error: {}", e),
            FormatError::Json(e) => write!(f, "malformed json: {}", e),
        }
    }
}

impl std::error::Error for FormatError {}

impl From<std::io::Error> for FormatError {
    fn from(e: std::io::Error) -> Self {
        FormatError::Io(e)
    }
}

impl From<serde_json::Error> for FormatError {
    fn from(e: serde_json::Error) -> Self {
        FormatError::Json(e)
    }
}
