//! Discovery and slot assignment for mode script files.
//!
//! Mode sources are named `NN_description.lua`; the two leading decimal
//! digits pick the slot (0-14). Slot 0 is the song sequencer and emits
//! on no channel of its own; slot N > 0 emits on MIDI channel N-1.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use gb_ir::NUM_MODES;

use crate::script::{InitContext, ModeScript, ScriptCompiler, ScriptContext};

/// Holds up to one script context per mode slot.
pub struct ScriptLoader {
    compiler: Option<Box<dyn ScriptCompiler>>,
    directory: Option<PathBuf>,
    slots: [Option<ScriptContext>; NUM_MODES],
}

impl Default for ScriptLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptLoader {
    pub fn new() -> Self {
        Self {
            compiler: None,
            directory: None,
            slots: core::array::from_fn(|_| None),
        }
    }

    /// A loader that compiles sources with the given runtime binding.
    pub fn with_compiler(compiler: Box<dyn ScriptCompiler>) -> Self {
        Self {
            compiler: Some(compiler),
            directory: None,
            slots: core::array::from_fn(|_| None),
        }
    }

    /// MIDI channel for a slot: 0 for the song sequencer, else slot - 1.
    pub fn channel_for_slot(slot: usize) -> u8 {
        if slot > 0 {
            (slot - 1) as u8
        } else {
            0
        }
    }

    /// Parse a slot number out of `NN_*.lua`. Returns `None` for any
    /// other shape.
    pub fn parse_slot(file_name: &str) -> Option<usize> {
        let bytes = file_name.as_bytes();
        if bytes.len() < 4 || !file_name.ends_with(".lua") {
            return None;
        }
        if !bytes[0].is_ascii_digit() || !bytes[1].is_ascii_digit() || bytes[2] != b'_' {
            return None;
        }
        Some((usize::from(bytes[0] - b'0')) * 10 + usize::from(bytes[1] - b'0'))
    }

    /// Enumerate `dir` and load every matching mode file. Returns the
    /// number of slots that loaded and initialized successfully.
    /// Reloading a slot replaces the prior context.
    pub fn load_from_directory(&mut self, dir: &Path, tempo: i32) -> usize {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "cannot read script directory");
                return 0;
            }
        };
        self.directory = Some(dir.to_path_buf());

        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect();
        files.sort();

        let mut loaded = 0;
        for path in files {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(slot) = Self::parse_slot(name) else {
                continue;
            };
            if slot >= NUM_MODES {
                warn!(file = name, slot, "mode file slot out of range");
                continue;
            }
            if self.load_slot(slot, &path, tempo) {
                loaded += 1;
            }
        }

        debug!(loaded, dir = %dir.display(), "loaded mode scripts");
        loaded
    }

    /// Compile and initialize one slot from a source file. A failed load
    /// leaves an invalid context in the slot, with its error retained.
    pub fn load_slot(&mut self, slot: usize, path: &Path, tempo: i32) -> bool {
        if slot >= NUM_MODES {
            return false;
        }
        let Some(compiler) = self.compiler.as_deref() else {
            warn!("no script compiler installed");
            return false;
        };

        let mut context = ScriptContext::new();
        let mut ok = context.load(compiler, path);
        if ok {
            let channel = Self::channel_for_slot(slot);
            context.set_channel(channel);
            ok = context.call_init(&InitContext::new(tempo, slot as u8, channel));
        }
        self.slots[slot] = Some(context);
        ok
    }

    /// Re-scan the load directory for this slot's file and reload it.
    pub fn reload_slot(&mut self, slot: usize, tempo: i32) -> bool {
        let Some(dir) = self.directory.clone() else {
            return false;
        };
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return false;
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .and_then(Self::parse_slot)
                    == Some(slot)
            })
            .collect();
        files.sort();

        match files.last() {
            Some(path) => self.load_slot(slot, path, tempo),
            None => false,
        }
    }

    /// Install an already-compiled script into a slot, replacing any
    /// prior context.
    pub fn install(&mut self, slot: usize, script: Box<dyn ModeScript>, tempo: i32) -> bool {
        if slot >= NUM_MODES {
            return false;
        }
        let mut context = ScriptContext::with_script(script);
        let channel = Self::channel_for_slot(slot);
        context.set_channel(channel);
        let ok = context.call_init(&InitContext::new(tempo, slot as u8, channel));
        self.slots[slot] = Some(context);
        ok
    }

    pub fn context(&self, slot: usize) -> Option<&ScriptContext> {
        self.slots.get(slot)?.as_ref()
    }

    pub fn context_mut(&mut self, slot: usize) -> Option<&mut ScriptContext> {
        self.slots.get_mut(slot)?.as_mut()
    }

    /// True when the slot holds a valid, initialized context.
    pub fn is_loaded(&self, slot: usize) -> bool {
        self.context(slot).is_some_and(|c| c.is_valid())
    }
}
