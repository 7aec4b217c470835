// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::collections::HashMap;

use crate::audio::PcmBuffer;
use crate::note;

/// Decoded piano samples keyed by canonical note name ("C4", "Db4").
///
/// Built once at startup and read-only afterwards. Missing notes are expected and
/// are synthesized instead.
#[derive(Clone, Debug, Default)]
pub struct SampleLibrary {
    samples: HashMap<String, PcmBuffer>,
}

impl SampleLibrary {
    pub fn new() -> SampleLibrary {
        SampleLibrary::default()
    }

    /// Adds a sample under the given note name, in any spelling the note parser
    /// accepts. Returns the canonical name, or None if the name isn't a note.
    pub fn insert(&mut self, name: &str, buffer: PcmBuffer) -> Option<String> {
        let canonical = note::canonical_note_name(name)?;
        self.samples.insert(canonical.clone(), buffer);
        Some(canonical)
    }

    /// Adds a sample for the given MIDI note.
    pub fn insert_midi(&mut self, midi: i32, buffer: PcmBuffer) {
        self.samples.insert(note::note_name(midi), buffer);
    }

    /// Gets the sample for a note name. "C#4" and "Db4" find the same sample.
    pub fn get(&self, name: &str) -> Option<&PcmBuffer> {
        self.samples.get(&note::canonical_note_name(name)?)
    }

    /// Gets the sample for a MIDI note.
    pub fn get_midi(&self, midi: i32) -> Option<&PcmBuffer> {
        self.samples.get(&note::note_name(midi))
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Note names in pitch order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.samples.keys().map(String::as_str).collect();
        names.sort_by_key(|name| note::parse_note_name(name));
        names
    }

    /// Total size of the decoded audio in bytes.
    pub fn memory_usage(&self) -> usize {
        self.samples.values().map(PcmBuffer::memory_size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(value: f32) -> PcmBuffer {
        PcmBuffer::new(vec![value; 4], 1, 44100)
    }

    #[test]
    fn test_spellings_share_a_sample() {
        let mut library = SampleLibrary::new();
        assert_eq!(library.insert("c#4", buffer(0.5)), Some("Db4".to_string()));

        assert!(library.get("Db4").is_some());
        assert!(library.get("C#4").is_some());
        assert!(library.get_midi(61).is_some());
        assert!(library.get("D4").is_none());
        assert_eq!(library.len(), 1);
    }

    #[test]
    fn test_non_note_names_are_rejected() {
        let mut library = SampleLibrary::new();
        assert_eq!(library.insert("kick", buffer(0.5)), None);
        assert!(library.get("kick").is_none());
        assert!(library.is_empty());
    }

    #[test]
    fn test_names_in_pitch_order() {
        let mut library = SampleLibrary::new();
        library.insert_midi(72, buffer(0.1));
        library.insert_midi(21, buffer(0.1));
        library.insert_midi(60, buffer(0.1));

        assert_eq!(library.names(), vec!["A0", "C4", "C5"]);
        assert_eq!(library.memory_usage(), 3 * 4 * std::mem::size_of::<f32>());
    }
}
