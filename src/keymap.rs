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

//! Maps physical keys to notes.
//!
//! Each binding in the layout table is a white key. Consecutive bindings walk up
//! the major scale, and the keys that have a sharp on a real piano (C, D, F, G, A)
//! also get a black key reachable by holding shift on the same physical key.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::note;

/// A platform virtual key code.
pub type KeyCode = u16;

/// Semitone offsets of the major scale.
const MAJOR_SCALE_SEMITONES: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];

/// Letter names of the scale degrees.
const NOTE_LETTERS: [&str; 7] = ["C", "D", "E", "F", "G", "A", "B"];

/// Scale degrees that have a sharp: C D F G A.
const SHARP_DEGREES: [usize; 5] = [0, 1, 3, 4, 5];

/// Default octave of the first binding.
pub const DEFAULT_BASE_OCTAVE: i32 = 3;

/// A physical key that plays a white key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyBinding {
    /// The glyph printed on the key.
    pub symbol: &'static str,
    /// The virtual key code delivered by the input layer.
    pub code: KeyCode,
}

impl KeyBinding {
    pub const fn new(symbol: &'static str, code: KeyCode) -> KeyBinding {
        KeyBinding { symbol, code }
    }
}

/// The 1-0 q-p a-l z-m layout, using macOS virtual key codes.
pub const DEFAULT_BINDINGS: &[KeyBinding] = &[
    KeyBinding::new("1", 18),
    KeyBinding::new("2", 19),
    KeyBinding::new("3", 20),
    KeyBinding::new("4", 21),
    KeyBinding::new("5", 23),
    KeyBinding::new("6", 22),
    KeyBinding::new("7", 26),
    KeyBinding::new("8", 28),
    KeyBinding::new("9", 25),
    KeyBinding::new("0", 29),
    KeyBinding::new("q", 12),
    KeyBinding::new("w", 13),
    KeyBinding::new("e", 14),
    KeyBinding::new("r", 15),
    KeyBinding::new("t", 17),
    KeyBinding::new("y", 16),
    KeyBinding::new("u", 32),
    KeyBinding::new("i", 34),
    KeyBinding::new("o", 31),
    KeyBinding::new("p", 35),
    KeyBinding::new("a", 0),
    KeyBinding::new("s", 1),
    KeyBinding::new("d", 2),
    KeyBinding::new("f", 3),
    KeyBinding::new("g", 5),
    KeyBinding::new("h", 4),
    KeyBinding::new("j", 38),
    KeyBinding::new("k", 40),
    KeyBinding::new("l", 37),
    KeyBinding::new("z", 6),
    KeyBinding::new("x", 7),
    KeyBinding::new("c", 8),
    KeyBinding::new("v", 9),
    KeyBinding::new("b", 11),
    KeyBinding::new("n", 45),
    KeyBinding::new("m", 46),
];

/// Modifier keys held during a key event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub shift: bool,
    pub control: bool,
    pub alt: bool,
    pub command: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        control: false,
        alt: false,
        command: false,
    };

    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        control: false,
        alt: false,
        command: false,
    };

    /// True when Control, Alt or Command is held. Such chords are shortcuts,
    /// not notes.
    pub fn is_shortcut(&self) -> bool {
        self.control || self.alt || self.command
    }
}

/// Errors produced while building a key map from a binding table.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KeyMapError {
    #[error("binding {0} has an empty symbol")]
    EmptySymbol(usize),

    #[error("key code {0} is bound more than once")]
    DuplicateCode(KeyCode),

    #[error("note id {0} is produced by more than one key")]
    DuplicateId(String),
}

/// The immutable identity of a playable note.
#[derive(Clone, Debug, PartialEq)]
pub struct NoteIdentity {
    id: String,
    keyboard_label: String,
    display_label: String,
    frequency: f64,
    midi: i32,
    octave_degree: usize,
    white_index: usize,
    is_black: bool,
}

impl NoteIdentity {
    /// The key id. Unique within a key map and stable for its lifetime.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The glyph shown on the key.
    pub fn keyboard_label(&self) -> &str {
        &self.keyboard_label
    }

    /// The note name shown on the key, e.g. "C3" or "C#3".
    pub fn display_label(&self) -> &str {
        &self.display_label
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn midi(&self) -> i32 {
        self.midi
    }

    /// The scale degree (0-6) of the white key this note belongs to.
    pub fn octave_degree(&self) -> usize {
        self.octave_degree
    }

    /// The position of the owning white key in the layout.
    pub fn white_index(&self) -> usize {
        self.white_index
    }

    pub fn is_black(&self) -> bool {
        self.is_black
    }
}

impl fmt::Display for NoteIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {:.2}Hz)",
            self.keyboard_label, self.display_label, self.frequency
        )
    }
}

/// The full note layout derived from a binding table.
#[derive(Debug)]
pub struct KeyMap {
    /// Every note, in layout order: each white key followed by its black key.
    notes: Vec<NoteIdentity>,
    /// Note index by id.
    by_id: HashMap<String, usize>,
    /// White key note index by key code.
    white_by_code: HashMap<KeyCode, usize>,
    /// Black key note index by the note index of its white key.
    black_by_white: HashMap<usize, usize>,
}

impl KeyMap {
    /// Builds the layout. Binding `i` plays scale degree `i % 7` in octave
    /// `base_octave + i / 7`.
    pub fn new(bindings: &[KeyBinding], base_octave: i32) -> Result<KeyMap, KeyMapError> {
        let mut notes = Vec::with_capacity(bindings.len() * 2);
        let mut by_id = HashMap::new();
        let mut white_by_code = HashMap::new();
        let mut black_by_white = HashMap::new();
        let mut codes = HashSet::new();

        for (index, binding) in bindings.iter().enumerate() {
            if binding.symbol.is_empty() {
                return Err(KeyMapError::EmptySymbol(index));
            }
            if !codes.insert(binding.code) {
                return Err(KeyMapError::DuplicateCode(binding.code));
            }

            let degree = index % MAJOR_SCALE_SEMITONES.len();
            let octave = base_octave + (index / MAJOR_SCALE_SEMITONES.len()) as i32;
            let midi = 12 * (octave + 1) + MAJOR_SCALE_SEMITONES[degree];
            let letter = NOTE_LETTERS[degree];

            let white = NoteIdentity {
                id: binding.symbol.to_string(),
                keyboard_label: binding.symbol.to_string(),
                display_label: format!("{}{}", letter, octave),
                frequency: note::midi_to_frequency(midi),
                midi,
                octave_degree: degree,
                white_index: index,
                is_black: false,
            };
            let white_note = Self::push(&mut notes, &mut by_id, white)?;
            white_by_code.insert(binding.code, white_note);

            if !SHARP_DEGREES.contains(&degree) {
                continue;
            }
            let Some(symbol) = shifted_symbol(binding.symbol) else {
                continue;
            };

            let black = NoteIdentity {
                id: symbol.clone(),
                keyboard_label: symbol,
                display_label: format!("{}#{}", letter, octave),
                frequency: note::midi_to_frequency(midi + 1),
                midi: midi + 1,
                octave_degree: degree,
                white_index: index,
                is_black: true,
            };
            let black_note = Self::push(&mut notes, &mut by_id, black)?;
            black_by_white.insert(white_note, black_note);
        }

        Ok(KeyMap {
            notes,
            by_id,
            white_by_code,
            black_by_white,
        })
    }

    /// Builds the default layout starting at the given octave.
    pub fn with_default_bindings(base_octave: i32) -> Result<KeyMap, KeyMapError> {
        KeyMap::new(DEFAULT_BINDINGS, base_octave)
    }

    fn push(
        notes: &mut Vec<NoteIdentity>,
        by_id: &mut HashMap<String, usize>,
        note: NoteIdentity,
    ) -> Result<usize, KeyMapError> {
        if by_id.contains_key(&note.id) {
            return Err(KeyMapError::DuplicateId(note.id));
        }
        let index = notes.len();
        by_id.insert(note.id.clone(), index);
        notes.push(note);
        Ok(index)
    }

    /// Resolves a key event to a note. Shift selects the black key; without shift
    /// the white key is returned. Unbound codes, and shifted keys with no black
    /// key, resolve to nothing.
    pub fn resolve(&self, code: KeyCode, modifiers: Modifiers) -> Option<&NoteIdentity> {
        let white = *self.white_by_code.get(&code)?;
        let index = if modifiers.shift {
            *self.black_by_white.get(&white)?
        } else {
            white
        };
        self.notes.get(index)
    }

    /// Looks up a note by id.
    pub fn note(&self, id: &str) -> Option<&NoteIdentity> {
        self.by_id.get(id).and_then(|index| self.notes.get(*index))
    }

    /// Resolves a typed glyph. Key ids are the glyphs printed on the keys, so a
    /// lowercase letter or digit selects a white key and its shifted glyph
    /// selects the black key.
    pub fn resolve_symbol(&self, symbol: &str) -> Option<&NoteIdentity> {
        self.note(symbol.trim())
    }

    /// All notes in layout order.
    pub fn notes(&self) -> &[NoteIdentity] {
        &self.notes
    }

    pub fn white_keys(&self) -> impl Iterator<Item = &NoteIdentity> {
        self.notes.iter().filter(|note| !note.is_black)
    }

    pub fn black_keys(&self) -> impl Iterator<Item = &NoteIdentity> {
        self.notes.iter().filter(|note| note.is_black)
    }
}

/// The glyph produced by the key with shift held. Digits use the US layout;
/// anything else is uppercased. Returns None when shift does not change the glyph.
fn shifted_symbol(symbol: &str) -> Option<String> {
    let shifted = match symbol {
        "1" => "!".to_string(),
        "2" => "@".to_string(),
        "3" => "#".to_string(),
        "4" => "$".to_string(),
        "5" => "%".to_string(),
        "6" => "^".to_string(),
        "7" => "&".to_string(),
        "8" => "*".to_string(),
        "9" => "(".to_string(),
        "0" => ")".to_string(),
        _ => symbol.to_uppercase(),
    };
    (shifted != symbol).then_some(shifted)
}
