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

//! Equal-tempered pitch arithmetic.
//!
//! Sample files are named after the note they hold ("C4", "Db4"), so the key map,
//! the sample loader and the voice engine all need to agree on how a frequency maps
//! to a MIDI note and how a MIDI note is spelled.

/// Concert pitch.
pub const A4_FREQUENCY: f64 = 440.0;

/// MIDI note number of A4.
pub const A4_MIDI: i32 = 69;

/// Lowest key on an 88 key piano (A0).
pub const LOWEST_PIANO_NOTE: i32 = 21;

/// Highest key on an 88 key piano (C8).
pub const HIGHEST_PIANO_NOTE: i32 = 108;

/// Canonical spellings. Accidentals are always written as flats so that a
/// sample library has exactly one name per pitch.
const NOTE_NAMES: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// Converts a MIDI note number to its frequency in Hz.
pub fn midi_to_frequency(midi: i32) -> f64 {
    A4_FREQUENCY * 2f64.powf(f64::from(midi - A4_MIDI) / 12.0)
}

/// Converts a frequency to the nearest equal-tempered MIDI note.
/// Returns None for frequencies that are not positive and finite.
pub fn frequency_to_midi(frequency: f64) -> Option<i32> {
    if !frequency.is_finite() || frequency <= 0.0 {
        return None;
    }

    Some((f64::from(A4_MIDI) + 12.0 * (frequency / A4_FREQUENCY).log2()).round() as i32)
}

/// Spells a MIDI note, e.g. 60 -> "C4", 61 -> "Db4".
pub fn note_name(midi: i32) -> String {
    let index = midi.rem_euclid(12) as usize;
    let octave = midi.div_euclid(12) - 1;
    format!("{}{}", NOTE_NAMES[index], octave)
}

/// Returns the name of the piano sample that would play the given frequency, or
/// None if the frequency is outside the range of a piano.
pub fn sample_note_name(frequency: f64) -> Option<String> {
    frequency_to_midi(frequency)
        .filter(|midi| (LOWEST_PIANO_NOTE..=HIGHEST_PIANO_NOTE).contains(midi))
        .map(note_name)
}

/// Parses a note name into a MIDI note number.
///
/// Accepts a letter (either case), any number of `#` or `b` accidentals and a
/// possibly negative octave: "C4", "c#4", "Db4", "Bb-1".
pub fn parse_note_name(name: &str) -> Option<i32> {
    let mut chars = name.trim().chars().peekable();

    let base = match chars.next()?.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let mut accidental = 0;
    while let Some(&c) = chars.peek() {
        match c {
            '#' => accidental += 1,
            'b' => accidental -= 1,
            _ => break,
        }
        chars.next();
    }

    let octave: i32 = chars.collect::<String>().parse().ok()?;
    let midi = 12 * (octave + 1) + base + accidental;
    (0..=127).contains(&midi).then_some(midi)
}

/// Rewrites a note name in its canonical spelling, e.g. "c#4" -> "Db4".
pub fn canonical_note_name(name: &str) -> Option<String> {
    parse_note_name(name).map(note_name)
}
