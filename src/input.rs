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

//! Turns key and pointer events into note starts and stops.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::engine::VoiceEngine;
use crate::keymap::{KeyCode, KeyMap, Modifiers};

/// Receives the notes a router decides to start and stop.
pub trait NoteSink: Send + Sync {
    fn note_on(&self, id: &str, frequency: f64, duration: f64);
    fn note_off(&self, id: &str);
}

impl NoteSink for VoiceEngine {
    fn note_on(&self, id: &str, frequency: f64, duration: f64) {
        if let Err(e) = self.play_note(id, frequency, duration) {
            warn!(key = id, err = %e, "Unable to play note");
        }
    }

    fn note_off(&self, id: &str) {
        self.stop_note(id);
    }
}

impl<T: NoteSink + ?Sized> NoteSink for Arc<T> {
    fn note_on(&self, id: &str, frequency: f64, duration: f64) {
        (**self).note_on(id, frequency, duration)
    }

    fn note_off(&self, id: &str) {
        (**self).note_off(id)
    }
}

/// A physical key transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: KeyCode,
    /// Set for auto-repeat presses generated while a key is held.
    pub is_repeat: bool,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn new(code: KeyCode, modifiers: Modifiers) -> KeyEvent {
        KeyEvent {
            code,
            is_repeat: false,
            modifiers,
        }
    }

    pub fn repeat(code: KeyCode, modifiers: Modifiers) -> KeyEvent {
        KeyEvent {
            code,
            is_repeat: true,
            modifiers,
        }
    }
}

/// Tracks which keys are down and forwards presses and releases to a sink.
///
/// A note is started once per press: auto-repeat and a second press of a held
/// key are swallowed.
pub struct KeyRouter<S: NoteSink> {
    keymap: Arc<KeyMap>,
    sink: S,
    /// Length passed to the sink for every note, in seconds.
    note_duration: f64,
    /// The note each held physical key started.
    active_by_code: HashMap<KeyCode, String>,
    /// Every held note, whatever pressed it.
    pressed: HashSet<String>,
    /// The note under a held pointer.
    pointer_key: Option<String>,
}

impl<S: NoteSink> KeyRouter<S> {
    pub fn new(keymap: Arc<KeyMap>, sink: S, note_duration: f64) -> KeyRouter<S> {
        KeyRouter {
            keymap,
            sink,
            note_duration,
            active_by_code: HashMap::new(),
            pressed: HashSet::new(),
            pointer_key: None,
        }
    }

    pub fn keymap(&self) -> &Arc<KeyMap> {
        &self.keymap
    }

    /// Handles a key press. Returns true if the event belongs to a note.
    /// Shortcut chords are never routed.
    pub fn key_down(&mut self, event: KeyEvent) -> bool {
        if event.modifiers.is_shortcut() {
            return false;
        }
        let Some(id) = self
            .keymap
            .resolve(event.code, event.modifiers)
            .map(|note| note.id().to_string())
        else {
            return false;
        };

        if event.is_repeat {
            return self.active_by_code.contains_key(&event.code);
        }

        // Shift changed while the key was held, so the key now means another note.
        if let Some(previous) = self.active_by_code.get(&event.code).cloned() {
            if previous != id {
                self.release(&previous);
            }
        }

        self.active_by_code.insert(event.code, id.clone());
        self.press(&id);
        true
    }

    /// Handles a key release. The note the key started is released even if the
    /// modifiers changed since. Shortcut chords are never routed.
    pub fn key_up(&mut self, event: KeyEvent) -> bool {
        if event.modifiers.is_shortcut() {
            return false;
        }
        if let Some(id) = self.active_by_code.remove(&event.code) {
            self.release(&id);
            return true;
        }

        match self
            .keymap
            .resolve(event.code, event.modifiers)
            .map(|note| note.id().to_string())
        {
            Some(id) => {
                self.release(&id);
                true
            }
            None => false,
        }
    }

    /// Presses a note by id. Returns true if a note was started.
    pub fn press(&mut self, id: &str) -> bool {
        let Some(frequency) = self.keymap.note(id).map(|note| note.frequency()) else {
            debug!(key = id, "Ignoring press of unknown key");
            return false;
        };
        if !self.pressed.insert(id.to_string()) {
            return false;
        }

        self.sink.note_on(id, frequency, self.note_duration);
        true
    }

    /// Releases a note by id. Returns true if the note was held.
    pub fn release(&mut self, id: &str) -> bool {
        if !self.pressed.remove(id) {
            return false;
        }

        self.sink.note_off(id);
        true
    }

    /// The pointer went down over a key, or over nothing.
    pub fn pointer_down(&mut self, id: Option<&str>) {
        self.pointer_moved(id);
    }

    /// The held pointer moved. Moving onto another key releases the previous one.
    pub fn pointer_drag(&mut self, id: Option<&str>) {
        self.pointer_moved(id);
    }

    /// The pointer was lifted.
    pub fn pointer_up(&mut self) {
        if let Some(id) = self.pointer_key.take() {
            self.release(&id);
        }
    }

    fn pointer_moved(&mut self, id: Option<&str>) {
        if self.pointer_key.as_deref() == id {
            return;
        }
        if let Some(previous) = self.pointer_key.take() {
            self.release(&previous);
        }
        if let Some(id) = id {
            if self.press(id) {
                self.pointer_key = Some(id.to_string());
            }
        }
    }

    /// Releases everything that is held.
    pub fn release_all(&mut self) {
        let mut held: Vec<String> = self.pressed.drain().collect();
        held.sort();
        for id in held.iter() {
            self.sink.note_off(id);
        }
        self.active_by_code.clear();
        self.pointer_key = None;
    }

    pub fn is_pressed(&self, id: &str) -> bool {
        self.pressed.contains(id)
    }

    pub fn pressed_count(&self) -> usize {
        self.pressed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::DEFAULT_BASE_OCTAVE;
    use crate::testutil::{RecordingSink, SinkEvent};

    /// Key code of "1" in the default layout.
    const KEY_1: KeyCode = 18;
    /// Key code of "2" in the default layout.
    const KEY_2: KeyCode = 19;
    /// Key code of "q" in the default layout.
    const KEY_Q: KeyCode = 12;

    fn router() -> (KeyRouter<Arc<RecordingSink>>, Arc<RecordingSink>) {
        let keymap = Arc::new(KeyMap::with_default_bindings(DEFAULT_BASE_OCTAVE).unwrap());
        let sink = Arc::new(RecordingSink::default());
        (KeyRouter::new(keymap, sink.clone(), 3.0), sink)
    }

    fn on(id: &str) -> String {
        format!("on {}", id)
    }

    fn off(id: &str) -> String {
        format!("off {}", id)
    }

    fn summary(sink: &RecordingSink) -> Vec<String> {
        sink.events()
            .iter()
            .map(|event| match event {
                SinkEvent::On { id, .. } => on(id),
                SinkEvent::Off { id } => off(id),
            })
            .collect()
    }

    #[test]
    fn test_press_and_release() {
        let (mut router, sink) = router();

        assert!(router.press("1"));
        assert!(router.release("1"));

        assert_eq!(sink.plays(), 1);
        assert_eq!(sink.stops(), 1);
        match &sink.events()[0] {
            SinkEvent::On { id, frequency } => {
                assert_eq!(id, "1");
                assert!((frequency - 130.81).abs() < 0.01);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_key_down_and_up() {
        let (mut router, sink) = router();

        assert!(router.key_down(KeyEvent::new(KEY_1, Modifiers::NONE)));
        assert!(router.is_pressed("1"));
        assert!(router.key_up(KeyEvent::new(KEY_1, Modifiers::NONE)));
        assert!(!router.is_pressed("1"));

        assert_eq!(summary(&sink), vec![on("1"), off("1")]);
    }

    #[test]
    fn test_repeat_is_swallowed() {
        let (mut router, sink) = router();

        // Repeat of a key that isn't down is not ours.
        assert!(!router.key_down(KeyEvent::repeat(KEY_1, Modifiers::NONE)));

        assert!(router.key_down(KeyEvent::new(KEY_1, Modifiers::NONE)));
        assert!(router.key_down(KeyEvent::repeat(KEY_1, Modifiers::NONE)));
        assert!(router.key_down(KeyEvent::repeat(KEY_1, Modifiers::NONE)));

        assert_eq!(sink.plays(), 1);
    }

    #[test]
    fn test_shift_change_while_held() {
        let (mut router, sink) = router();

        router.key_down(KeyEvent::new(KEY_1, Modifiers::NONE));
        router.key_down(KeyEvent::new(KEY_1, Modifiers::SHIFT));
        // Shift was let go before the key, the black key is still released.
        router.key_up(KeyEvent::new(KEY_1, Modifiers::NONE));

        assert_eq!(summary(&sink), vec![on("1"), off("1"), on("!"), off("!")]);
        assert_eq!(router.pressed_count(), 0);
    }

    #[test]
    fn test_unbound_keys() {
        let (mut router, sink) = router();

        assert!(!router.key_down(KeyEvent::new(999, Modifiers::NONE)));
        assert!(!router.key_up(KeyEvent::new(999, Modifiers::NONE)));
        // "3" is E3, which has no black key.
        assert!(!router.key_down(KeyEvent::new(20, Modifiers::SHIFT)));
        assert!(!router.press("?"));

        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_shortcut_chords_are_not_routed() {
        let (mut router, sink) = router();
        let command = Modifiers {
            command: true,
            ..Modifiers::NONE
        };
        let control_shift = Modifiers {
            control: true,
            ..Modifiers::SHIFT
        };

        // Cmd+Q is quit, not F4.
        assert!(!router.key_down(KeyEvent::new(KEY_Q, command)));
        assert!(!router.key_up(KeyEvent::new(KEY_Q, command)));
        assert!(!router.key_down(KeyEvent::new(KEY_1, control_shift)));
        assert!(!router.key_down(KeyEvent::new(
            KEY_1,
            Modifiers {
                alt: true,
                ..Modifiers::NONE
            }
        )));

        assert_eq!(sink.plays(), 0);
        assert_eq!(router.pressed_count(), 0);
    }

    #[test]
    fn test_held_notes_are_not_replayed() {
        let (mut router, sink) = router();

        assert!(router.press("1"));
        assert!(!router.press("1"));
        assert!(!router.release("2"));

        assert_eq!(summary(&sink), vec![on("1")]);
    }

    #[test]
    fn test_pointer_drag() {
        let (mut router, sink) = router();

        router.pointer_down(Some("1"));
        router.pointer_drag(Some("1"));
        router.pointer_drag(Some("2"));
        router.pointer_drag(None);
        router.pointer_drag(Some("3"));
        router.pointer_up();

        assert_eq!(
            summary(&sink),
            vec![on("1"), off("1"), on("2"), off("2"), on("3"), off("3")]
        );
    }

    #[test]
    fn test_release_all() {
        let (mut router, sink) = router();

        router.key_down(KeyEvent::new(KEY_1, Modifiers::NONE));
        router.key_down(KeyEvent::new(KEY_2, Modifiers::NONE));
        router.pointer_down(Some("q"));
        router.release_all();

        assert_eq!(router.pressed_count(), 0);
        assert_eq!(sink.stops(), 3);
        // Nothing is left to release.
        router.key_up(KeyEvent::new(KEY_1, Modifiers::NONE));
        router.pointer_up();
        assert_eq!(sink.stops(), 3);
    }
}
