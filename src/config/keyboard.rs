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
use std::time::Duration;

use serde::Deserialize;

use super::{parse_duration, ConfigError};
use crate::keymap::DEFAULT_BASE_OCTAVE;

const DEFAULT_NOTE_DURATION: Duration = Duration::from_secs(3);
const DEFAULT_HOLD: Duration = Duration::from_millis(250);

/// Keyboard layout and note timing.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Keyboard {
    /// Octave of the first key (default: 3).
    base_octave: Option<i32>,

    /// Length of a synthesized note (default: 3s).
    note_duration: Option<String>,

    /// How long the terminal driver holds each key (default: 250ms).
    hold: Option<String>,
}

impl Keyboard {
    pub fn base_octave(&self) -> i32 {
        self.base_octave.unwrap_or(DEFAULT_BASE_OCTAVE)
    }

    /// Returns the synthesized note length.
    pub fn note_duration(&self) -> Result<Duration, ConfigError> {
        let duration = match &self.note_duration {
            Some(value) => parse_duration("keyboard.note_duration", value)?,
            None => DEFAULT_NOTE_DURATION,
        };
        if duration.is_zero() {
            return Err(ConfigError::Invalid {
                field: "keyboard.note_duration",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(duration)
    }

    /// Returns how long each key is held by the terminal driver.
    pub fn hold(&self) -> Result<Duration, ConfigError> {
        match &self.hold {
            Some(value) => parse_duration("keyboard.hold", value),
            None => Ok(DEFAULT_HOLD),
        }
    }
}
