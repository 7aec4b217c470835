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
use serde::Deserialize;

use super::{parse_duration, ConfigError};
use crate::engine::FadeShape;

/// Voice engine tuning.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Engine {
    /// Number of gain steps in a release fade (default: 20).
    fade_steps: Option<u32>,

    /// Time between release fade steps (default: 4500us).
    fade_step: Option<String>,
}

impl Engine {
    /// Returns the release fade shape.
    pub fn fade_shape(&self) -> Result<FadeShape, ConfigError> {
        let default = FadeShape::default();

        let steps = self.fade_steps.unwrap_or(default.steps);
        if steps == 0 {
            return Err(ConfigError::Invalid {
                field: "engine.fade_steps",
                reason: "must be at least 1".to_string(),
            });
        }

        let step = match &self.fade_step {
            Some(value) => parse_duration("engine.fade_step", value)?,
            None => default.step,
        };

        Ok(FadeShape { steps, step })
    }
}
