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
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Where piano samples are loaded from.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Samples {
    /// Directory of audio files named after their notes ("C4.mp3").
    /// Without one every note is synthesized.
    directory: Option<PathBuf>,
}

impl Samples {
    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    pub fn set_directory(&mut self, directory: PathBuf) {
        self.directory = Some(directory);
    }
}
