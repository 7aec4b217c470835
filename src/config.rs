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
use std::time::Duration;

use config::{Environment, File, FileFormat};
use duration_string::DurationString;
use serde::Deserialize;

mod audio;
mod engine;
mod error;
mod keyboard;
mod samples;

pub use self::audio::Audio;
pub use self::engine::Engine;
pub use self::error::ConfigError;
pub use self::keyboard::Keyboard;
pub use self::samples::Samples;

/// Prefix of environment variables that override the configuration, e.g.
/// KEYPIANO_AUDIO__DEVICE=mock.
const ENV_PREFIX: &str = "KEYPIANO";

/// The keypiano configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Config {
    #[serde(default)]
    audio: Audio,

    #[serde(default)]
    samples: Samples,

    #[serde(default)]
    keyboard: Keyboard,

    #[serde(default)]
    engine: Engine,
}

impl Config {
    /// Loads the configuration from an optional YAML file, then applies
    /// KEYPIANO_* environment overrides. Sections are separated by a double
    /// underscore: KEYPIANO_KEYBOARD__BASE_OCTAVE=4.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        Ok(builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Config>()?)
    }

    /// Parses a configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Config, ConfigError> {
        Ok(config::Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize::<Config>()?)
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    pub fn keyboard(&self) -> &Keyboard {
        &self.keyboard
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Overrides the audio device.
    pub fn with_device(mut self, device: &str) -> Config {
        self.audio.set_device(device);
        self
    }

    /// Overrides the sample directory.
    pub fn with_samples(mut self, directory: PathBuf) -> Config {
        self.samples.set_directory(directory);
        self
    }
}

/// Parses a duration string such as "250ms" or "3s".
fn parse_duration(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    DurationString::from_string(value.trim().to_string())
        .map(Duration::from)
        .map_err(|e| ConfigError::Duration {
            field,
            value: value.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::engine::FadeShape;

    #[test]
    fn test_defaults() {
        let config = Config::from_yaml("{}").unwrap();

        assert_eq!(config.audio().device(), "default");
        assert_eq!(config.audio().sample_rate(), None);
        assert_eq!(config.samples().directory(), None);
        assert_eq!(config.keyboard().base_octave(), 3);
        assert_eq!(config.keyboard().note_duration().unwrap(), Duration::from_secs(3));
        assert_eq!(config.keyboard().hold().unwrap(), Duration::from_millis(250));
        assert_eq!(config.engine().fade_shape().unwrap(), FadeShape::default());
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
            audio:
              device: mock-device
              sample_rate: 48000
            samples:
              directory: /usr/share/keypiano/samples
            keyboard:
              base_octave: 4
              note_duration: 1500ms
              hold: 1s
            engine:
              fade_steps: 10
              fade_step: 10ms
        "#;

        let config = Config::from_yaml(yaml).unwrap();

        assert_eq!(config.audio().device(), "mock-device");
        assert_eq!(config.audio().sample_rate(), Some(48000));
        assert_eq!(
            config.samples().directory(),
            Some(Path::new("/usr/share/keypiano/samples"))
        );
        assert_eq!(config.keyboard().base_octave(), 4);
        assert_eq!(
            config.keyboard().note_duration().unwrap(),
            Duration::from_millis(1500)
        );
        assert_eq!(config.keyboard().hold().unwrap(), Duration::from_secs(1));
        assert_eq!(
            config.engine().fade_shape().unwrap(),
            FadeShape {
                steps: 10,
                step: Duration::from_millis(10),
            }
        );
    }

    #[test]
    fn test_invalid_values() {
        let config = Config::from_yaml(
            r#"
            keyboard:
              note_duration: forever
            engine:
              fade_steps: 0
            "#,
        )
        .unwrap();

        assert!(matches!(
            config.keyboard().note_duration(),
            Err(ConfigError::Duration { field: "keyboard.note_duration", .. })
        ));
        assert!(matches!(
            config.engine().fade_shape(),
            Err(ConfigError::Invalid { field: "engine.fade_steps", .. })
        ));
    }

    #[test]
    fn test_load_file_and_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keypiano.yaml");
        fs::write(&path, "audio:\n  device: mock\nkeyboard:\n  base_octave: 2\n").unwrap();

        let config = Config::load(Some(&path))
            .unwrap()
            .with_device("mock-other")
            .with_samples(PathBuf::from("/tmp/samples"));

        assert_eq!(config.audio().device(), "mock-other");
        assert_eq!(config.samples().directory(), Some(Path::new("/tmp/samples")));
        assert_eq!(config.keyboard().base_octave(), 2);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::load(Some(&dir.path().join("missing.yaml"))),
            Err(ConfigError::Load(_))
        ));
    }
}
