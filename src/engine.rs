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

//! The voice engine.
//!
//! Each key owns at most one sounding voice. Starting a key that is already
//! sounding fades the old voice out before the new one starts, and releasing a
//! key fades its voice out without blocking the caller.
//!
//! Voices leave the table in three ways:
//! - `stop_note`, which removes the voice and hands it to the fader
//! - retrigger, which does the same before inserting the new voice
//! - natural completion, reported by the mixer, which removes the entry only if
//!   it still holds the voice that completed

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::thread;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use tracing::{debug, error, info, span, trace, warn, Level};

use crate::audio::{self, AudioMixer, Completion, Device};
use crate::config::{Config, ConfigError};
use crate::note;
use crate::samples::{self, SampleLibrary};
use crate::synth::{self, SynthError};

mod fade;
mod voice;

pub use fade::{FadeShape, Fader};
pub use voice::{Voice, VoiceSource};

/// Mixer format used when there is no output device to ask.
const FALLBACK_CHANNELS: u16 = 2;
const FALLBACK_SAMPLE_RATE: u32 = 44100;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("audio output is not running")]
    NotRunning,

    #[error("unable to synthesize note: {0}")]
    Synthesis(#[from] SynthError),
}

/// Plays notes for keys, one voice per key.
pub struct VoiceEngine {
    inner: Arc<Inner>,
}

struct Inner {
    /// Active voices by key id. All table changes happen under this lock.
    voices: Mutex<HashMap<String, Voice>>,
    mixer: Arc<AudioMixer>,
    device: Option<Arc<dyn Device>>,
    /// False when the output failed to start. Plays are refused in that case.
    running: bool,
    library: SampleLibrary,
    fader: Fader,
}

impl VoiceEngine {
    /// Creates the engine and starts the output device. An engine whose device is
    /// missing or fails to start still works, but refuses to play.
    pub fn new(
        device: Option<Arc<dyn Device>>,
        library: SampleLibrary,
        fade: FadeShape,
    ) -> VoiceEngine {
        let (completion_tx, completion_rx) = crossbeam_channel::unbounded();
        let (num_channels, sample_rate) = device
            .as_ref()
            .map(|device| (device.num_channels(), device.sample_rate()))
            .unwrap_or((FALLBACK_CHANNELS, FALLBACK_SAMPLE_RATE));
        let mixer = Arc::new(AudioMixer::new(num_channels, sample_rate, completion_tx));

        let running = match &device {
            Some(device) => match device.start(mixer.clone()) {
                Ok(()) => true,
                Err(e) => {
                    error!(
                        err = %e,
                        device = %device,
                        "Unable to start audio output, notes will not play"
                    );
                    false
                }
            },
            None => {
                warn!("No audio output, notes will not play");
                false
            }
        };

        if library.is_empty() {
            info!("No samples available, all notes will be synthesized");
        }

        let inner = Arc::new(Inner {
            voices: Mutex::new(HashMap::new()),
            mixer,
            device,
            running,
            library,
            fader: Fader::new(fade),
        });
        VoiceEngine::spawn_completion_thread(Arc::downgrade(&inner), completion_rx);

        VoiceEngine { inner }
    }

    /// Creates the engine described by the configuration: opens the configured
    /// device and loads the configured sample directory.
    pub fn from_config(config: &Config) -> Result<VoiceEngine, ConfigError> {
        let fade = config.engine().fade_shape()?;

        let device = match audio::get_device(config.audio()) {
            Ok(device) => Some(device),
            Err(e) => {
                error!(err = %e, device = config.audio().device(), "Unable to open audio device");
                None
            }
        };

        let library = match config.samples().directory() {
            Some(directory) => samples::load_directory(directory).unwrap_or_else(|e| {
                warn!(err = %e, "Unable to load samples, falling back to synthesized audio");
                SampleLibrary::new()
            }),
            None => SampleLibrary::new(),
        };

        Ok(VoiceEngine::new(device, library, fade))
    }

    /// Applies mixer completions to the voice table until the mixer goes away.
    fn spawn_completion_thread(inner: Weak<Inner>, completion_rx: Receiver<Completion>) {
        thread::spawn(move || {
            let span = span!(Level::INFO, "voice completions");
            let _enter = span.enter();

            for completion in completion_rx.iter() {
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                inner.complete(completion);
            }
            debug!("Completion thread exiting");
        });
    }

    /// Starts a note for the key. Any voice the key already has is faded out first.
    pub fn play_note(
        &self,
        key_id: &str,
        frequency: f64,
        duration: f64,
    ) -> Result<(), EngineError> {
        if let Some(prior) = self.inner.voices.lock().remove(key_id) {
            self.inner.release(prior, "Retriggered");
        }

        if !self.inner.running {
            warn!(key = key_id, "Audio output is not running, ignoring note");
            return Err(EngineError::NotRunning);
        }

        let source = self.inner.select_source(frequency, duration)?;
        let voice = Voice::new(Arc::from(key_id), source);
        info!(
            key = key_id,
            voice_id = voice.id(),
            source = %voice.source(),
            "Playing note"
        );

        // Hold the table while the source is handed to the mixer, so a completion
        // for this voice can only be applied after the voice is in the table.
        let mut voices = self.inner.voices.lock();
        let raced = voices.remove(key_id);
        self.inner
            .mixer
            .add_source(voice.node().clone(), voice.source().buffer().clone());
        voices.insert(key_id.to_string(), voice);
        drop(voices);

        // Another play for this key got in between the two locks above.
        if let Some(raced) = raced {
            self.inner.release(raced, "Retriggered");
        }
        Ok(())
    }

    /// Fades out the key's voice. Returns false if the key had no voice.
    pub fn stop_note(&self, key_id: &str) -> bool {
        let voice = self.inner.voices.lock().remove(key_id);
        match voice {
            Some(voice) => {
                self.inner.release(voice, "Released");
                true
            }
            None => false,
        }
    }

    /// Stops every voice immediately, including voices that are fading out.
    pub fn stop_all(&self) {
        let voices: Vec<Voice> = self
            .inner
            .voices
            .lock()
            .drain()
            .map(|(_, voice)| voice)
            .collect();
        for voice in voices.iter() {
            voice.node().stop();
        }
        let fades = self.inner.fader.halt_all();

        if !voices.is_empty() || fades > 0 {
            info!(voices = voices.len(), fades, "Stopped all voices");
        }
    }

    /// The number of keys with a sounding voice. Voices fading out don't count.
    pub fn active_voice_count(&self) -> usize {
        self.inner.voices.lock().len()
    }

    pub fn is_active(&self, key_id: &str) -> bool {
        self.inner.voices.lock().contains_key(key_id)
    }

    /// True when the audio output started successfully.
    pub fn is_running(&self) -> bool {
        self.inner.running
    }

    /// The number of loaded samples.
    pub fn sample_count(&self) -> usize {
        self.inner.library.len()
    }
}

impl Inner {
    /// Uses the sample for the nearest piano note if there is one, otherwise
    /// synthesizes a tone.
    fn select_source(&self, frequency: f64, duration: f64) -> Result<VoiceSource, SynthError> {
        if let Some(name) = note::sample_note_name(frequency) {
            if let Some(buffer) = self.library.get(&name) {
                return Ok(VoiceSource::Sample {
                    note: name,
                    buffer: buffer.clone(),
                });
            }
        }

        Ok(VoiceSource::Synthesized {
            frequency,
            buffer: synth::synthesize(frequency, duration)?,
        })
    }

    /// Hands a voice that has left the table to the fader.
    fn release(&self, voice: Voice, reason: &str) {
        debug!(
            key = voice.key_id().as_ref(),
            voice_id = voice.id(),
            held_ms = voice.age().as_millis() as u64,
            reason,
            "Fading out voice"
        );
        self.fader.schedule(voice.node().clone());
    }

    /// Removes the voice a completion refers to, if the key still holds it.
    fn complete(&self, completion: Completion) {
        let mut voices = self.voices.lock();
        let current = voices
            .get(completion.key_id.as_ref())
            .map(|voice| voice.id());

        if current == Some(completion.voice_id) {
            voices.remove(completion.key_id.as_ref());
            debug!(
                key = completion.key_id.as_ref(),
                voice_id = completion.voice_id,
                "Voice finished"
            );
        } else {
            trace!(
                key = completion.key_id.as_ref(),
                voice_id = completion.voice_id,
                reason = ?completion.reason,
                "Ignoring completion for a voice no longer in the table"
            );
        }
    }
}

impl Drop for VoiceEngine {
    fn drop(&mut self) {
        self.stop_all();
        if let Some(device) = &self.inner.device {
            device.stop();
        }
    }
}

#[cfg(test)]
impl VoiceEngine {
    /// The node of the key's current voice.
    fn voice_node(&self, key_id: &str) -> Option<Arc<audio::PlaybackNode>> {
        self.inner
            .voices
            .lock()
            .get(key_id)
            .map(|voice| voice.node().clone())
    }

    /// The source of the key's current voice.
    fn voice_source(&self, key_id: &str) -> Option<VoiceSource> {
        self.inner
            .voices
            .lock()
            .get(key_id)
            .map(|voice| voice.source().clone())
    }
}
