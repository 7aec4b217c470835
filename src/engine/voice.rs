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
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::audio::{PcmBuffer, PlaybackNode};

/// Global voice ID counter.
static NEXT_VOICE_ID: AtomicU64 = AtomicU64::new(1);

/// The audio a voice plays.
#[derive(Clone, Debug)]
pub enum VoiceSource {
    /// A recorded sample for the named note.
    Sample { note: String, buffer: PcmBuffer },
    /// A sine tone generated for the frequency.
    Synthesized { frequency: f64, buffer: PcmBuffer },
}

impl VoiceSource {
    pub fn buffer(&self) -> &PcmBuffer {
        match self {
            VoiceSource::Sample { buffer, .. } => buffer,
            VoiceSource::Synthesized { buffer, .. } => buffer,
        }
    }

    pub fn is_sample(&self) -> bool {
        matches!(self, VoiceSource::Sample { .. })
    }
}

impl fmt::Display for VoiceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceSource::Sample { note, .. } => write!(f, "sample {}", note),
            VoiceSource::Synthesized { frequency, .. } => write!(f, "synth {:.2}Hz", frequency),
        }
    }
}

/// A sounding note. Owned by the engine's voice table.
pub struct Voice {
    /// Unique ID for this voice.
    id: u64,
    /// The key that started this voice.
    key_id: Arc<str>,
    /// What the voice is playing.
    source: VoiceSource,
    /// The node rendering this voice in the mixer.
    node: Arc<PlaybackNode>,
    /// When this voice started playing.
    start_time: Instant,
}

impl Voice {
    /// Creates a new voice with a fresh id and a full-gain node.
    pub fn new(key_id: Arc<str>, source: VoiceSource) -> Voice {
        let id = NEXT_VOICE_ID.fetch_add(1, Ordering::SeqCst);
        Voice {
            id,
            node: PlaybackNode::new(id, key_id.clone()),
            key_id,
            source,
            start_time: Instant::now(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn key_id(&self) -> &Arc<str> {
        &self.key_id
    }

    pub fn source(&self) -> &VoiceSource {
        &self.source
    }

    pub fn node(&self) -> &Arc<PlaybackNode> {
        &self.node
    }

    /// The node's current gain.
    pub fn gain(&self) -> f32 {
        self.node.gain()
    }

    pub fn age(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }
}

impl fmt::Debug for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Voice")
            .field("id", &self.id)
            .field("key_id", &self.key_id)
            .field("source", &self.source.to_string())
            .field("gain", &self.gain())
            .finish()
    }
}
