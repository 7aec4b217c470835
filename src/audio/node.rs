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
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// The handle shared between a voice and the mixer source that renders it.
///
/// Gain and the stop flag are atomics so that the fader, the engine and the audio
/// callback can all touch a node without taking a lock.
pub struct PlaybackNode {
    /// The voice this node belongs to.
    voice_id: u64,
    /// The key the voice was started for.
    key_id: Arc<str>,
    /// Current gain as f32 bits.
    gain: AtomicU32,
    /// Set once the node has been stopped. Never cleared.
    stopped: AtomicBool,
}

impl PlaybackNode {
    /// Creates a node at full gain.
    pub fn new(voice_id: u64, key_id: Arc<str>) -> Arc<PlaybackNode> {
        Arc::new(PlaybackNode {
            voice_id,
            key_id,
            gain: AtomicU32::new(1.0f32.to_bits()),
            stopped: AtomicBool::new(false),
        })
    }

    pub fn voice_id(&self) -> u64 {
        self.voice_id
    }

    pub fn key_id(&self) -> &Arc<str> {
        &self.key_id
    }

    #[inline]
    pub fn gain(&self) -> f32 {
        f32::from_bits(self.gain.load(Ordering::Relaxed))
    }

    pub fn set_gain(&self, gain: f32) {
        self.gain.store(gain.max(0.0).to_bits(), Ordering::Relaxed);
    }

    /// Stops the node. The mixer drops it on its next pass.
    /// Returns true only for the call that actually stopped it.
    pub fn stop(&self) -> bool {
        !self.stopped.swap(true, Ordering::AcqRel)
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for PlaybackNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackNode")
            .field("voice_id", &self.voice_id)
            .field("key_id", &self.key_id)
            .field("gain", &self.gain())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_is_idempotent() {
        let node = PlaybackNode::new(1, Arc::from("1"));
        assert!(!node.is_stopped());
        assert!(node.stop());
        assert!(!node.stop());
        assert!(node.is_stopped());
    }

    #[test]
    fn test_gain() {
        let node = PlaybackNode::new(1, Arc::from("1"));
        assert_eq!(node.gain(), 1.0);
        node.set_gain(0.25);
        assert_eq!(node.gain(), 0.25);
        node.set_gain(-1.0);
        assert_eq!(node.gain(), 0.0);
    }
}
