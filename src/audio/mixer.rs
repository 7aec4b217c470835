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
// Core audio mixing logic shared by the cpal and mock devices.
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::trace;

use crate::audio::{PcmBuffer, PlaybackNode};

/// Why a source left the mixer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompletionReason {
    /// The buffer played to its end.
    Finished,
    /// The node was stopped before the buffer ended.
    Stopped,
}

/// Sent by the mixer whenever a source leaves it.
#[derive(Clone, Debug)]
pub struct Completion {
    pub voice_id: u64,
    pub key_id: Arc<str>,
    pub reason: CompletionReason,
}

/// Core audio mixing logic that's independent of any audio backend.
pub struct AudioMixer {
    /// Sources currently playing. Only the rendering thread touches this.
    active_sources: Mutex<Vec<ActiveSource>>,
    /// Channel for handing new sources to the rendering thread.
    source_tx: Sender<ActiveSource>,
    source_rx: Receiver<ActiveSource>,
    /// Where completions are reported.
    completion_tx: Sender<Completion>,
    /// Number of output channels.
    num_channels: u16,
    /// Output sample rate.
    sample_rate: u32,
}

/// A one-shot buffer being rendered by the mixer.
struct ActiveSource {
    node: Arc<PlaybackNode>,
    buffer: PcmBuffer,
    /// Read position in source frames.
    position: f64,
    /// Source frames consumed per output frame.
    step: f64,
}

impl ActiveSource {
    fn new(node: Arc<PlaybackNode>, buffer: PcmBuffer, output_rate: u32) -> ActiveSource {
        let step = if output_rate == 0 || buffer.sample_rate() == 0 {
            1.0
        } else {
            f64::from(buffer.sample_rate()) / f64::from(output_rate)
        };
        ActiveSource {
            node,
            buffer,
            position: 0.0,
            step,
        }
    }

    /// Mixes up to `frames` frames into the interleaved output. Returns false once
    /// the buffer has been fully played.
    fn mix_into(&mut self, output: &mut [f32], channels: usize) -> bool {
        let gain = self.node.gain();
        let frame_count = self.buffer.frame_count();
        let source_channels = usize::from(self.buffer.channel_count());

        for out_frame in output.chunks_exact_mut(channels) {
            let index = self.position as usize;
            if index >= frame_count {
                return false;
            }
            let frac = (self.position - index as f64) as f32;
            let next = (index + 1).min(frame_count - 1);

            for (channel, out) in out_frame.iter_mut().enumerate() {
                // Mono sources feed every output channel.
                let source_channel = channel.min(source_channels - 1);
                let s0 = self.buffer.sample(index, source_channel);
                let s1 = self.buffer.sample(next, source_channel);
                *out += (s0 + (s1 - s0) * frac) * gain;
            }

            self.position += self.step;
        }

        (self.position as usize) < frame_count
    }
}

impl AudioMixer {
    /// Creates a new audio mixer.
    pub fn new(num_channels: u16, sample_rate: u32, completion_tx: Sender<Completion>) -> Self {
        let (source_tx, source_rx) = crossbeam_channel::unbounded();
        Self {
            active_sources: Mutex::new(Vec::new()),
            source_tx,
            source_rx,
            completion_tx,
            num_channels,
            sample_rate,
        }
    }

    /// Schedules a buffer for one-shot playback through the given node. The source
    /// is picked up on the next render pass.
    pub fn add_source(&self, node: Arc<PlaybackNode>, buffer: PcmBuffer) {
        let source = ActiveSource::new(node, buffer, self.sample_rate);
        // The receiver lives as long as the mixer, so this can't fail.
        let _ = self.source_tx.send(source);
    }

    /// Renders into an interleaved output buffer, overwriting its contents.
    /// This is called from the audio callback.
    pub fn process_into_output(&self, output: &mut [f32]) {
        output.fill(0.0);

        let channels = usize::from(self.num_channels);
        if channels == 0 {
            return;
        }

        let mut sources = self.active_sources.lock();
        while let Ok(source) = self.source_rx.try_recv() {
            sources.push(source);
        }

        sources.retain_mut(|source| {
            if source.node.is_stopped() {
                self.complete(source, CompletionReason::Stopped);
                return false;
            }

            if source.mix_into(output, channels) {
                true
            } else {
                self.complete(source, CompletionReason::Finished);
                false
            }
        });
    }

    /// Renders the given number of frames into a new buffer.
    pub fn render(&self, num_frames: usize) -> Vec<f32> {
        let mut frames = vec![0.0f32; num_frames * usize::from(self.num_channels)];
        self.process_into_output(&mut frames);
        frames
    }

    fn complete(&self, source: &ActiveSource, reason: CompletionReason) {
        trace!(
            voice_id = source.node.voice_id(),
            key = source.node.key_id().as_ref(),
            ?reason,
            "Source left the mixer"
        );
        let _ = self.completion_tx.send(Completion {
            voice_id: source.node.voice_id(),
            key_id: source.node.key_id().clone(),
            reason,
        });
    }

    /// Returns the number of sources rendered on the last pass.
    pub fn active_source_count(&self) -> usize {
        self.active_sources.lock().len()
    }

    /// Gets the number of output channels.
    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    /// Gets the sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl std::fmt::Debug for AudioMixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioMixer")
            .field("num_channels", &self.num_channels)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_mixer(num_channels: u16) -> (AudioMixer, Receiver<Completion>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (AudioMixer::new(num_channels, 44100, tx), rx)
    }

    fn node(voice_id: u64, key: &str) -> Arc<PlaybackNode> {
        PlaybackNode::new(voice_id, Arc::from(key))
    }

    #[test]
    fn test_mono_source_feeds_all_channels() {
        let (mixer, _rx) = create_mixer(2);
        mixer.add_source(node(1, "a"), PcmBuffer::new(vec![0.5, 0.8, 0.1], 1, 44100));

        let frames = mixer.render(2);

        assert_eq!(frames, vec![0.5, 0.5, 0.8, 0.8]);
        assert_eq!(mixer.active_source_count(), 1);
    }

    #[test]
    fn test_multiple_source_mixing() {
        let (mixer, _rx) = create_mixer(2);
        mixer.add_source(node(1, "a"), PcmBuffer::new(vec![0.5, 0.3, 0.5, 0.3], 2, 44100));
        mixer.add_source(node(2, "b"), PcmBuffer::new(vec![0.25, 0.125, 0.25, 0.125], 2, 44100));

        let frame = mixer.render(1);

        assert_eq!(frame, vec![0.75, 0.425]);
    }

    #[test]
    fn test_gain_is_applied() {
        let (mixer, _rx) = create_mixer(1);
        let node = node(1, "a");
        node.set_gain(0.5);
        mixer.add_source(node, PcmBuffer::new(vec![0.5; 8], 1, 44100));

        assert_eq!(mixer.render(2), vec![0.25, 0.25]);
    }

    #[test]
    fn test_finished_source_is_reported() {
        let (mixer, rx) = create_mixer(1);
        mixer.add_source(node(7, "q"), PcmBuffer::new(vec![0.1, 0.2, 0.3], 1, 44100));

        let frames = mixer.render(5);

        assert_eq!(frames, vec![0.1, 0.2, 0.3, 0.0, 0.0]);
        assert_eq!(mixer.active_source_count(), 0);

        let completion = rx.try_recv().unwrap();
        assert_eq!(completion.voice_id, 7);
        assert_eq!(completion.key_id.as_ref(), "q");
        assert_eq!(completion.reason, CompletionReason::Finished);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_stopped_source_is_removed() {
        let (mixer, rx) = create_mixer(1);
        let node = node(3, "w");
        mixer.add_source(node.clone(), PcmBuffer::new(vec![0.5; 100], 1, 44100));

        assert_eq!(mixer.render(1), vec![0.5]);
        node.stop();
        assert_eq!(mixer.render(1), vec![0.0]);
        assert_eq!(mixer.active_source_count(), 0);

        let completion = rx.try_recv().unwrap();
        assert_eq!(completion.voice_id, 3);
        assert_eq!(completion.reason, CompletionReason::Stopped);
    }

    #[test]
    fn test_zero_rate_source_still_finishes() {
        let (mixer, rx) = create_mixer(1);
        mixer.add_source(node(1, "a"), PcmBuffer::new(vec![0.5; 2], 1, 0));

        assert_eq!(mixer.render(3), vec![0.5, 0.5, 0.0]);
        assert_eq!(rx.try_recv().unwrap().reason, CompletionReason::Finished);
    }

    #[test]
    fn test_sample_rate_conversion() {
        let (mixer, _rx) = create_mixer(1);
        // A 22050Hz buffer is stretched over twice as many output frames.
        mixer.add_source(node(1, "a"), PcmBuffer::new(vec![0.0, 1.0, 0.0], 1, 22050));

        let frames = mixer.render(6);

        assert_eq!(frames, vec![0.0, 0.5, 1.0, 0.5, 0.0, 0.0]);
    }
}
