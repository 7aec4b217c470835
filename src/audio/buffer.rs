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
use std::sync::Arc;
use std::time::Duration;

/// Decoded audio held entirely in memory.
/// The sample data is stored in an Arc so that any number of voices can share it.
#[derive(Clone)]
pub struct PcmBuffer {
    /// Interleaved f32 samples.
    data: Arc<[f32]>,
    /// Number of channels.
    channel_count: u16,
    /// Sample rate of the audio data.
    sample_rate: u32,
}

impl PcmBuffer {
    /// Creates a buffer from interleaved samples. Trailing samples that don't make
    /// up a whole frame are dropped.
    pub fn new(mut samples: Vec<f32>, channel_count: u16, sample_rate: u32) -> PcmBuffer {
        let channels = usize::from(channel_count.max(1));
        samples.truncate(samples.len() - samples.len() % channels);
        PcmBuffer {
            data: samples.into(),
            channel_count: channel_count.max(1),
            sample_rate,
        }
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames (samples per channel).
    pub fn frame_count(&self) -> usize {
        self.data.len() / usize::from(self.channel_count)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The interleaved samples.
    pub fn samples(&self) -> &[f32] {
        &self.data
    }

    /// Returns the sample at the given frame and channel, or silence past the end.
    #[inline]
    pub fn sample(&self, frame: usize, channel: usize) -> f32 {
        self.data
            .get(frame * usize::from(self.channel_count) + channel)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frame_count() as f64 / f64::from(self.sample_rate))
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }

    /// Returns true if both buffers share the same sample data.
    pub fn ptr_eq(&self, other: &PcmBuffer) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl std::fmt::Debug for PcmBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcmBuffer")
            .field("frames", &self.frame_count())
            .field("channels", &self.channel_count)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}
