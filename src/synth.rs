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

//! Sine synthesis used when no sample exists for a note.
//!
//! The tone is shaped by a raised-cosine envelope so that it starts and ends at
//! zero amplitude:
//!
//! ```text
//!   1.0 ┐   ╭──────────────────────╮
//!       │  ╱                        ╲
//!   0.0 └─╯──────────────────────────╰─→ progress
//!       0  5%                      90% 100%
//! ```

use std::f64::consts::TAU;

use tracing::debug;

use crate::audio::PcmBuffer;

/// Sample rate of synthesized buffers.
pub const SYNTH_SAMPLE_RATE: u32 = 44100;

/// Peak amplitude of synthesized buffers.
pub const SYNTH_AMPLITUDE: f32 = 0.7;

/// Fraction of the buffer spent ramping up.
const ATTACK_END: f32 = 0.05;

/// Fraction of the buffer at which the ramp down starts.
const RELEASE_START: f32 = 0.9;

#[derive(Debug, thiserror::Error)]
pub enum SynthError {
    #[error("cannot synthesize a frequency of {0}Hz")]
    InvalidFrequency(f64),

    #[error("cannot synthesize a duration of {0}s")]
    InvalidDuration(f64),

    #[error("unable to allocate a buffer of {0} frames")]
    Allocation(usize),
}

/// Envelope gain at the given progress through the buffer (0.0 to 1.0).
pub fn envelope(progress: f32) -> f32 {
    if progress < ATTACK_END {
        let attack = progress / ATTACK_END;
        0.5 * (1.0 - (std::f32::consts::PI * attack).cos())
    } else if progress > RELEASE_START {
        let release = ((progress - RELEASE_START) / (1.0 - RELEASE_START)).min(1.0);
        0.5 * (1.0 + (std::f32::consts::PI * release).cos())
    } else {
        1.0
    }
}

/// Generates a mono sine buffer at `frequency` Hz lasting `duration` seconds.
pub fn synthesize(frequency: f64, duration: f64) -> Result<PcmBuffer, SynthError> {
    if !frequency.is_finite() || frequency <= 0.0 {
        return Err(SynthError::InvalidFrequency(frequency));
    }
    if !duration.is_finite() || duration <= 0.0 {
        return Err(SynthError::InvalidDuration(duration));
    }

    let frame_count = (f64::from(SYNTH_SAMPLE_RATE) * duration) as usize;
    if frame_count == 0 {
        return Err(SynthError::InvalidDuration(duration));
    }

    let mut samples: Vec<f32> = Vec::new();
    samples
        .try_reserve_exact(frame_count)
        .map_err(|_| SynthError::Allocation(frame_count))?;

    let phase_increment = TAU * frequency / f64::from(SYNTH_SAMPLE_RATE);
    let mut phase = 0.0f64;
    for frame in 0..frame_count {
        let progress = frame as f32 / frame_count as f32;
        samples.push(phase.sin() as f32 * envelope(progress) * SYNTH_AMPLITUDE);

        phase += phase_increment;
        if phase >= TAU {
            phase -= TAU;
        }
    }

    debug!(frequency, duration, frames = frame_count, "Synthesized buffer");
    Ok(PcmBuffer::new(samples, 1, SYNTH_SAMPLE_RATE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        assert!(envelope(0.0).abs() < 1e-6);
        assert!((envelope(0.025) - 0.5).abs() < 1e-4);
        assert_eq!(envelope(0.05), 1.0);
        assert_eq!(envelope(0.5), 1.0);
        assert_eq!(envelope(0.9), 1.0);
        assert!((envelope(0.95) - 0.5).abs() < 1e-4);
        assert!(envelope(1.0).abs() < 1e-6);
    }

    #[test]
    fn test_buffer_edges_are_silent() {
        let buffer = synthesize(440.0, 0.5).unwrap();
        let samples = buffer.samples();
        let n = samples.len();

        assert_eq!(n, 22050);
        assert_eq!(buffer.channel_count(), 1);
        assert_eq!(buffer.sample_rate(), SYNTH_SAMPLE_RATE);
        assert!(samples[0].abs() < 1e-4);
        assert!(samples[n - 1].abs() < 1e-4);
    }

    #[test]
    fn test_sustain_never_exceeds_peak() {
        let buffer = synthesize(261.63, 1.0).unwrap();
        let samples = buffer.samples();
        let n = samples.len();
        let sustain = &samples[n * 5 / 100..n * 90 / 100];

        assert!(sustain.iter().all(|s| s.abs() <= SYNTH_AMPLITUDE + 1e-6));
        // The sustain section should actually reach the peak.
        let peak = sustain.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        assert!(peak > SYNTH_AMPLITUDE * 0.99);
    }

    #[test]
    fn test_whole_buffer_bounded() {
        let buffer = synthesize(1000.0, 0.25).unwrap();
        assert!(buffer
            .samples()
            .iter()
            .all(|s| s.abs() <= SYNTH_AMPLITUDE + 1e-6));
    }

    #[test]
    fn test_frequency_is_correct() {
        // Count rising zero crossings in the sustain portion of a 100Hz tone.
        let buffer = synthesize(100.0, 1.0).unwrap();
        let samples = &buffer.samples()[4410..39690];
        let crossings = samples
            .windows(2)
            .filter(|w| w[0] < 0.0 && w[1] >= 0.0)
            .count();
        // 0.8s of a 100Hz tone.
        assert!((79..=81).contains(&crossings), "got {} crossings", crossings);
    }

    #[test]
    fn test_invalid_input() {
        assert!(matches!(
            synthesize(0.0, 1.0),
            Err(SynthError::InvalidFrequency(_))
        ));
        assert!(matches!(
            synthesize(f64::NAN, 1.0),
            Err(SynthError::InvalidFrequency(_))
        ));
        assert!(matches!(
            synthesize(440.0, 0.0),
            Err(SynthError::InvalidDuration(_))
        ));
        assert!(matches!(
            synthesize(440.0, 1e-9),
            Err(SynthError::InvalidDuration(_))
        ));
    }
}
