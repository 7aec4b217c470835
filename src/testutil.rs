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
use std::{
    error::Error,
    fs::File,
    path::PathBuf,
    thread,
    time::{Duration, Instant},
};

use hound::{SampleFormat, WavSpec, WavWriter};
use parking_lot::Mutex;

use crate::input::NoteSink;

/// Polls the predicate until it's true, panicking with the message after 3 seconds.
#[inline]
pub fn eventually<F>(predicate: F, error_msg: &str)
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    let tick = Duration::from_millis(10);
    let timeout = Duration::from_secs(3);

    loop {
        if start.elapsed() > timeout {
            panic!("{}", error_msg);
        }
        if predicate() {
            return;
        }
        thread::sleep(tick);
    }
}

/// Writes a 32 bit float WAV file. Each inner vector is one channel.
pub fn write_wav(
    path: PathBuf,
    channels: &[Vec<f32>],
    sample_rate: u32,
) -> Result<(), Box<dyn Error>> {
    let tempwav = File::create(path)?;

    let num_channels = channels.len();
    assert!(num_channels <= u16::MAX.into(), "Too many channels!");
    let mut writer = WavWriter::new(
        tempwav,
        WavSpec {
            channels: num_channels as u16,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        },
    )?;

    let frames = channels.iter().map(Vec::len).max().unwrap_or(0);
    for frame in 0..frames {
        for channel in channels {
            writer.write_sample(channel.get(frame).copied().unwrap_or(0.0))?;
        }
    }
    writer.finalize()?;

    Ok(())
}

/// An event seen by a RecordingSink.
#[derive(Clone, Debug, PartialEq)]
pub enum SinkEvent {
    On { id: String, frequency: f64 },
    Off { id: String },
}

/// A NoteSink that records every call.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().clone()
    }

    pub fn plays(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| matches!(event, SinkEvent::On { .. }))
            .count()
    }

    pub fn stops(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| matches!(event, SinkEvent::Off { .. }))
            .count()
    }
}

impl NoteSink for RecordingSink {
    fn note_on(&self, id: &str, frequency: f64, _duration: f64) {
        self.events.lock().push(SinkEvent::On {
            id: id.to_string(),
            frequency,
        });
    }

    fn note_off(&self, id: &str) {
        self.events.lock().push(SinkEvent::Off { id: id.to_string() });
    }
}
