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

//! Sample directory loading.
//!
//! Every file is decoded entirely into memory at startup. A file that fails to
//! decode is skipped with a warning; it never prevents the rest from loading.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, info, warn};

use super::SampleLibrary;
use crate::audio::PcmBuffer;
use crate::note;

/// File extensions considered when scanning a sample directory.
pub const SAMPLE_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "ogg", "aif", "aiff", "m4a"];

#[derive(Debug, thiserror::Error)]
pub enum SampleLoadError {
    #[error("unable to read sample directory {}: {source}", .path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unable to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unable to decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: SymphoniaError,
    },

    #[error("{}: no audio track found", .0.display())]
    NoTrack(PathBuf),

    #[error("{}: sample rate not specified", .0.display())]
    NoSampleRate(PathBuf),

    #[error("{}: no audio decoded", .0.display())]
    Empty(PathBuf),

    #[error("{}: file name is not a note name", .0.display())]
    NotANote(PathBuf),
}

/// Loads every audio file in the directory whose stem is a note name, e.g.
/// "C4.mp3" or "Db4.wav". Files are visited in name order, so when two files
/// spell the same note the later one wins.
///
/// Only an unreadable directory is an error. An empty library is a valid result
/// and means every note will be synthesized.
pub fn load_directory(path: &Path) -> Result<SampleLibrary, SampleLoadError> {
    let entries = fs::read_dir(path).map_err(|source| SampleLoadError::Directory {
        path: path.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_file() && has_sample_extension(path))
        .collect();
    files.sort();

    let mut library = SampleLibrary::new();
    for file in files {
        match load_file(&file) {
            Ok((name, buffer)) => {
                debug!(
                    path = ?file,
                    note = name,
                    frames = buffer.frame_count(),
                    channels = buffer.channel_count(),
                    sample_rate = buffer.sample_rate(),
                    "Loaded sample"
                );
                library.insert(&name, buffer);
            }
            Err(e) => warn!(err = %e, "Skipping sample"),
        }
    }

    if library.is_empty() {
        warn!(
            path = ?path,
            "No samples loaded, falling back to synthesized audio"
        );
    } else {
        info!(
            path = ?path,
            count = library.len(),
            memory_bytes = library.memory_usage(),
            "Loaded sample library"
        );
    }

    Ok(library)
}

fn has_sample_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SAMPLE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// Loads a single sample, naming it after its file stem.
fn load_file(path: &Path) -> Result<(String, PcmBuffer), SampleLoadError> {
    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(note::canonical_note_name)
        .ok_or_else(|| SampleLoadError::NotANote(path.to_path_buf()))?;

    Ok((name, decode_file(path)?))
}

/// Decodes an entire audio file into interleaved f32 frames.
pub fn decode_file(path: &Path) -> Result<PcmBuffer, SampleLoadError> {
    let decode_error = |source| SampleLoadError::Decode {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(|source| SampleLoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(decode_error)?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| SampleLoadError::NoTrack(path.to_path_buf()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channel_count = track
        .codec_params
        .channels
        .map(|channels| channels.count())
        .unwrap_or(0);

    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(decode_error)?;

    let mut samples: Vec<f32> = Vec::new();
    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(decode_error(e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // A corrupt packet loses a few milliseconds, not the whole sample.
            Err(SymphoniaError::DecodeError(e)) => {
                debug!(path = ?path, err = e, "Skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(decode_error(e)),
        };

        let spec = *decoded.spec();
        sample_rate = playable_rate(sample_rate).or(Some(spec.rate));
        channel_count = spec.channels.count();

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buffer.samples());
    }

    let sample_rate = playable_rate(sample_rate)
        .ok_or_else(|| SampleLoadError::NoSampleRate(path.to_path_buf()))?;
    if samples.is_empty() || channel_count == 0 {
        return Err(SampleLoadError::Empty(path.to_path_buf()));
    }

    Ok(PcmBuffer::new(samples, channel_count as u16, sample_rate))
}

/// A zero rate comes from a malformed header and can't be played back.
fn playable_rate(rate: Option<u32>) -> Option<u32> {
    rate.filter(|rate| *rate > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::write_wav;

    #[test]
    fn test_decode_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("A4.wav");
        let left = vec![0.25f32, 0.5, -0.5];
        let right = vec![0.1f32, 0.2, 0.3];
        write_wav(path.clone(), &[left, right], 22050).unwrap();

        let buffer = decode_file(&path).unwrap();

        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.sample_rate(), 22050);
        assert_eq!(buffer.frame_count(), 3);
        assert_eq!(buffer.sample(0, 0), 0.25);
        assert_eq!(buffer.sample(0, 1), 0.1);
        assert_eq!(buffer.sample(2, 0), -0.5);
        assert_eq!(buffer.sample(2, 1), 0.3);
    }

    #[test]
    fn test_load_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(dir.path().join("C4.wav"), &[vec![0.5f32; 100]], 44100).unwrap();
        write_wav(dir.path().join("c#4.wav"), &[vec![0.25f32; 50]], 44100).unwrap();
        // Not a note name.
        write_wav(dir.path().join("kick.wav"), &[vec![0.5f32; 10]], 44100).unwrap();
        // Not audio.
        fs::write(dir.path().join("D4.mp3"), b"definitely not an mp3").unwrap();
        // Ignored extension.
        fs::write(dir.path().join("E4.txt"), b"E4").unwrap();

        let library = load_directory(dir.path()).unwrap();

        assert_eq!(library.names(), vec!["C4", "Db4"]);
        assert_eq!(library.get("C4").unwrap().frame_count(), 100);
        assert_eq!(library.get("C#4").unwrap().frame_count(), 50);
        assert!(library.get("D4").is_none());
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let library = load_directory(dir.path()).unwrap();
        assert!(library.is_empty());
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_directory(&dir.path().join("missing")),
            Err(SampleLoadError::Directory { .. })
        ));
    }

    #[test]
    fn test_zero_sample_rate_is_not_playable() {
        assert_eq!(playable_rate(Some(44100)), Some(44100));
        assert_eq!(playable_rate(Some(0)), None);
        assert_eq!(playable_rate(None), None);
    }

    #[test]
    fn test_undecodable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("C4.wav");
        fs::write(&path, b"RIFF but not really").unwrap();
        assert!(decode_file(&path).is_err());
    }
}
