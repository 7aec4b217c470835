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
use std::{fmt, sync::Arc};

use crate::config;

pub mod buffer;
pub mod cpal;
pub mod mixer;
pub mod mock;
pub mod node;
mod thread_priority;

pub use buffer::PcmBuffer;
pub use mixer::{AudioMixer, Completion, CompletionReason};
pub use node::PlaybackNode;

/// Errors raised while opening or starting an output device.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("no output device found with name {0}")]
    NoDevice(String),

    #[error("audio host unavailable: {0}")]
    HostUnavailable(#[from] ::cpal::HostUnavailable),

    #[error("unable to enumerate devices: {0}")]
    Devices(#[from] ::cpal::DevicesError),

    #[error("unable to read device name: {0}")]
    DeviceName(#[from] ::cpal::DeviceNameError),

    #[error("unable to query output configuration: {0}")]
    DefaultConfig(#[from] ::cpal::DefaultStreamConfigError),

    #[error("unable to query supported configurations: {0}")]
    SupportedConfigs(#[from] ::cpal::SupportedStreamConfigsError),

    #[error("unsupported sample format {0}")]
    UnsupportedFormat(String),

    #[error("unable to build output stream: {0}")]
    BuildStream(#[from] ::cpal::BuildStreamError),

    #[error("unable to start output stream: {0}")]
    PlayStream(#[from] ::cpal::PlayStreamError),

    #[error("output device {0} is already started")]
    AlreadyStarted(String),

    #[error("output device {0} is unavailable")]
    Unavailable(String),

    #[error("output thread failed: {0}")]
    OutputThread(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// An output the mixer can be rendered to.
pub trait Device: fmt::Display + Send + Sync {
    /// Starts rendering the mixer to the output. Returns once the output is running.
    fn start(&self, mixer: Arc<AudioMixer>) -> Result<(), AudioError>;

    /// Stops the output and releases the mixer. Stopping a device that isn't
    /// running does nothing.
    fn stop(&self);

    /// The output sample rate.
    fn sample_rate(&self) -> u32;

    /// The number of output channels.
    fn num_channels(&self) -> u16;
}

/// Lists output devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, AudioError> {
    cpal::Device::list()
}

/// Gets the device described by the configuration. Names starting with "mock"
/// produce a mock device that renders without any hardware.
pub fn get_device(config: &config::Audio) -> Result<Arc<dyn Device>, AudioError> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(device)));
    };

    Ok(Arc::new(cpal::Device::get(config)?))
}
