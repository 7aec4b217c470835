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
use std::{fmt, sync::Arc, thread};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use tracing::{debug, error, info, span, Level};

use super::{
    thread_priority::{callback_thread_priority, configure_audio_thread_priority, rt_audio_enabled},
    AudioError, AudioMixer,
};
use crate::config;

/// The name that selects the host's default output device.
const DEFAULT_DEVICE: &str = "default";

/// A cpal output device.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
    /// The stream sample rate.
    sample_rate: u32,
    /// The stream channel count.
    num_channels: u16,
    /// The native sample format of the stream.
    sample_format: cpal::SampleFormat,
    /// The thread that owns the running stream.
    output_thread: Mutex<Option<OutputThread>>,
}

/// cpal streams aren't Send on every platform, so the stream is built and owned
/// by a dedicated thread that lives until the device is stopped.
struct OutputThread {
    shutdown_tx: crossbeam_channel::Sender<()>,
    handle: thread::JoinHandle<()>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn super::Device>>, AudioError> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn super::Device> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal devices.
    fn list_cpal_devices() -> Result<Vec<Device>, AudioError> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let Ok(output_configs) = device.supported_output_configs() else {
                    continue;
                };
                let max_channels = output_configs
                    .map(|output_config| output_config.channels())
                    .max()
                    .unwrap_or(0);

                if max_channels == 0 {
                    continue;
                }
                match Device::from_cpal(host_id, device, max_channels) {
                    Ok(device) => devices.push(device),
                    Err(e) => debug!(err = %e, host = host_id.name(), "Skipping device"),
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Wraps a cpal device, taking its default output configuration.
    fn from_cpal(
        host_id: cpal::HostId,
        device: cpal::Device,
        max_channels: u16,
    ) -> Result<Device, AudioError> {
        let default_config = device.default_output_config()?;
        Ok(Device {
            name: device.name()?,
            max_channels: max_channels.max(default_config.channels()),
            host_id,
            sample_rate: default_config.sample_rate().0,
            num_channels: default_config.channels(),
            sample_format: default_config.sample_format(),
            device,
            output_thread: Mutex::new(None),
        })
    }

    /// Gets the given cpal device. The name "default" selects the default output
    /// device of the default host.
    pub fn get(config: &config::Audio) -> Result<Device, AudioError> {
        let name = config.device();
        let mut device = if name == DEFAULT_DEVICE {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or_else(|| AudioError::NoDevice(name.to_string()))?;
            Device::from_cpal(host.id(), device, 0)?
        } else {
            Device::list_cpal_devices()?
                .into_iter()
                .find(|device| device.name.trim() == name)
                .ok_or_else(|| AudioError::NoDevice(name.to_string()))?
        };

        if let Some(sample_rate) = config.sample_rate() {
            device.sample_rate = sample_rate;
        }

        info!(
            device = device.name,
            sample_rate = device.sample_rate,
            channels = device.num_channels,
            format = %device.sample_format,
            "Using output device"
        );
        Ok(device)
    }

    fn build_stream(&self, mixer: Arc<AudioMixer>) -> Result<cpal::Stream, AudioError> {
        let stream_config = cpal::StreamConfig {
            channels: self.num_channels,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        match self.sample_format {
            cpal::SampleFormat::F32 => {
                build_typed_stream::<f32>(&self.device, &stream_config, mixer)
            }
            cpal::SampleFormat::I16 => {
                build_typed_stream::<i16>(&self.device, &stream_config, mixer)
            }
            cpal::SampleFormat::I32 => {
                build_typed_stream::<i32>(&self.device, &stream_config, mixer)
            }
            cpal::SampleFormat::U16 => {
                build_typed_stream::<u16>(&self.device, &stream_config, mixer)
            }
            other => Err(AudioError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Builds an output stream that renders the mixer and converts to the device's
/// native sample type.
fn build_typed_stream<T>(
    device: &cpal::Device,
    stream_config: &cpal::StreamConfig,
    mixer: Arc<AudioMixer>,
) -> Result<cpal::Stream, AudioError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let priority = callback_thread_priority();
    let rt_audio = rt_audio_enabled();
    let mut priority_set = false;
    let mut scratch: Vec<f32> = Vec::new();

    let stream = device.build_output_stream(
        stream_config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            configure_audio_thread_priority(priority, rt_audio, &mut priority_set);

            // Only grows when the host changes its buffer size.
            if scratch.len() != data.len() {
                scratch.resize(data.len(), 0.0);
            }
            mixer.process_into_output(&mut scratch);
            for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
                *dst = <T as cpal::Sample>::from_sample(src);
            }
        },
        |err| error!("CPAL output stream error: {}", err),
        None,
    )?;
    Ok(stream)
}

impl super::Device for Device {
    fn start(&self, mixer: Arc<AudioMixer>) -> Result<(), AudioError> {
        let mut output_thread = self.output_thread.lock();
        if output_thread.is_some() {
            return Err(AudioError::AlreadyStarted(self.name.clone()));
        }

        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), AudioError>>(1);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        let device = Device {
            name: self.name.clone(),
            max_channels: self.max_channels,
            host_id: self.host_id,
            device: self.device.clone(),
            sample_rate: self.sample_rate,
            num_channels: self.num_channels,
            sample_format: self.sample_format,
            output_thread: Mutex::new(None),
        };

        let handle = thread::spawn(move || {
            let span = span!(Level::INFO, "output (cpal)");
            let _enter = span.enter();

            let stream = match device.build_stream(mixer) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(e.into()));
                return;
            }
            let _ = ready_tx.send(Ok(()));

            // Either an explicit stop or the sender being dropped ends the stream.
            let _ = shutdown_rx.recv();
            drop(stream);
            debug!(device = device.name, "Output stream closed");
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!(device = self.name, "Output stream started");
                *output_thread = Some(OutputThread {
                    shutdown_tx,
                    handle,
                });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(AudioError::OutputThread(format!(
                    "output thread for {} exited before starting",
                    self.name
                )))
            }
        }
    }

    fn stop(&self) {
        if let Some(output_thread) = self.output_thread.lock().take() {
            let _ = output_thread.shutdown_tx.send(());
            let _ = output_thread.handle.join();
            info!(device = self.name, "Output stream stopped");
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn num_channels(&self) -> u16 {
        self.num_channels
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if let Some(output_thread) = self.output_thread.get_mut().take() {
            let _ = output_thread.shutdown_tx.send(());
            let _ = output_thread.handle.join();
        }
    }
}
