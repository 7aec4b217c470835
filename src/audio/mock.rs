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
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use crossbeam_channel::RecvTimeoutError;
use parking_lot::Mutex;
use tracing::{debug, info, span, Level};

use super::{AudioError, AudioMixer};

/// How often the mock device renders a block.
const RENDER_INTERVAL: Duration = Duration::from_millis(10);

/// Mock devices whose name contains this marker refuse to start.
const UNAVAILABLE_MARKER: &str = "unavailable";

/// A mock device. Renders the mixer in real time and throws the audio away.
pub struct Device {
    name: String,
    sample_rate: u32,
    num_channels: u16,
    is_running: AtomicBool,
    render_thread: Mutex<Option<RenderThread>>,
}

struct RenderThread {
    shutdown_tx: crossbeam_channel::Sender<()>,
    handle: thread::JoinHandle<()>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            sample_rate: 44100,
            num_channels: 2,
            is_running: AtomicBool::new(false),
            render_thread: Mutex::new(None),
        }
    }

    /// Returns true if the device is currently rendering.
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }
}

impl super::Device for Device {
    fn start(&self, mixer: Arc<AudioMixer>) -> Result<(), AudioError> {
        if self.name.contains(UNAVAILABLE_MARKER) {
            return Err(AudioError::Unavailable(self.name.clone()));
        }

        let mut render_thread = self.render_thread.lock();
        if render_thread.is_some() {
            return Err(AudioError::AlreadyStarted(self.name.clone()));
        }

        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        let block_frames =
            (self.sample_rate as usize * RENDER_INTERVAL.as_millis() as usize) / 1000;
        let name = self.name.clone();

        let handle = thread::spawn(move || {
            let span = span!(Level::INFO, "render (mock)");
            let _enter = span.enter();

            let mut scratch = vec![0.0f32; block_frames * usize::from(mixer.num_channels())];
            loop {
                match shutdown_rx.recv_timeout(RENDER_INTERVAL) {
                    Err(RecvTimeoutError::Timeout) => mixer.process_into_output(&mut scratch),
                    _ => break,
                }
            }
            debug!(device = name, "Mock render thread exiting");
        });

        self.is_running.store(true, Ordering::Relaxed);
        info!(device = self.name, "Mock output started");
        *render_thread = Some(RenderThread {
            shutdown_tx,
            handle,
        });
        Ok(())
    }

    fn stop(&self) {
        if let Some(render_thread) = self.render_thread.lock().take() {
            let _ = render_thread.shutdown_tx.send(());
            let _ = render_thread.handle.join();
            self.is_running.store(false, Ordering::Relaxed);
            info!(device = self.name, "Mock output stopped");
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn num_channels(&self) -> u16 {
        self.num_channels
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
