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

//! Release fade-outs.
//!
//! A released voice is handed to the fader, which steps its gain down on a
//! dedicated thread and stops the node on the final step. Callers never wait on
//! a fade.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, span, trace, Level};

use crate::audio::PlaybackNode;

/// Lowest gain a fade starts from, so that a silent node still steps to a stop.
const MIN_START_GAIN: f32 = 0.0001;

/// Waits shorter than this are slept precisely instead of on the wake channel.
const PRECISE_WAIT: Duration = Duration::from_millis(2);

/// The timing and curve of a release fade.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FadeShape {
    /// Number of gain steps. The node is stopped on the last one.
    pub steps: u32,
    /// Time between steps.
    pub step: Duration,
}

impl Default for FadeShape {
    fn default() -> Self {
        FadeShape {
            steps: 20,
            step: Duration::from_micros(4500),
        }
    }
}

impl FadeShape {
    /// Gain after `step` of `steps` steps: `start * (1 - p^2)` with `p = step / steps`.
    pub fn gain_at(&self, start: f32, step: u32) -> f32 {
        let steps = self.steps.max(1);
        let progress = step.min(steps) as f32 / steps as f32;
        start * (1.0 - progress * progress)
    }

    /// Total length of the fade.
    pub fn duration(&self) -> Duration {
        self.step * self.steps.max(1)
    }
}

struct FadeJob {
    node: Arc<PlaybackNode>,
    start_gain: f32,
    step: u32,
    next_at: Instant,
}

/// Runs fade-outs on a background thread.
pub struct Fader {
    shape: FadeShape,
    jobs: Arc<Mutex<Vec<FadeJob>>>,
    wake_tx: Option<Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Fader {
    pub fn new(shape: FadeShape) -> Fader {
        let jobs: Arc<Mutex<Vec<FadeJob>>> = Arc::new(Mutex::new(Vec::new()));
        let (wake_tx, wake_rx) = crossbeam_channel::unbounded::<()>();

        let thread_jobs = jobs.clone();
        let handle = thread::spawn(move || {
            let span = span!(Level::INFO, "fader");
            let _enter = span.enter();

            loop {
                let next_at = thread_jobs.lock().iter().map(|job| job.next_at).min();
                match next_at {
                    None => {
                        // Idle until there's something to fade.
                        if wake_rx.recv().is_err() {
                            break;
                        }
                    }
                    Some(next_at) => {
                        // Long waits stay responsive to new fades and shutdown. Only
                        // the tail of the wait is slept precisely.
                        let wait = next_at.saturating_duration_since(Instant::now());
                        if wait > PRECISE_WAIT {
                            match wake_rx.recv_timeout(wait - PRECISE_WAIT) {
                                Ok(()) | Err(RecvTimeoutError::Timeout) => continue,
                                Err(RecvTimeoutError::Disconnected) => break,
                            }
                        }
                        spin_sleep::sleep(wait);
                        Fader::step_due(&shape, &thread_jobs);
                    }
                }
            }
            debug!("Fader exiting");
        });

        Fader {
            shape,
            jobs,
            wake_tx: Some(wake_tx),
            handle: Some(handle),
        }
    }

    /// Starts fading the node out from its current gain.
    pub fn schedule(&self, node: Arc<PlaybackNode>) {
        let start_gain = node.gain().max(MIN_START_GAIN);
        trace!(voice_id = node.voice_id(), start_gain, "Scheduling fade-out");
        self.jobs.lock().push(FadeJob {
            node,
            start_gain,
            step: 0,
            next_at: Instant::now() + self.shape.step,
        });
        if let Some(wake_tx) = &self.wake_tx {
            let _ = wake_tx.send(());
        }
    }

    /// Hard-stops every fade in flight. Returns how many were cut short.
    pub fn halt_all(&self) -> usize {
        let jobs: Vec<FadeJob> = self.jobs.lock().drain(..).collect();
        for job in jobs.iter() {
            job.node.stop();
        }
        jobs.len()
    }

    /// The number of fades in flight.
    pub fn in_flight(&self) -> usize {
        self.jobs.lock().len()
    }

    fn step_due(shape: &FadeShape, jobs: &Mutex<Vec<FadeJob>>) {
        let now = Instant::now();
        let mut jobs = jobs.lock();
        jobs.retain_mut(|job| {
            if job.next_at > now {
                return true;
            }

            job.step += 1;
            job.node.set_gain(shape.gain_at(job.start_gain, job.step));
            if job.step >= shape.steps {
                job.node.stop();
                trace!(voice_id = job.node.voice_id(), "Fade-out complete");
                return false;
            }
            job.next_at += shape.step;
            true
        });
    }
}

impl Drop for Fader {
    fn drop(&mut self) {
        self.halt_all();
        // Closing the wake channel ends the thread.
        self.wake_tx = None;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::eventually;

    #[test]
    fn test_gain_curve() {
        let shape = FadeShape::default();
        assert_eq!(shape.steps, 20);
        assert_eq!(shape.step, Duration::from_micros(4500));
        assert_eq!(shape.duration(), Duration::from_millis(90));

        assert_eq!(shape.gain_at(1.0, 0), 1.0);
        assert!((shape.gain_at(1.0, 10) - 0.75).abs() < 1e-6);
        assert!((shape.gain_at(0.5, 10) - 0.375).abs() < 1e-6);
        assert_eq!(shape.gain_at(1.0, 20), 0.0);
        // Past the end stays silent.
        assert_eq!(shape.gain_at(1.0, 25), 0.0);
    }

    #[test]
    fn test_gain_is_monotonic() {
        let shape = FadeShape::default();
        let gains: Vec<f32> = (0..=shape.steps).map(|step| shape.gain_at(1.0, step)).collect();
        assert!(gains.windows(2).all(|w| w[1] < w[0]));
    }

    #[test]
    fn test_fade_stops_node() {
        let fader = Fader::new(FadeShape {
            steps: 4,
            step: Duration::from_millis(1),
        });
        let node = PlaybackNode::new(1, Arc::from("1"));

        fader.schedule(node.clone());

        eventually(|| node.is_stopped(), "Node never stopped");
        assert_eq!(node.gain(), 0.0);
        eventually(|| fader.in_flight() == 0, "Fade never finished");
    }

    #[test]
    fn test_silent_node_still_stops() {
        let fader = Fader::new(FadeShape {
            steps: 2,
            step: Duration::from_millis(1),
        });
        let node = PlaybackNode::new(1, Arc::from("1"));
        node.set_gain(0.0);

        fader.schedule(node.clone());

        eventually(|| node.is_stopped(), "Node never stopped");
    }

    #[test]
    fn test_halt_all() {
        let fader = Fader::new(FadeShape {
            steps: 20,
            step: Duration::from_secs(1),
        });
        let a = PlaybackNode::new(1, Arc::from("1"));
        let b = PlaybackNode::new(2, Arc::from("2"));
        fader.schedule(a.clone());
        fader.schedule(b.clone());
        assert_eq!(fader.in_flight(), 2);

        assert_eq!(fader.halt_all(), 2);

        assert!(a.is_stopped());
        assert!(b.is_stopped());
        assert_eq!(fader.in_flight(), 0);
    }

    #[test]
    fn test_drop_halts_fades() {
        let node = PlaybackNode::new(1, Arc::from("1"));
        {
            let fader = Fader::new(FadeShape {
                steps: 20,
                step: Duration::from_secs(1),
            });
            fader.schedule(node.clone());
        }
        assert!(node.is_stopped());
    }
}
