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

use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
use tracing::{info, warn};

/// Default priority for the audio callback thread when KEYPIANO_THREAD_PRIORITY is unset.
const DEFAULT_CALLBACK_THREAD_PRIORITY: u8 = 70;

/// Reads KEYPIANO_THREAD_PRIORITY (0-99) once, when the stream is built, so the
/// callback never touches the environment.
pub fn callback_thread_priority() -> ThreadPriority {
    parse_priority(std::env::var("KEYPIANO_THREAD_PRIORITY").ok().as_deref())
}

fn parse_priority(value: Option<&str>) -> ThreadPriority {
    value
        .and_then(|v| v.trim().parse::<u8>().ok())
        .filter(|n| *n < 100)
        .and_then(|n| ThreadPriorityValue::try_from(n).ok())
        .or_else(|| ThreadPriorityValue::try_from(DEFAULT_CALLBACK_THREAD_PRIORITY).ok())
        .map(ThreadPriority::Crossplatform)
        .unwrap_or(ThreadPriority::Max)
}

fn flag_value(value: Option<&str>) -> bool {
    value
        .map(|v| {
            let v = v.trim();
            v == "1"
                || v.eq_ignore_ascii_case("true")
                || v.eq_ignore_ascii_case("yes")
                || v.eq_ignore_ascii_case("on")
        })
        .unwrap_or(false)
}

/// Returns whether we should attempt RT (SCHED_FIFO) scheduling for the audio callback thread.
/// Default: enabled. Opt out with KEYPIANO_DISABLE_RT_AUDIO=1.
pub fn rt_audio_enabled() -> bool {
    !flag_value(std::env::var("KEYPIANO_DISABLE_RT_AUDIO").ok().as_deref())
}

/// Raises the priority of the calling thread. Only the first call per callback
/// thread does anything.
pub fn configure_audio_thread_priority(
    tp: ThreadPriority,
    rt_audio: bool,
    priority_set: &mut bool,
) {
    if *priority_set {
        return;
    }
    let _ = set_current_thread_priority(tp);

    #[cfg(unix)]
    if rt_audio {
        use thread_priority::unix::{
            set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
            ThreadSchedulePolicy,
        };
        let tid = thread_native_id();
        match set_thread_priority_and_policy(
            tid,
            tp,
            ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
        ) {
            Ok(()) => {
                info!("Enabled RT SCHED_FIFO for audio callback thread");
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "Failed to set RT SCHED_FIFO for audio callback thread"
                );
            }
        }
    }
    #[cfg(not(unix))]
    let _ = rt_audio;

    *priority_set = true;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_priority() {
        let default = ThreadPriority::Crossplatform(
            ThreadPriorityValue::try_from(DEFAULT_CALLBACK_THREAD_PRIORITY).unwrap(),
        );
        assert_eq!(parse_priority(None), default);
        assert_eq!(parse_priority(Some("junk")), default);
        assert_eq!(parse_priority(Some("100")), default);
        assert_eq!(
            parse_priority(Some(" 42 ")),
            ThreadPriority::Crossplatform(ThreadPriorityValue::try_from(42u8).unwrap())
        );
    }

    #[test]
    fn test_flag_value() {
        assert!(flag_value(Some("1")));
        assert!(flag_value(Some("TRUE")));
        assert!(flag_value(Some("on")));
        assert!(!flag_value(Some("0")));
        assert!(!flag_value(Some("off")));
        assert!(!flag_value(None));
    }
}
