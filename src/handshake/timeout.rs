//! Per-state `TPn` timers.
//!
//! The controller is poll-driven rather than callback-scheduled, so a
//! timer here is a deadline checked on every `poll`, not an OS timer:
//! armed on state entry, cancelled on any state change, matching
//! `transitions.extensions.states.Timeout`'s semantics without pulling in
//! a scheduler.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct Armed {
    name: &'static str,
    deadline: Instant,
}

#[derive(Debug, Default)]
pub struct TimeoutTimer {
    armed: Option<Armed>,
}

impl TimeoutTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, name: &'static str, duration: Duration) {
        self.armed = Some(Armed {
            name,
            deadline: Instant::now() + duration,
        });
    }

    pub fn cancel(&mut self) {
        self.armed = None;
    }

    /// Returns the timer's name if its deadline has passed.
    pub fn expired(&self) -> Option<&'static str> {
        self.armed.and_then(|a| {
            if Instant::now() >= a.deadline {
                Some(a.name)
            } else {
                None
            }
        })
    }

    #[cfg(test)]
    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_after_duration_elapses() {
        let mut timer = TimeoutTimer::new();
        timer.arm("TP1", Duration::from_millis(5));
        assert!(timer.expired().is_none());
        std::thread::sleep(Duration::from_millis(15));
        assert_eq!(timer.expired(), Some("TP1"));
    }

    #[test]
    fn cancel_clears_armed_timer() {
        let mut timer = TimeoutTimer::new();
        timer.arm("TP2", Duration::from_millis(5));
        timer.cancel();
        assert!(!timer.is_armed());
        std::thread::sleep(Duration::from_millis(15));
        assert!(timer.expired().is_none());
    }
}
