//! Continuous-wear session timer.
//!
//! Time is credited only between two positive verdicts that arrive less than
//! `max_gap_secs` apart. Anything longer is treated as a dropped connection
//! and skipped, though the timer keeps running from the new tick.

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::detect::FrameVerdict;

/// Timestamp source, in seconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

/// Hand-driven clock for tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<f64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, t: f64) {
        if let Ok(mut now) = self.now.lock() {
            *now = t;
        }
    }

    pub fn advance(&self, secs: f64) {
        if let Ok(mut now) = self.now.lock() {
            *now += secs;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.now.lock().map(|now| *now).unwrap_or(0.0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TimerState {
    pub accumulated_seconds: f64,
    pub running: bool,
    pub last_tick_timestamp: f64,
}

impl TimerState {
    /// Feed one verdict observed at `t`. Returns the seconds credited.
    pub fn tick(&mut self, helmet_present: bool, t: f64, max_gap_secs: f64) -> f64 {
        if !helmet_present {
            self.running = false;
            return 0.0;
        }

        let mut credited = 0.0;
        if self.running {
            // Backward clock jumps count as zero elapsed time.
            let dt = (t - self.last_tick_timestamp).max(0.0);
            if dt > 0.0 && dt < max_gap_secs {
                self.accumulated_seconds += dt;
                credited = dt;
            } else if dt >= max_gap_secs {
                log::debug!("timer gap of {:.2}s not credited", dt);
            }
        }
        self.last_tick_timestamp = t;
        self.running = true;
        credited
    }

    pub fn start(&mut self, now: f64) {
        self.running = true;
        self.last_tick_timestamp = now;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn reset(&mut self) {
        self.accumulated_seconds = 0.0;
        self.running = false;
    }

    /// `MM:SS`; minutes keep growing past 59.
    pub fn display(&self) -> String {
        let total = self.accumulated_seconds.max(0.0).floor() as u64;
        format!("{:02}:{:02}", total / 60, total % 60)
    }
}

/// A single timer with its gap bound.
#[derive(Clone, Debug)]
pub struct SessionTimer {
    state: TimerState,
    max_gap_secs: f64,
}

impl SessionTimer {
    pub fn new(max_gap_secs: f64) -> Self {
        Self {
            state: TimerState::default(),
            max_gap_secs,
        }
    }

    pub fn tick(&mut self, verdict: &FrameVerdict, t: f64) -> TimerState {
        self.state.tick(verdict.helmet_present, t, self.max_gap_secs);
        self.state.clone()
    }

    pub fn start(&mut self, now: f64) {
        self.state.start(now);
    }

    pub fn stop(&mut self) {
        self.state.stop();
    }

    pub fn reset(&mut self) {
        self.state.reset();
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }
}

/// Keyed session timers, locked per session.
pub struct TimerRegistry {
    max_gap_secs: f64,
    sessions: Mutex<HashMap<String, Arc<Mutex<TimerState>>>>,
}

impl TimerRegistry {
    pub fn new(max_gap_secs: f64) -> Self {
        Self {
            max_gap_secs,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn tick(&self, session_id: &str, verdict: &FrameVerdict, t: f64) -> Result<TimerState> {
        self.tick_presence(session_id, verdict.helmet_present, t)
    }

    pub fn tick_presence(&self, session_id: &str, helmet_present: bool, t: f64) -> Result<TimerState> {
        let max_gap = self.max_gap_secs;
        self.with_state(session_id, |state| {
            state.tick(helmet_present, t, max_gap);
        })
    }

    pub fn start(&self, session_id: &str, now: f64) -> Result<TimerState> {
        self.with_state(session_id, |state| state.start(now))
    }

    pub fn stop(&self, session_id: &str) -> Result<TimerState> {
        self.with_state(session_id, TimerState::stop)
    }

    pub fn reset(&self, session_id: &str) -> Result<TimerState> {
        self.with_state(session_id, TimerState::reset)
    }

    /// Current state; unknown sessions start at zero.
    pub fn snapshot(&self, session_id: &str) -> Result<TimerState> {
        self.with_state(session_id, |_| {})
    }

    fn with_state<F>(&self, session_id: &str, f: F) -> Result<TimerState>
    where
        F: FnOnce(&mut TimerState),
    {
        crate::validate_identifier(session_id)?;
        let entry = {
            let mut sessions = self
                .sessions
                .lock()
                .map_err(|_| anyhow!("timer registry lock poisoned"))?;
            sessions
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(TimerState::default())))
                .clone()
        };
        let mut state = entry
            .lock()
            .map_err(|_| anyhow!("timer state lock poisoned"))?;
        f(&mut state);
        Ok(state.clone())
    }
}
