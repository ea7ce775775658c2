//! `SafetyMonitor` owns the detector and every keyed store.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::sync::Arc;

use crate::config::HelmetConfig;
use crate::detect::FrameVerdict;
use crate::frame::Frame;
use crate::history::{DetectionHistory, DetectionRecord};
use crate::pipeline::HelmetDetector;
use crate::streak::{StreakState, StreakStore, StreakUpdate};
use crate::timer::{Clock, SystemClock, TimerRegistry, TimerState};

/// Everything one processed request produces.
#[derive(Clone, Debug, Serialize)]
pub struct DetectionReport {
    pub subject_id: String,
    pub processed_at: DateTime<Local>,
    pub verdict: FrameVerdict,
    pub streak: StreakState,
    pub reward: u32,
    pub timer: TimerState,
    pub timer_display: String,
}

pub struct SafetyMonitor {
    detector: HelmetDetector,
    streaks: StreakStore,
    timers: TimerRegistry,
    history: DetectionHistory,
    clock: Arc<dyn Clock>,
}

impl SafetyMonitor {
    pub fn from_config(cfg: &HelmetConfig) -> Self {
        Self::new(
            HelmetDetector::from_config(cfg),
            StreakStore::new(cfg.milestones.clone()),
            TimerRegistry::new(cfg.max_gap_secs),
            DetectionHistory::new(cfg.history_window_days, cfg.history_capacity),
        )
    }

    pub fn new(
        detector: HelmetDetector,
        streaks: StreakStore,
        timers: TimerRegistry,
        history: DetectionHistory,
    ) -> Self {
        Self {
            detector,
            streaks,
            timers,
            history,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn detector(&self) -> &HelmetDetector {
        &self.detector
    }

    pub fn detect(&self, bytes: &[u8]) -> FrameVerdict {
        self.detector.detect(bytes)
    }

    /// Streak update keyed on the local calendar day of `at`.
    pub fn record_verdict(
        &self,
        subject_id: &str,
        verdict: &FrameVerdict,
        at: DateTime<Local>,
    ) -> Result<StreakUpdate> {
        self.streaks.record_verdict(subject_id, verdict, at.date_naive())
    }

    pub fn tick(&self, session_id: &str, verdict: &FrameVerdict, t: f64) -> Result<TimerState> {
        self.timers.tick(session_id, verdict, t)
    }

    pub fn start_timer(&self, session_id: &str) -> Result<TimerState> {
        self.timers.start(session_id, self.clock.now())
    }

    pub fn stop_timer(&self, session_id: &str) -> Result<TimerState> {
        self.timers.stop(session_id)
    }

    pub fn reset_timer(&self, session_id: &str) -> Result<TimerState> {
        self.timers.reset(session_id)
    }

    pub fn timer(&self, session_id: &str) -> Result<TimerState> {
        self.timers.snapshot(session_id)
    }

    pub fn streak(&self, subject_id: &str) -> Result<StreakState> {
        self.streaks.snapshot(subject_id)
    }

    pub fn history(&self, subject_id: &str) -> Result<Vec<DetectionRecord>> {
        self.history.recent(subject_id, self.now()?)
    }

    /// Detect, log, tick the subject's timer and update its streak.
    ///
    /// The subject id doubles as the timer session id.
    pub fn process(
        &self,
        subject_id: &str,
        bytes: &[u8],
        at: DateTime<Local>,
    ) -> Result<DetectionReport> {
        crate::validate_identifier(subject_id)?;
        let verdict = self.detect(bytes);
        self.report(subject_id, verdict, at)
    }

    /// [`process`](Self::process) stamped with the monitor's clock.
    pub fn process_now(&self, subject_id: &str, bytes: &[u8]) -> Result<DetectionReport> {
        let at = self.now()?;
        self.process(subject_id, bytes, at)
    }

    /// Detect on a decoded frame, stamped with the monitor's clock.
    pub fn observe(&self, subject_id: &str, frame: &Frame) -> Result<DetectionReport> {
        let verdict = self.detector.detect_frame(frame);
        self.report(subject_id, verdict, self.now()?)
    }

    /// Feed an already computed verdict through the stores.
    pub fn report(
        &self,
        subject_id: &str,
        verdict: FrameVerdict,
        at: DateTime<Local>,
    ) -> Result<DetectionReport> {
        let t = at.timestamp_micros() as f64 / 1_000_000.0;
        self.history.record(subject_id, &verdict, at)?;
        let timer = self.timers.tick(subject_id, &verdict, t)?;
        let update = self.record_verdict(subject_id, &verdict, at)?;

        Ok(DetectionReport {
            subject_id: subject_id.to_string(),
            processed_at: at,
            verdict,
            streak: update.state,
            reward: update.reward,
            timer_display: timer.display(),
            timer,
        })
    }

    fn now(&self) -> Result<DateTime<Local>> {
        let micros = (self.clock.now() * 1_000_000.0).round() as i64;
        DateTime::from_timestamp_micros(micros)
            .map(|utc| utc.with_timezone(&Local))
            .ok_or_else(|| anyhow!("clock returned an out-of-range timestamp"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{ClassTable, StubBackend, StubDetection};
    use crate::pipeline::Attempt;
    use crate::streak::Milestone;
    use crate::timer::ManualClock;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([40, 60, 90])))
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    fn monitor(detections: Vec<StubDetection>) -> SafetyMonitor {
        let detector = HelmetDetector::new(
            ClassTable::default_helmet(),
            vec![Attempt {
                score_threshold: 0.25,
                nms_threshold: 0.45,
                input_side: 64,
            }],
        )
        .with_backend(Box::new(StubBackend::with_detections(detections)));
        SafetyMonitor::new(
            detector,
            StreakStore::new(Milestone::defaults()),
            TimerRegistry::new(2.0),
            DetectionHistory::new(30, 100),
        )
    }

    #[test]
    fn process_feeds_every_store() {
        let monitor = monitor(vec![StubDetection::new(0.5, 0.5, 0.3, 0.3, 0, 0.9)]);
        let bytes = png(64, 48);
        let t0 = DateTime::from_timestamp(1_700_000_000, 0)
            .unwrap()
            .with_timezone(&Local);

        let first = monitor.process("worker-1", &bytes, t0).unwrap();
        assert!(first.verdict.helmet_present);
        assert_eq!(first.streak.current_streak_length, 1);
        assert!(first.timer.running);
        assert_eq!(first.timer_display, "00:00");

        let second = monitor
            .process("worker-1", &bytes, t0 + chrono::Duration::milliseconds(1500))
            .unwrap();
        assert!((second.timer.accumulated_seconds - 1.5).abs() < 1e-6);
        assert_eq!(second.reward, 0);
        assert_eq!(second.streak.current_streak_length, 1);
    }

    #[test]
    fn timer_controls_use_clock() {
        let clock = Arc::new(ManualClock::new(1_700_000_000.0));
        let monitor = monitor(Vec::new()).with_clock(clock.clone());

        let state = monitor.start_timer("s1").unwrap();
        assert!(state.running);
        assert_eq!(state.last_tick_timestamp, 1_700_000_000.0);

        let positive = FrameVerdict {
            helmet_present: true,
            ..FrameVerdict::empty()
        };
        let state = monitor.tick("s1", &positive, 1_700_000_001.0).unwrap();
        assert_eq!(state.accumulated_seconds, 1.0);

        assert!(!monitor.stop_timer("s1").unwrap().running);
        assert_eq!(monitor.reset_timer("s1").unwrap().accumulated_seconds, 0.0);
    }

    #[test]
    fn history_is_read_back_through_the_clock() {
        let clock = Arc::new(ManualClock::new(1_700_000_000.0));
        let monitor = monitor(Vec::new()).with_clock(clock.clone());
        monitor.process_now("worker-2", &png(32, 32)).unwrap();
        clock.advance(60.0);

        let history = monitor.history("worker-2").unwrap();
        assert_eq!(history.len(), 1);
        assert!(!history[0].helmet_present);
    }

    #[test]
    fn invalid_subject_is_rejected() {
        let monitor = monitor(Vec::new());
        assert!(monitor.process("no spaces", &png(8, 8), Local::now()).is_err());
    }
}
