use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Local};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::detect::FrameVerdict;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetectionRecord {
    pub timestamp: DateTime<Local>,
    pub helmet_present: bool,
    pub confidence: f32,
}

/// Bounded per-subject detection log.
///
/// Each subject keeps at most `capacity` records; the oldest is evicted first.
pub struct DetectionHistory {
    window: Duration,
    capacity: usize,
    subjects: Mutex<HashMap<String, Arc<Mutex<VecDeque<DetectionRecord>>>>>,
}

impl DetectionHistory {
    pub fn new(window_days: u32, capacity: usize) -> Self {
        Self {
            window: Duration::days(window_days as i64),
            capacity: capacity.max(1),
            subjects: Mutex::new(HashMap::new()),
        }
    }

    pub fn record(
        &self,
        subject_id: &str,
        verdict: &FrameVerdict,
        at: DateTime<Local>,
    ) -> Result<()> {
        let log = self.log(subject_id)?;
        let mut log = log
            .lock()
            .map_err(|_| anyhow!("history lock poisoned"))?;
        if log.len() == self.capacity {
            log.pop_front();
        }
        log.push_back(DetectionRecord {
            timestamp: at,
            helmet_present: verdict.helmet_present,
            confidence: verdict.confidence,
        });
        Ok(())
    }

    /// Records inside the look-back window ending at `now`, oldest first.
    pub fn recent(&self, subject_id: &str, now: DateTime<Local>) -> Result<Vec<DetectionRecord>> {
        let cutoff = now - self.window;
        let log = self.log(subject_id)?;
        let log = log
            .lock()
            .map_err(|_| anyhow!("history lock poisoned"))?;
        Ok(log
            .iter()
            .filter(|r| r.timestamp >= cutoff && r.timestamp <= now)
            .cloned()
            .collect())
    }

    fn log(&self, subject_id: &str) -> Result<Arc<Mutex<VecDeque<DetectionRecord>>>> {
        crate::validate_identifier(subject_id)?;
        let mut subjects = self
            .subjects
            .lock()
            .map_err(|_| anyhow!("history map lock poisoned"))?;
        Ok(subjects
            .entry(subject_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(VecDeque::new())))
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap()
    }

    fn verdict(helmet_present: bool) -> FrameVerdict {
        FrameVerdict {
            helmet_present,
            confidence: if helmet_present { 0.8 } else { 0.0 },
            ..FrameVerdict::empty()
        }
    }

    #[test]
    fn recent_respects_window() {
        let history = DetectionHistory::new(7, 100);
        history.record("w1", &verdict(true), at(1)).unwrap();
        history.record("w1", &verdict(false), at(10)).unwrap();
        history.record("w1", &verdict(true), at(12)).unwrap();

        let recent = history.recent("w1", at(14)).unwrap();
        assert_eq!(recent.len(), 2);
        assert!(!recent[0].helmet_present);
        assert!(recent[1].helmet_present);
        assert!(history.recent("other", at(14)).unwrap().is_empty());
    }

    #[test]
    fn capacity_evicts_oldest() {
        let history = DetectionHistory::new(30, 2);
        for day in 1..=3 {
            history.record("w1", &verdict(true), at(day)).unwrap();
        }
        let recent = history.recent("w1", at(5)).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].timestamp, at(2));
    }
}
