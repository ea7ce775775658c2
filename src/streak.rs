//! Daily streak tracking with milestone rewards.
//!
//! Only positive verdicts move a streak, and only once per calendar day.

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::detect::FrameVerdict;

/// Streak length that pays out `points` when reached exactly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub length: u32,
    pub points: u32,
}

impl Milestone {
    /// 3 days -> 10, 7 days -> 25, 30 days -> 100.
    pub fn defaults() -> Vec<Milestone> {
        vec![
            Milestone { length: 3, points: 10 },
            Milestone { length: 7, points: 25 },
            Milestone { length: 30, points: 100 },
        ]
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StreakState {
    pub subject_id: String,
    pub current_streak_length: u32,
    pub last_positive_date: Option<NaiveDate>,
    pub total_reward_points: u64,
}

impl StreakState {
    pub fn new(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            current_streak_length: 0,
            last_positive_date: None,
            total_reward_points: 0,
        }
    }

    /// Apply one positive verdict seen on `date`. Returns the reward earned.
    pub fn apply_positive(&mut self, date: NaiveDate, milestones: &[Milestone]) -> u32 {
        match self.last_positive_date {
            Some(last) if last == date => return 0,
            Some(last) if last.succ_opt() == Some(date) => {
                self.current_streak_length += 1;
            }
            _ => {
                self.current_streak_length = 1;
            }
        }
        self.last_positive_date = Some(date);

        let reward = milestones
            .iter()
            .find(|m| m.length == self.current_streak_length)
            .map(|m| m.points)
            .unwrap_or(0);
        self.total_reward_points += reward as u64;
        reward
    }
}

/// Result of feeding one verdict to the tracker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StreakUpdate {
    pub streak_length: u32,
    pub reward: u32,
    pub state: StreakState,
}

/// Keyed streak store.
///
/// The map lock is only held to find or create an entry; each subject's
/// read-modify-write runs under that subject's own lock.
pub struct StreakStore {
    milestones: Vec<Milestone>,
    entries: Mutex<HashMap<String, Arc<Mutex<StreakState>>>>,
}

impl Default for StreakStore {
    fn default() -> Self {
        Self::new(Milestone::defaults())
    }
}

impl StreakStore {
    pub fn new(milestones: Vec<Milestone>) -> Self {
        Self {
            milestones,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn record_verdict(
        &self,
        subject_id: &str,
        verdict: &FrameVerdict,
        date: NaiveDate,
    ) -> Result<StreakUpdate> {
        self.record(subject_id, verdict.helmet_present, date)
    }

    /// Feed one verdict. Negative verdicts leave the state untouched.
    pub fn record(
        &self,
        subject_id: &str,
        helmet_present: bool,
        date: NaiveDate,
    ) -> Result<StreakUpdate> {
        let entry = self.entry(subject_id)?;
        let mut state = entry
            .lock()
            .map_err(|_| anyhow!("streak state lock poisoned"))?;

        let reward = if helmet_present {
            state.apply_positive(date, &self.milestones)
        } else {
            0
        };
        if reward > 0 {
            log::info!(
                "subject {} reached a {}-day streak: +{} points",
                subject_id,
                state.current_streak_length,
                reward
            );
        }

        Ok(StreakUpdate {
            streak_length: state.current_streak_length,
            reward,
            state: state.clone(),
        })
    }

    /// Current state; unknown subjects start fresh.
    pub fn snapshot(&self, subject_id: &str) -> Result<StreakState> {
        let entry = self.entry(subject_id)?;
        let state = entry
            .lock()
            .map_err(|_| anyhow!("streak state lock poisoned"))?;
        Ok(state.clone())
    }

    /// Replace a subject's state, e.g. when loading from an external store.
    pub fn restore(&self, state: StreakState) -> Result<()> {
        let entry = self.entry(&state.subject_id)?;
        let mut current = entry
            .lock()
            .map_err(|_| anyhow!("streak state lock poisoned"))?;
        *current = state;
        Ok(())
    }

    fn entry(&self, subject_id: &str) -> Result<Arc<Mutex<StreakState>>> {
        crate::validate_identifier(subject_id)?;
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("streak store lock poisoned"))?;
        Ok(entries
            .entry(subject_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(StreakState::new(subject_id))))
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() + chrono::Days::new(n as u64)
    }

    #[test]
    fn first_positive_starts_streak() {
        let mut state = StreakState::new("w1");
        assert_eq!(state.apply_positive(day(0), &Milestone::defaults()), 0);
        assert_eq!(state.current_streak_length, 1);
        assert_eq!(state.last_positive_date, Some(day(0)));
    }

    #[test]
    fn consecutive_days_hit_milestones() {
        let milestones = Milestone::defaults();
        let mut state = StreakState::new("w1");
        let rewards: Vec<u32> = (0..30)
            .map(|n| state.apply_positive(day(n), &milestones))
            .collect();

        assert_eq!(rewards[2], 10);
        assert_eq!(rewards[6], 25);
        assert_eq!(rewards[29], 100);
        assert_eq!(rewards.iter().sum::<u32>(), 135);
        assert_eq!(state.total_reward_points, 135);
        assert_eq!(state.current_streak_length, 30);
    }

    #[test]
    fn same_day_is_a_no_op_and_gaps_reset() {
        let milestones = Milestone::defaults();
        let mut state = StreakState {
            subject_id: "w1".to_string(),
            current_streak_length: 2,
            last_positive_date: Some(day(10)),
            total_reward_points: 0,
        };

        assert_eq!(state.apply_positive(day(11), &milestones), 10);
        assert_eq!(state.current_streak_length, 3);

        let before = state.clone();
        assert_eq!(state.apply_positive(day(11), &milestones), 0);
        assert_eq!(state, before);

        assert_eq!(state.apply_positive(day(14), &milestones), 0);
        assert_eq!(state.current_streak_length, 1);
        assert_eq!(state.total_reward_points, 10);
    }

    #[test]
    fn negative_verdicts_never_mutate() {
        let store = StreakStore::default();
        store.record("w1", true, day(0)).unwrap();
        let update = store.record("w1", false, day(1)).unwrap();
        assert_eq!(update.reward, 0);
        assert_eq!(update.state.last_positive_date, Some(day(0)));
        assert_eq!(update.streak_length, 1);
    }

    #[test]
    fn unknown_subject_starts_fresh_and_bad_ids_fail() {
        let store = StreakStore::default();
        let snapshot = store.snapshot("new-subject").unwrap();
        assert_eq!(snapshot.current_streak_length, 0);
        assert_eq!(snapshot.total_reward_points, 0);
        assert!(store.snapshot("bad id").is_err());
    }
}
