use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::pipeline::Attempt;
use crate::streak::Milestone;

const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_SCORE_THRESHOLD: f32 = 0.25;
const DEFAULT_NMS_THRESHOLD: f32 = 0.45;
const DEFAULT_CLASS_NAMES: [&str; 2] = ["with helmet", "without helmet"];
const DEFAULT_HELMET_LABELS: [&str; 2] = ["helmet", "with helmet"];
const DEFAULT_NO_HELMET_LABELS: [&str; 4] = ["no_helmet", "no helmet", "no-helmet", "without helmet"];
const DEFAULT_MAX_GAP_SECS: f64 = 2.0;
const DEFAULT_HISTORY_WINDOW_DAYS: u32 = 30;
const DEFAULT_HISTORY_CAPACITY: usize = 10_000;

#[derive(Debug, Deserialize, Default)]
struct HelmetConfigFile {
    model: Option<ModelConfigFile>,
    cascade: Option<CascadeConfigFile>,
    preprocess: Option<PreprocessConfigFile>,
    streak: Option<StreakConfigFile>,
    timer: Option<TimerConfigFile>,
    history: Option<HistoryConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    path: Option<PathBuf>,
    input_size: Option<u32>,
    score_threshold: Option<f32>,
    nms_threshold: Option<f32>,
    class_names: Option<Vec<String>>,
    helmet_labels: Option<Vec<String>>,
    no_helmet_labels: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct CascadeConfigFile {
    adaptive: Option<bool>,
    attempts: Option<Vec<Attempt>>,
}

#[derive(Debug, Deserialize, Default)]
struct PreprocessConfigFile {
    equalize_contrast: Option<bool>,
    fallback_localizer: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct StreakConfigFile {
    milestones: Option<Vec<Milestone>>,
}

#[derive(Debug, Deserialize, Default)]
struct TimerConfigFile {
    max_gap_secs: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct HistoryConfigFile {
    window_days: Option<u32>,
    capacity: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct HelmetConfig {
    pub model_path: Option<PathBuf>,
    pub input_size: u32,
    pub score_threshold: f32,
    pub nms_threshold: f32,
    pub class_names: Vec<String>,
    pub helmet_labels: Vec<String>,
    pub no_helmet_labels: Vec<String>,
    pub adaptive: bool,
    pub attempts: Vec<Attempt>,
    pub equalize_contrast: bool,
    pub fallback_localizer: bool,
    pub milestones: Vec<Milestone>,
    pub max_gap_secs: f64,
    pub history_window_days: u32,
    pub history_capacity: usize,
}

impl Default for HelmetConfig {
    fn default() -> Self {
        Self::from_file(HelmetConfigFile::default())
    }
}

impl HelmetConfig {
    /// File named by `HELMET_CONFIG` (optional), then `HELMET_*` overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("HELMET_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Attempts the detector runs, in order.
    ///
    /// Non-adaptive configs run one pass with the base thresholds.
    pub fn attempt_plan(&self) -> Vec<Attempt> {
        if self.adaptive {
            self.attempts.clone()
        } else {
            vec![Attempt {
                score_threshold: self.score_threshold,
                nms_threshold: self.nms_threshold,
                input_side: self.input_size,
            }]
        }
    }

    fn from_file(file: HelmetConfigFile) -> Self {
        let model = file.model.unwrap_or_default();
        let cascade = file.cascade.unwrap_or_default();
        let preprocess = file.preprocess.unwrap_or_default();
        let history = file.history.unwrap_or_default();

        Self {
            model_path: model.path,
            input_size: model.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
            score_threshold: model.score_threshold.unwrap_or(DEFAULT_SCORE_THRESHOLD),
            nms_threshold: model.nms_threshold.unwrap_or(DEFAULT_NMS_THRESHOLD),
            class_names: model
                .class_names
                .unwrap_or_else(|| strings(&DEFAULT_CLASS_NAMES)),
            helmet_labels: model
                .helmet_labels
                .unwrap_or_else(|| strings(&DEFAULT_HELMET_LABELS)),
            no_helmet_labels: model
                .no_helmet_labels
                .unwrap_or_else(|| strings(&DEFAULT_NO_HELMET_LABELS)),
            adaptive: cascade.adaptive.unwrap_or(false),
            attempts: cascade.attempts.unwrap_or_else(Attempt::adaptive_defaults),
            equalize_contrast: preprocess.equalize_contrast.unwrap_or(false),
            fallback_localizer: preprocess.fallback_localizer.unwrap_or(true),
            milestones: file
                .streak
                .and_then(|streak| streak.milestones)
                .unwrap_or_else(Milestone::defaults),
            max_gap_secs: file
                .timer
                .and_then(|timer| timer.max_gap_secs)
                .unwrap_or(DEFAULT_MAX_GAP_SECS),
            history_window_days: history.window_days.unwrap_or(DEFAULT_HISTORY_WINDOW_DAYS),
            history_capacity: history.capacity.unwrap_or(DEFAULT_HISTORY_CAPACITY),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("HELMET_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.model_path = Some(PathBuf::from(path));
            }
        }
        if let Some(size) = parse_env("HELMET_INPUT_SIZE")? {
            self.input_size = size;
        }
        if let Some(threshold) = parse_env("HELMET_SCORE_THRESHOLD")? {
            self.score_threshold = threshold;
        }
        if let Some(threshold) = parse_env("HELMET_NMS_THRESHOLD")? {
            self.nms_threshold = threshold;
        }
        if let Ok(names) = std::env::var("HELMET_CLASS_NAMES") {
            let parsed = split_csv(&names);
            if !parsed.is_empty() {
                self.class_names = parsed;
            }
        }
        if let Some(adaptive) = parse_bool_env("HELMET_ADAPTIVE")? {
            self.adaptive = adaptive;
        }
        if let Ok(milestones) = std::env::var("HELMET_MILESTONES") {
            if !milestones.trim().is_empty() {
                self.milestones = parse_milestones(&milestones)?;
            }
        }
        if let Some(gap) = parse_env("HELMET_MAX_GAP_SECS")? {
            self.max_gap_secs = gap;
        }
        if let Some(equalize) = parse_bool_env("HELMET_EQUALIZE_CONTRAST")? {
            self.equalize_contrast = equalize;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        check_unit("score_threshold", self.score_threshold)?;
        check_unit("nms_threshold", self.nms_threshold)?;
        if self.input_size == 0 {
            return Err(anyhow!("input_size must be greater than zero"));
        }

        self.class_names = self
            .class_names
            .iter()
            .map(|name| name.trim().to_string())
            .collect();
        if self.class_names.is_empty() || self.class_names.iter().any(|n| n.is_empty()) {
            return Err(anyhow!("class_names must list at least one non-empty name"));
        }

        if self.attempts.is_empty() {
            return Err(anyhow!("cascade.attempts must contain at least one attempt"));
        }
        for (index, attempt) in self.attempts.iter().enumerate() {
            check_unit(&format!("attempts[{}].score_threshold", index), attempt.score_threshold)?;
            check_unit(&format!("attempts[{}].nms_threshold", index), attempt.nms_threshold)?;
            if attempt.input_side == 0 {
                return Err(anyhow!("attempts[{}].input_side must be greater than zero", index));
            }
        }

        for (index, milestone) in self.milestones.iter().enumerate() {
            if milestone.length == 0 {
                return Err(anyhow!("milestone lengths must be greater than zero"));
            }
            if self.milestones[..index]
                .iter()
                .any(|m| m.length == milestone.length)
            {
                return Err(anyhow!("duplicate milestone length {}", milestone.length));
            }
        }

        if !self.max_gap_secs.is_finite() || self.max_gap_secs <= 0.0 {
            return Err(anyhow!("max_gap_secs must be a positive number of seconds"));
        }
        if self.history_capacity == 0 {
            return Err(anyhow!("history capacity must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<HelmetConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn parse_env<T: FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} has an invalid value {:?}", key, value)),
        _ => Ok(None),
    }
}

fn parse_bool_env(key: &str) -> Result<Option<bool>> {
    let Ok(value) = std::env::var(key) else {
        return Ok(None);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "" => Ok(None),
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(anyhow!("{} must be true/false/1/0, got {:?}", key, value)),
    }
}

/// `"3:10,7:25,30:100"` -> length:points pairs.
fn parse_milestones(value: &str) -> Result<Vec<Milestone>> {
    split_csv(value)
        .iter()
        .map(|entry| {
            let (length, points) = entry
                .split_once(':')
                .ok_or_else(|| anyhow!("milestone {:?} must look like length:points", entry))?;
            Ok(Milestone {
                length: length
                    .trim()
                    .parse()
                    .map_err(|_| anyhow!("invalid milestone length in {:?}", entry))?,
                points: points
                    .trim()
                    .parse()
                    .map_err(|_| anyhow!("invalid milestone points in {:?}", entry))?,
            })
        })
        .collect()
}

fn check_unit(name: &str, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(anyhow!("{} must be within [0, 1], got {}", name, value));
    }
    Ok(())
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
