//! Live loop over a continuous frame source.
//!
//! Each iteration blocks on the source, runs detection synchronously, ticks
//! the session, annotates, and hands the result to the sink before pulling
//! the next frame. The capture is released on every way out of the loop.

use anyhow::Result;
use serde::Serialize;

use crate::annotate;
use crate::frame::{decode_frame, Frame};
use crate::ingest::{CaptureGuard, Captured, FrameSource};
use crate::monitor::{DetectionReport, SafetyMonitor};

/// Sink reply: keep going, or disconnect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamControl {
    Continue,
    Stop,
}

/// One emitted frame.
pub struct AnnotatedFrame {
    pub index: u64,
    pub jpeg: Vec<u8>,
    pub report: DetectionReport,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEnd {
    #[default]
    SourceExhausted,
    ConsumerStopped,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StreamStats {
    pub frames_emitted: u64,
    pub frames_invalid: u64,
    pub helmet_frames: u64,
    pub ended_by: StreamEnd,
}

/// Drive `source` until it is exhausted or `sink` returns
/// [`StreamControl::Stop`]. Capture errors end the loop with an error.
///
/// The session timer starts from zero on every connection; streaks and
/// history carry over.
pub fn run_stream<F>(
    monitor: &SafetyMonitor,
    source: Box<dyn FrameSource>,
    session_id: &str,
    mut sink: F,
) -> Result<StreamStats>
where
    F: FnMut(AnnotatedFrame) -> StreamControl,
{
    crate::validate_identifier(session_id)?;
    let mut capture = CaptureGuard::acquire(source)?;
    monitor.reset_timer(session_id)?;
    let mut stats = StreamStats::default();

    while let Some(captured) = capture.next_frame()? {
        let frame = match into_frame(captured) {
            Some(frame) => frame,
            None => {
                stats.frames_invalid += 1;
                continue;
            }
        };

        let report = monitor.observe(session_id, &frame)?;
        if report.verdict.helmet_present {
            stats.helmet_frames += 1;
        }
        let jpeg = annotate::render(frame.image(), &report.verdict, &report.timer_display)?;

        let emitted = AnnotatedFrame {
            index: stats.frames_emitted,
            jpeg,
            report,
        };
        stats.frames_emitted += 1;
        if sink(emitted) == StreamControl::Stop {
            log::info!("consumer disconnected after {} frame(s)", stats.frames_emitted);
            stats.ended_by = StreamEnd::ConsumerStopped;
            break;
        }
    }
    Ok(stats)
}

fn into_frame(captured: Captured) -> Option<Frame> {
    match captured {
        Captured::Decoded(frame) => Some(frame),
        Captured::Encoded(bytes) => match decode_frame(&bytes) {
            Ok(frame) => Some(frame),
            Err(e) => {
                log::debug!("skipping frame: {}", e);
                None
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{ClassTable, FrameVerdict};
    use crate::history::DetectionHistory;
    use crate::ingest::{SyntheticConfig, SyntheticSource};
    use crate::pipeline::{Attempt, HelmetDetector};
    use crate::streak::StreakStore;
    use crate::timer::TimerRegistry;

    fn monitor() -> SafetyMonitor {
        SafetyMonitor::new(
            HelmetDetector::new(ClassTable::default_helmet(), Attempt::adaptive_defaults()),
            StreakStore::default(),
            TimerRegistry::new(2.0),
            DetectionHistory::new(30, 100),
        )
    }

    fn source(frames: u64) -> Box<dyn FrameSource> {
        Box::new(SyntheticSource::new(SyntheticConfig {
            width: 96,
            height: 72,
            max_frames: Some(frames),
            ..SyntheticConfig::default()
        }))
    }

    #[test]
    fn runs_until_source_is_exhausted() {
        let mut indices = Vec::new();
        let stats = run_stream(&monitor(), source(3), "cam-1", |frame| {
            indices.push(frame.index);
            assert!(!frame.jpeg.is_empty());
            assert!(!frame.report.verdict.helmet_present);
            StreamControl::Continue
        })
        .unwrap();

        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(stats.frames_emitted, 3);
        assert_eq!(stats.ended_by, StreamEnd::SourceExhausted);
    }

    #[test]
    fn consumer_stop_ends_the_loop() {
        let stats = run_stream(&monitor(), source(100), "cam-1", |frame| {
            if frame.index == 1 {
                StreamControl::Stop
            } else {
                StreamControl::Continue
            }
        })
        .unwrap();
        assert_eq!(stats.frames_emitted, 2);
        assert_eq!(stats.ended_by, StreamEnd::ConsumerStopped);
    }

    #[test]
    fn new_connection_starts_timer_from_zero() {
        let monitor = monitor();
        let worn = FrameVerdict {
            helmet_present: true,
            confidence: 0.9,
            ..FrameVerdict::empty()
        };
        monitor.tick("cam-1", &worn, 10.0).unwrap();
        monitor.tick("cam-1", &worn, 11.5).unwrap();
        assert_eq!(monitor.timer("cam-1").unwrap().accumulated_seconds, 1.5);

        let mut displays = Vec::new();
        run_stream(&monitor, source(2), "cam-1", |frame| {
            assert_eq!(frame.report.timer.accumulated_seconds, 0.0);
            displays.push(frame.report.timer_display.clone());
            StreamControl::Continue
        })
        .unwrap();

        assert_eq!(displays, vec!["00:00", "00:00"]);
        assert_eq!(monitor.timer("cam-1").unwrap().accumulated_seconds, 0.0);
    }
}
