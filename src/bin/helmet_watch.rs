//! helmet_watch - live helmet monitoring over a frame source

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use helmet_watch::ingest::open_source;
use helmet_watch::{run_stream, HelmetConfig, SafetyMonitor, StreamControl};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Frame source: `stub://name` or a directory of images.
    #[arg(long, env = "HELMET_SOURCE", default_value = "stub://demo")]
    source: String,
    /// Session id for the wear timer and streak.
    #[arg(long, default_value = "demo")]
    session: String,
    /// Write annotated JPEG frames here.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Stop after this many frames (0 = until the source ends or Ctrl-C).
    #[arg(long, default_value_t = 0)]
    max_frames: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = HelmetConfig::load()?;
    let monitor = SafetyMonitor::from_config(&cfg);
    let source = open_source(&args.source)?;

    if let Some(out) = args.out.as_ref() {
        std::fs::create_dir_all(out)
            .with_context(|| format!("failed to create {}", out.display()))?;
    }

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = running.clone();
    ctrlc::set_handler(move || {
        handler_flag.store(false, Ordering::SeqCst);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    let mut write_error = None;
    let stats = run_stream(&monitor, source, &args.session, |frame| {
        let report = &frame.report;
        log::info!(
            "frame {}: helmet={} conf={:.2} boxes={} timer={} streak={}",
            frame.index,
            report.verdict.helmet_present,
            report.verdict.confidence,
            report.verdict.boxes.len(),
            report.timer_display,
            report.streak.current_streak_length
        );

        if let Some(out) = args.out.as_ref() {
            let path = out.join(format!("frame_{:06}.jpg", frame.index));
            if let Err(e) = std::fs::write(&path, &frame.jpeg) {
                write_error = Some(anyhow!("failed to write {}: {}", path.display(), e));
                return StreamControl::Stop;
            }
        }

        let limit_hit = args.max_frames > 0 && frame.index + 1 >= args.max_frames;
        if limit_hit || !running.load(Ordering::SeqCst) {
            StreamControl::Stop
        } else {
            StreamControl::Continue
        }
    })?;

    if let Some(e) = write_error {
        return Err(e);
    }
    println!("{}", serde_json::to_string(&stats)?);
    Ok(())
}
