//! helmet_detect - run detection over image files and print JSON reports

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use std::path::PathBuf;

use helmet_watch::{HelmetConfig, SafetyMonitor};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Image files (JPEG or PNG).
    #[arg(required = true)]
    images: Vec<PathBuf>,
    /// Subject the detections are credited to.
    #[arg(long, default_value = "local")]
    subject: String,
    /// Model file; overrides HELMET_MODEL_PATH and the config file.
    #[arg(long)]
    model: Option<PathBuf>,
    /// Run the adaptive attempt cascade.
    #[arg(long)]
    adaptive: bool,
    /// Pretty-print JSON.
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = HelmetConfig::load()?;
    if args.model.is_some() {
        cfg.model_path = args.model.clone();
    }
    cfg.adaptive |= args.adaptive;

    let monitor = SafetyMonitor::from_config(&cfg);
    for path in &args.images {
        let bytes =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let report = monitor.process(&args.subject, &bytes, Local::now())?;
        let json = if args.pretty {
            serde_json::to_string_pretty(&report)?
        } else {
            serde_json::to_string(&report)?
        };
        println!("{}", json);
    }
    Ok(())
}
