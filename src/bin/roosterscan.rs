//! roosterscan - pose-gated health analysis for rooster images
//!
//! Loads the pose and classifier models once, then analyzes each image in turn and
//! prints one JSON record per image to stdout:
//! - `{"success": true, ...report}` when analysis ran (whatever its status)
//! - `{"success": false, "error", "stage"}` when configuration, model loading or
//!   image decoding failed first

use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use roosterscan::{AnalysisImage, AnalyzerConfig, ScanError, ScanOutput, SequentialAnalyzer};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Images to analyze.
    #[arg(required = true)]
    images: Vec<PathBuf>,
    /// Pose model (ONNX file or stub://pose/<mode>).
    #[arg(long, env = "ROOSTERSCAN_POSE_MODEL")]
    pose_model: PathBuf,
    /// Injury classifier model (ONNX file or stub://classifier/<label>).
    #[arg(long, env = "ROOSTERSCAN_CLASSIFIER_MODEL")]
    classifier_model: PathBuf,
    /// Config file (TOML or JSON).
    #[arg(long, env = "ROOSTERSCAN_CONFIG")]
    config: Option<PathBuf>,
    /// Minimum overall pose confidence for the quality gate.
    #[arg(long, value_name = "CONFIDENCE")]
    pose_threshold: Option<f64>,
    /// Minimum number of visible keypoints for the quality gate.
    #[arg(long, value_name = "COUNT")]
    min_keypoints: Option<usize>,
    /// Emit single-line JSON records.
    #[arg(long)]
    compact: bool,
    /// UI mode for stderr progress.
    #[arg(long, value_enum, default_value = "auto", value_name = "MODE")]
    ui: ui::UiMode,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(false)` when any record was a failure envelope.
fn run(args: &Args) -> Result<bool> {
    let ui = ui::Ui::new(args.ui, std::io::stderr().is_terminal());

    let config = {
        let mut stage = ui.stage("Load configuration");
        let loaded = AnalyzerConfig::load_from(args.config.as_deref())
            .and_then(|cfg| cfg.with_overrides(args.pose_threshold, args.min_keypoints));
        if let Err(e) = &loaded {
            stage.fail(format!("{e:#}"));
        }
        loaded
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            emit(&ScanOutput::failure(&ScanError::Config(format!("{e:#}")), None), args.compact)?;
            return Ok(false);
        }
    };
    log::info!(
        "quality gate: pose confidence >= {:.2}, keypoints >= {}",
        config.gate.pose_confidence,
        config.gate.min_keypoints
    );

    let analyzer = {
        let mut stage = ui.stage("Load models");
        let loaded = SequentialAnalyzer::load(&args.pose_model, &args.classifier_model, &config);
        if let Err(e) = &loaded {
            stage.fail(e.to_string());
        }
        loaded
    };
    let mut analyzer = match analyzer {
        Ok(analyzer) => analyzer,
        Err(e) => {
            emit(&ScanOutput::failure(&ScanError::from(e), None), args.compact)?;
            return Ok(false);
        }
    };

    let mut all_succeeded = true;
    for path in &args.images {
        let output = {
            let mut stage = ui.stage(&format!("Analyze {}", path.display()));
            match AnalysisImage::open(path) {
                Ok(image) => {
                    let report = analyzer.analyze(&image);
                    log::info!("{}: {:?} ({:?})", path.display(), report.status(), report.mode());
                    ScanOutput::report(report, Some(path))
                }
                Err(e) => {
                    stage.fail(e.to_string());
                    ScanOutput::failure(&ScanError::from(e), Some(path))
                }
            }
        };
        all_succeeded &= output.is_success();
        emit(&output, args.compact)?;
    }
    Ok(all_succeeded)
}

fn emit(output: &ScanOutput, compact: bool) -> Result<()> {
    let json = if compact {
        serde_json::to_string(output)?
    } else {
        serde_json::to_string_pretty(output)?
    };
    println!("{json}");
    Ok(())
}
