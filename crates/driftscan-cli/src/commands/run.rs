use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use driftscan_core::consts::{DEFAULT_DEM, DEFAULT_TERRAIN_PIXEL_SPACING};
use driftscan_core::error::DriftscanError;
use driftscan_core::pipeline::config::{
    CoregistrationConfig, OrbitConfig, PipelineConfig, SubsetConfig, TerrainConfig,
};
use driftscan_core::pipeline::types::{PipelineObserver, StageKind};
use driftscan_core::pipeline::StageOrchestrator;

use super::track::TrackingOpts;
use crate::summary;

#[derive(Args)]
pub struct RunArgs {
    /// Master (earlier) scene product
    pub master: PathBuf,

    /// Slave (later) scene product
    pub slave: PathBuf,

    /// Output directory for stage artifacts
    #[arg(short, long, default_value = "driftscan-out")]
    pub output: PathBuf,

    /// Region of interest as a WKT POLYGON
    #[arg(long)]
    pub region: Option<String>,

    /// Pipeline config file (TOML); overrides the other flags
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Identifier prefixed to artifact names
    #[arg(long, default_value = "run")]
    pub run_id: String,

    /// DEM identifier for coregistration and terrain correction
    #[arg(long, default_value = DEFAULT_DEM)]
    pub dem: String,

    /// Disable the coregistration cross-correlation refinement
    #[arg(long)]
    pub no_xcorr: bool,

    /// Skip the orbit-file refinement
    #[arg(long)]
    pub no_orbit: bool,

    /// Orthorectified output pixel spacing in meters
    #[arg(long, default_value_t = DEFAULT_TERRAIN_PIXEL_SPACING)]
    pub pixel_spacing: f64,

    #[command(flatten)]
    pub tracking: TrackingOpts,
}

/// Drives the progress bar from pipeline events.
struct BarObserver {
    bar: ProgressBar,
}

impl PipelineObserver for BarObserver {
    fn stage_started(&self, stage: StageKind) {
        self.bar.set_message(stage.to_string());
    }

    fn stage_succeeded(&self, stage: StageKind, _artifact: &str) {
        let done = StageKind::ALL.iter().position(|s| *s == stage).unwrap_or(0) + 1;
        self.bar.set_position(done as u64);
    }
}

pub fn run(args: &RunArgs) -> Result<()> {
    let config = if let Some(ref config_path) = args.config {
        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config {}", config_path.display()))?;
        toml::from_str(&contents).context("Invalid pipeline config")?
    } else {
        build_config_from_args(args)?
    };

    summary::print_run_summary(&config);

    let bar = ProgressBar::new(StageKind::ALL.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{msg:20} [{bar:40}] {pos}/{len}")?
            .progress_chars("=> "),
    );
    let observer = Arc::new(BarObserver { bar: bar.clone() });

    let mut orchestrator = StageOrchestrator::new(config)?.with_observer(observer);
    match orchestrator.run() {
        Ok(outcome) => {
            bar.finish_with_message("Done");
            println!();
            for (stage, path) in &outcome.artifacts {
                println!("  {:<10} {}", stage.id(), path.display());
            }
            println!(
                "\nVelocity map saved to {}",
                outcome.final_product.display()
            );
            Ok(())
        }
        Err(err) => {
            bar.abandon();
            if let DriftscanError::Stage { stage, .. } = &err {
                let code = stage_exit_code(*stage);
                eprintln!("{} {}", style("error:").red().bold(), err);
                std::process::exit(code);
            }
            Err(err.into())
        }
    }
}

/// Exit codes identify the failing stage for scripting callers.
fn stage_exit_code(stage: StageKind) -> i32 {
    match stage {
        StageKind::OrbitCorrect => 10,
        StageKind::Coregister => 11,
        StageKind::Subset => 12,
        StageKind::OffsetTrack => 13,
        StageKind::TerrainCorrect => 14,
    }
}

fn build_config_from_args(args: &RunArgs) -> Result<PipelineConfig> {
    let region = args
        .region
        .clone()
        .context("--region is required unless --config is given")?;

    Ok(PipelineConfig {
        master: args.master.clone(),
        slave: args.slave.clone(),
        output_dir: args.output.clone(),
        run_id: args.run_id.clone(),
        region,
        orbit: OrbitConfig {
            apply: !args.no_orbit,
            ..Default::default()
        },
        coregistration: CoregistrationConfig {
            dem: args.dem.clone(),
            xcorr: !args.no_xcorr,
            ..Default::default()
        },
        subset: SubsetConfig::default(),
        tracking: args.tracking.to_config(),
        terrain: TerrainConfig {
            dem: args.dem.clone(),
            pixel_spacing_m: args.pixel_spacing,
        },
    })
}
