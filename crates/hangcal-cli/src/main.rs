//! Hangcal CLI - anchor calibration from motor rotation samples
//!
//! Reads motor samples (and optionally the known positions of the first
//! samples) as flat number lists, runs the calibrator and prints a
//! firmware configuration line.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hangcal_core::{CalibrationConfig, CalibrationProblem, Calibrator, DataSufficiency, Strategy};

mod report;

#[derive(Parser, Debug)]
#[command(name = "hangcal")]
#[command(
    about = "Figure out where Hangprinter anchors are by looking at line difference samples",
    long_about = None
)]
struct Cli {
    /// Print debug information and solve even when data is insufficient
    #[arg(short, long)]
    debug: bool,

    /// Use this flag if your C anchor should have a positive X-coordinate
    #[arg(short, long, alias = "cx_is_positive")]
    cx_is_positive: bool,

    /// Method: quasi-newton (0), direction-set (1), random-restart (2),
    /// evolution (3), scatter-search (4) or all (5)
    #[arg(short, long, default_value = "1")]
    method: Strategy,

    /// XYZ positions of the first samples, as numbers separated by spaces
    #[arg(short = 'x', long, alias = "xyz_of_samp", num_args = 1.., allow_negative_numbers = true)]
    xyz_of_samp: Vec<f64>,

    /// Motor sample data, four numbers per sample separated by spaces
    #[arg(
        short,
        long,
        alias = "sample_data",
        num_args = 1..,
        allow_negative_numbers = true,
        required = true
    )]
    sample_data: Vec<f64>,

    /// JSON file with calibration settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for the random streams
    #[arg(long)]
    seed: Option<u64>,
}

fn load_config(path: Option<&Path>) -> Result<CalibrationConfig> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {:?}", path))?;
            serde_json::from_str(&text).with_context(|| format!("Failed to parse config file {:?}", path))
        }
        None => Ok(CalibrationConfig::default()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .init();

    let mut config = load_config(cli.config.as_deref())?;
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    if cli.debug {
        config.data.allow_insufficient = true;
    }

    let problem = CalibrationProblem::from_flat(&cli.sample_data, &cli.xyz_of_samp, config.hardware.clone())
        .context("Invalid input data")?;

    let calibrator = Calibrator::new(config);
    let sufficiency = problem.sufficiency(&calibrator.config().data);

    let start = Instant::now();
    let candidate = calibrator
        .calibrate(&problem, cli.method, cli.cx_is_positive)
        .context("Calibration failed")?;
    info!(
        method = candidate.name(),
        seconds = start.elapsed().as_secs_f64(),
        "calibration finished"
    );

    println!();
    println!("{}", report::firmware_line(candidate.anchors(), candidate.spool()));
    println!("{}", report::summary(&candidate));

    if cli.debug {
        println!("{}", report::positions(candidate.positions(), problem.num_fixed()));
    }

    match sufficiency {
        DataSufficiency::Marginal => {
            println!("Warning: data is marginal, expect unreliable anchors unless the samples are very accurate")
        }
        DataSufficiency::Insufficient => {
            println!("Warning: data is insufficient, the result is not trustworthy")
        }
        DataSufficiency::Sufficient => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hangcal_core::Method;

    #[test]
    fn test_parse_negative_sample_lists() {
        let cli = Cli::try_parse_from([
            "hangcal", "-m", "3", "-c", "-s", "0", "0", "0", "0", "-10.5", "12", "-3", "4",
        ])
        .unwrap();

        assert_eq!(cli.method, Strategy::Single(Method::Evolution));
        assert!(cli.cx_is_positive);
        assert_eq!(cli.sample_data.len(), 8);
        assert_eq!(cli.sample_data[4], -10.5);
        assert!(cli.xyz_of_samp.is_empty());
    }

    #[test]
    fn test_default_method_is_direction_set() {
        let cli = Cli::try_parse_from(["hangcal", "-s", "0", "0", "0", "0"]).unwrap();
        assert_eq!(cli.method, Strategy::Single(Method::DirectionSet));
    }

    #[test]
    fn test_unknown_method_is_rejected() {
        assert!(Cli::try_parse_from(["hangcal", "-m", "nelder-mead", "-s", "0", "0", "0", "0"]).is_err());
    }

    #[test]
    fn test_underscore_flag_aliases() {
        let cli = Cli::try_parse_from([
            "hangcal", "--cx_is_positive", "--sample_data", "0", "0", "0", "0", "--xyz_of_samp", "0", "0", "-5",
        ])
        .unwrap();

        assert!(cli.cx_is_positive);
        assert_eq!(cli.sample_data, vec![0.0; 4]);
        assert_eq!(cli.xyz_of_samp, vec![0.0, 0.0, -5.0]);
    }

    #[test]
    fn test_missing_config_file() {
        assert!(load_config(Some(Path::new("/nonexistent/hangcal.json"))).is_err());
        assert!(load_config(None).is_ok());
    }
}
