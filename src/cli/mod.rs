//! Command-line parsing for the capital market assumptions engine.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! engines. Paths can default from the environment (`CMA_CONFIG`,
//! `CMA_DATA_DIR`), which `app::run` loads from a `.env` file first.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::io::RateUnit;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "cma", version, about = "Capital Market Assumptions: risk and bond return projections")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Full run: backfill, risk model, curves and bond projections.
    Run(RunArgs),
    /// Backfill and risk model only.
    Risk(RiskArgs),
    /// Regional curve calibration and projection only.
    Curves(CurvesArgs),
    /// Run the full pipeline on a seeded synthetic market.
    Demo(DemoArgs),
}

/// Options for a full run from files.
#[derive(Debug, Parser, Clone)]
pub struct RunArgs {
    /// Analyst configuration JSON.
    #[arg(long, env = "CMA_CONFIG", value_name = "JSON")]
    pub config: PathBuf,

    /// Directory holding returns.csv, spreads.csv, bonds.csv and term_structure.csv.
    #[arg(long, env = "CMA_DATA_DIR", value_name = "DIR")]
    pub data_dir: PathBuf,

    /// Unit of rate columns in the CSV inputs.
    #[arg(long, value_enum, default_value_t = RateUnit::Percent)]
    pub rate_unit: RateUnit,

    /// Export the per-asset summary to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export paths, curves and failures to JSON.
    #[arg(long = "export-json")]
    pub export_json: Option<PathBuf>,
}

/// Options for the risk-only command.
#[derive(Debug, Parser, Clone)]
pub struct RiskArgs {
    #[arg(long, env = "CMA_CONFIG", value_name = "JSON")]
    pub config: PathBuf,

    /// Wide monthly returns CSV.
    #[arg(long, value_name = "CSV")]
    pub returns: PathBuf,

    #[arg(long, value_enum, default_value_t = RateUnit::Percent)]
    pub rate_unit: RateUnit,
}

/// Options for the curves-only command.
#[derive(Debug, Parser, Clone)]
pub struct CurvesArgs {
    #[arg(long, env = "CMA_CONFIG", value_name = "JSON")]
    pub config: PathBuf,

    /// `region,label,duration,yield` CSV.
    #[arg(long = "term-structure", value_name = "CSV")]
    pub term_structure: PathBuf,

    #[arg(long, value_enum, default_value_t = RateUnit::Percent)]
    pub rate_unit: RateUnit,
}

/// Options for the synthetic demo.
#[derive(Debug, Parser, Clone)]
pub struct DemoArgs {
    /// Random seed for the synthetic market.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Months of synthetic history.
    #[arg(long, default_value_t = 300)]
    pub months: usize,

    /// Export the per-asset summary to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export paths, curves and failures to JSON.
    #[arg(long = "export-json")]
    pub export_json: Option<PathBuf>,
}
