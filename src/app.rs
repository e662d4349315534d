//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - reads the configuration and market CSVs (or generates a synthetic market)
//! - runs the pipeline
//! - prints reports and writes optional exports

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::Parser;
use log::{info, warn};

use crate::cli::{Cli, Command, CurvesArgs, DemoArgs, RiskArgs, RunArgs};
use crate::data::{SyntheticMarket, generate_market};
use crate::domain::{ModelConfig, Region};
use crate::error::{AppError, CmaError};
use crate::io::{
    Ingested, RateUnit, RunBundle, load_bonds, load_config, load_returns, load_spreads, load_term_structure,
    write_bundle_json, write_summary_csv,
};
use crate::report;

pub mod pipeline;

use pipeline::{MarketData, RunOutput};

/// Entry point for the `cma` binary.
pub fn run() -> Result<(), AppError> {
    // A missing .env is normal.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Risk(args) => handle_risk(args),
        Command::Curves(args) => handle_curves(args),
        Command::Demo(args) => handle_demo(args),
    }
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let config = load_config(&args.config)?;
    let market = load_market(&args.data_dir, args.rate_unit)?;

    let output = pipeline::run_all(&config, market)?;
    print_run(&config, &output);
    write_exports(&config, &output, args.export.as_deref(), args.export_json.as_deref())?;
    Ok(())
}

fn handle_risk(args: RiskArgs) -> Result<(), AppError> {
    let config = load_config(&args.config)?;
    let returns = logged("returns", load_returns(&args.returns, args.rate_unit)?);

    let stage = pipeline::run_risk(&config, returns)?;
    println!("{}", report::format_run_header(&config));
    println!("{}", report::format_backfill(&stage.backfill));
    if let Some(est) = &stage.estimate {
        println!("{}", report::format_risk(est, &stage.betas));
        println!("{}", report::format_correlation(est));
    }
    print!("{}", report::format_failures(&stage.failures));
    Ok(())
}

fn handle_curves(args: CurvesArgs) -> Result<(), AppError> {
    let config = load_config(&args.config)?;
    let term_structure = logged("term structure", load_term_structure(&args.term_structure, args.rate_unit)?);

    let curves = pipeline::run_curves(&config, &term_structure);
    println!("{}", report::format_run_header(&config));
    print!("{}", report::format_curves(&curves));

    match curves.get(&Region::Domestic) {
        Some(Err(e)) => Err(e.context("Domestic curve").into()),
        _ => Ok(()),
    }
}

fn handle_demo(args: DemoArgs) -> Result<(), AppError> {
    let SyntheticMarket { config, market } = generate_market(args.seed, args.months)?;
    info!(
        "Synthetic market: seed={} months={} assets={}",
        args.seed,
        args.months,
        config.assets.len()
    );

    let output = pipeline::run_all(&config, market)?;
    print_run(&config, &output);
    write_exports(&config, &output, args.export.as_deref(), args.export_json.as_deref())?;
    Ok(())
}

/// Read the four market files from `dir`. `spreads.csv` may be absent when no
/// asset uses a historical spread target.
fn load_market(dir: &Path, unit: RateUnit) -> Result<MarketData, CmaError> {
    let file = |name: &str| -> PathBuf { dir.join(name) };

    let returns = logged("returns", load_returns(&file("returns.csv"), unit)?);
    let spreads_path = file("spreads.csv");
    let spreads = if spreads_path.exists() {
        logged("spreads", load_spreads(&spreads_path, unit)?)
    } else {
        info!("No spreads.csv in {}; historical spread targets will fail.", dir.display());
        BTreeMap::new()
    };
    let bonds = logged("bonds", load_bonds(&file("bonds.csv"), unit)?);
    let term_structure = logged("term structure", load_term_structure(&file("term_structure.csv"), unit)?);

    Ok(MarketData {
        returns,
        spreads,
        bonds,
        term_structure,
    })
}

/// Log row-level ingest problems and unwrap the data.
fn logged<T>(what: &str, ingested: Ingested<T>) -> T {
    info!(
        "Loaded {what}: {} rows ({} rejected)",
        ingested.rows_read,
        ingested.row_errors.len()
    );
    for e in &ingested.row_errors {
        match &e.id {
            Some(id) => warn!("{what} line {} ({id}): {}", e.line, e.message),
            None => warn!("{what} line {}: {}", e.line, e.message),
        }
    }
    ingested.data
}

fn print_run(config: &ModelConfig, output: &RunOutput) {
    println!("{}", report::format_run_header(config));
    println!("{}", report::format_backfill(&output.risk.backfill));
    if let Some(est) = &output.risk.estimate {
        println!("{}", report::format_risk(est, &output.risk.betas));
        println!("{}", report::format_correlation(est));
    }
    print!("{}", report::format_curves(&output.curves));
    println!("{}", report::format_bonds(&output.bonds.projections));
    println!("{}", report::format_summary(&output.summary));
    print!("{}", report::format_failures(&output.failures));
}

fn write_exports(
    config: &ModelConfig,
    output: &RunOutput,
    csv_path: Option<&Path>,
    json_path: Option<&Path>,
) -> Result<(), CmaError> {
    if let Some(path) = csv_path {
        write_summary_csv(path, &output.summary)?;
        info!("Wrote summary CSV to {}", path.display());
    }
    if let Some(path) = json_path {
        let bundle = RunBundle::new(
            config.as_of,
            &output.summary,
            &output.bonds.projections,
            &output.curves,
            &output.failures,
        );
        write_bundle_json(path, &bundle)?;
        info!("Wrote run bundle to {}", path.display());
    }
    Ok(())
}
