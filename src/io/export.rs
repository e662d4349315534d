//! Export the per-asset summary table to CSV.
//!
//! Rates are written as decimals, one row per configured asset. Values that do
//! not apply to an asset (no beta reference, not a bond) are left empty.

use std::fs::File;
use std::path::Path;

use crate::domain::AssetSummary;
use crate::error::CmaError;

const HEADER: [&str; 8] = [
    "asset",
    "annual_volatility",
    "beta",
    "beta_reference",
    "region",
    "expected_return",
    "average_income",
    "inflation_adjusted_return",
];

/// Write the summary table to `path`.
pub fn write_summary_csv(path: &Path, rows: &[AssetSummary]) -> Result<(), CmaError> {
    let file = File::create(path)
        .map_err(|e| CmaError::Io(format!("Failed to create export CSV '{}': {e}", path.display())))?;
    write_summary(file, rows)
}

/// Write the summary table to any writer.
pub fn write_summary<W: std::io::Write>(out: W, rows: &[AssetSummary]) -> Result<(), CmaError> {
    let mut writer = csv::Writer::from_writer(out);
    let io_err = |e: csv::Error| CmaError::Io(format!("Failed to write export CSV: {e}"));

    writer.write_record(HEADER).map_err(io_err)?;
    for row in rows {
        writer
            .write_record([
                row.asset.clone(),
                opt(row.annual_volatility),
                opt(row.beta),
                row.beta_reference.clone().unwrap_or_default(),
                row.region.map(|r| r.display_name().to_string()).unwrap_or_default(),
                opt(row.expected_return),
                opt(row.average_income),
                opt(row.inflation_adjusted_return),
            ])
            .map_err(io_err)?;
    }
    writer
        .flush()
        .map_err(|e| CmaError::Io(format!("Failed to flush export CSV: {e}")))
}

fn opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.8}")).unwrap_or_default()
}
