//! CSV ingest for market histories and snapshots.
//!
//! Four inputs, all read with the same conventions:
//!
//! - `returns.csv` / `spreads.csv`: wide tables, `date` then one column per asset;
//!   an empty cell is a missing period
//! - `bonds.csv`: `asset,yield,spread,duration`
//! - `term_structure.csv`: `region,label,duration,yield`
//!
//! Headers are strict (a missing required column is an error). Rows are tolerant:
//! a bad cell is reported as a `RowError` and treated as missing, the run goes on.
//! Rates are converted from the file's `RateUnit` to decimals here and nowhere else.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;

use crate::domain::{AssetId, BondSnapshot, Region, ReturnPanel, TermAnchor, TermStructurePoint};
use crate::error::CmaError;
use crate::projection::{SpreadHistory, TermStructureSnapshot};

/// Unit of the rate columns in an input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum RateUnit {
    /// `2.5` means 2.5%.
    #[default]
    Percent,
    /// `0.025` means 2.5%.
    Decimal,
}

impl RateUnit {
    pub fn to_decimal(self, v: f64) -> f64 {
        match self {
            RateUnit::Percent => v / 100.0,
            RateUnit::Decimal => v,
        }
    }
}

/// A row-level problem encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub id: Option<String>,
    pub message: String,
}

/// Parsed file content plus the rows that could not be used.
#[derive(Debug, Clone)]
pub struct Ingested<T> {
    pub data: T,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Wide table of dated values, before it becomes a panel or a spread history.
#[derive(Debug, Clone, PartialEq)]
pub struct WideTable {
    pub dates: Vec<NaiveDate>,
    pub columns: Vec<(AssetId, Vec<Option<f64>>)>,
}

impl WideTable {
    pub fn into_panel(self) -> Result<ReturnPanel, CmaError> {
        ReturnPanel::new(self.dates, self.columns)
    }

    /// Observed values per column, missing periods dropped.
    pub fn into_history(self) -> SpreadHistory {
        self.columns
            .into_iter()
            .map(|(id, values)| (id, values.into_iter().flatten().collect()))
            .collect()
    }
}

fn open(path: &Path, what: &str) -> Result<File, CmaError> {
    File::open(path).map_err(|e| CmaError::Io(format!("Failed to open {what} CSV '{}': {e}", path.display())))
}

/// Monthly return panel from a wide CSV.
pub fn load_returns(path: &Path, unit: RateUnit) -> Result<Ingested<ReturnPanel>, CmaError> {
    let table = read_wide(open(path, "returns")?, unit)?;
    let Ingested {
        data,
        row_errors,
        rows_read,
    } = table;
    Ok(Ingested {
        data: data.into_panel()?,
        row_errors,
        rows_read,
    })
}

/// Spread history per asset from a wide CSV.
pub fn load_spreads(path: &Path, unit: RateUnit) -> Result<Ingested<SpreadHistory>, CmaError> {
    let table = read_wide(open(path, "spreads")?, unit)?;
    Ok(Ingested {
        data: table.data.into_history(),
        row_errors: table.row_errors,
        rows_read: table.rows_read,
    })
}

pub fn load_bonds(path: &Path, unit: RateUnit) -> Result<Ingested<BTreeMap<AssetId, BondSnapshot>>, CmaError> {
    read_bonds(open(path, "bond snapshot")?, unit)
}

pub fn load_term_structure(path: &Path, unit: RateUnit) -> Result<Ingested<TermStructureSnapshot>, CmaError> {
    read_term_structure(open(path, "term structure")?, unit)
}

fn reader<R: std::io::Read>(input: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input)
}

fn headers<R: std::io::Read>(reader: &mut csv::Reader<R>) -> Result<StringRecord, CmaError> {
    reader
        .headers()
        .map(|h| h.clone())
        .map_err(|e| CmaError::Parse(format!("Failed to read CSV headers: {e}")))
}

/// Parse a wide `date,<asset>...` table. Rows are sorted by date; duplicate dates
/// keep the first occurrence.
pub fn read_wide<R: std::io::Read>(input: R, unit: RateUnit) -> Result<Ingested<WideTable>, CmaError> {
    let mut reader = reader(input);
    let headers = headers(&mut reader)?;
    let names: Vec<String> = headers.iter().map(normalize_header_name).collect();
    if names.first().map(String::as_str) != Some("date") {
        return Err(CmaError::Parse("First column must be `date`.".to_string()));
    }
    let assets: Vec<AssetId> = headers
        .iter()
        .skip(1)
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
        .collect();
    if assets.is_empty() {
        return Err(CmaError::Parse("Table has a `date` column but no asset columns.".to_string()));
    }

    let mut rows: Vec<(NaiveDate, usize, Vec<Option<f64>>)> = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        rows_read += 1;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    id: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        let date = match record.get(0).map(str::trim).filter(|s| !s.is_empty()).map(parse_date) {
            Some(Ok(d)) => d,
            Some(Err(message)) => {
                row_errors.push(RowError { line, id: None, message });
                continue;
            }
            None => {
                row_errors.push(RowError {
                    line,
                    id: None,
                    message: "Missing date.".to_string(),
                });
                continue;
            }
        };

        let mut values = Vec::with_capacity(assets.len());
        for (k, asset) in assets.iter().enumerate() {
            let cell = record.get(k + 1).map(str::trim).filter(|s| !s.is_empty());
            match parse_opt_rate(cell, unit) {
                Ok(v) => values.push(v),
                Err(message) => {
                    row_errors.push(RowError {
                        line,
                        id: Some(asset.clone()),
                        message,
                    });
                    values.push(None);
                }
            }
        }
        rows.push((date, line, values));
    }

    // Stable sort: among equal dates, file order is kept.
    rows.sort_by_key(|(d, _, _)| *d);
    let mut deduped: Vec<(NaiveDate, Vec<Option<f64>>)> = Vec::with_capacity(rows.len());
    for (date, line, values) in rows {
        if deduped.last().is_some_and(|(d, _)| *d == date) {
            row_errors.push(RowError {
                line,
                id: None,
                message: format!("Duplicate date {date}; later row ignored."),
            });
            continue;
        }
        deduped.push((date, values));
    }

    let dates = deduped.iter().map(|(d, _)| *d).collect();
    let columns = assets
        .into_iter()
        .enumerate()
        .map(|(k, id)| (id, deduped.iter().map(|(_, v)| v[k]).collect()))
        .collect();

    Ok(Ingested {
        data: WideTable { dates, columns },
        row_errors,
        rows_read,
    })
}

/// Parse `asset,yield,spread,duration` snapshot rows.
pub fn read_bonds<R: std::io::Read>(
    input: R,
    unit: RateUnit,
) -> Result<Ingested<BTreeMap<AssetId, BondSnapshot>>, CmaError> {
    let mut reader = reader(input);
    let header_map = build_header_map(&headers(&mut reader)?);
    ensure_columns(&header_map, &["asset", "yield", "spread", "duration"])?;

    let mut data = BTreeMap::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        rows_read += 1;
        let parsed = result
            .map_err(|e| (None, format!("CSV parse error: {e}")))
            .and_then(|record| {
                let asset = get_required(&record, &header_map, "asset").map_err(|m| (None, m))?.to_string();
                let snapshot = parse_bond_row(&record, &header_map, unit).map_err(|m| (Some(asset.clone()), m))?;
                Ok((asset, snapshot))
            });
        match parsed {
            Ok((asset, snapshot)) => {
                if data.insert(asset.clone(), snapshot).is_some() {
                    row_errors.push(RowError {
                        line,
                        id: Some(asset),
                        message: "Duplicate asset; later row wins.".to_string(),
                    });
                }
            }
            Err((id, message)) => row_errors.push(RowError { line, id, message }),
        }
    }

    Ok(Ingested {
        data,
        row_errors,
        rows_read,
    })
}

fn parse_bond_row(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
    unit: RateUnit,
) -> Result<BondSnapshot, String> {
    let yield_ = unit.to_decimal(parse_f64(get_required(record, header_map, "yield")?)?);
    let spread = unit.to_decimal(parse_f64(get_required(record, header_map, "spread")?)?);
    let duration = parse_f64(get_required(record, header_map, "duration")?)?;
    if duration < 0.0 {
        return Err(format!("Negative duration {duration}."));
    }
    Ok(BondSnapshot {
        yield_,
        spread,
        duration,
    })
}

/// Parse `region,label,duration,yield` anchor rows.
pub fn read_term_structure<R: std::io::Read>(
    input: R,
    unit: RateUnit,
) -> Result<Ingested<TermStructureSnapshot>, CmaError> {
    let mut reader = reader(input);
    let header_map = build_header_map(&headers(&mut reader)?);
    ensure_columns(&header_map, &["region", "label", "duration", "yield"])?;

    let mut data: TermStructureSnapshot = BTreeMap::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        rows_read += 1;
        let parsed = result
            .map_err(|e| format!("CSV parse error: {e}"))
            .and_then(|record| parse_anchor_row(&record, &header_map, unit));
        match parsed {
            Ok((region, anchor)) => data.entry(region).or_default().push(anchor),
            Err(message) => row_errors.push(RowError {
                line,
                id: None,
                message,
            }),
        }
    }

    Ok(Ingested {
        data,
        row_errors,
        rows_read,
    })
}

fn parse_anchor_row(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
    unit: RateUnit,
) -> Result<(Region, TermAnchor), String> {
    let tag = get_required(record, header_map, "region")?;
    let region = Region::parse_tag(tag)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("Region '{tag}' is not a term structure."))?;
    let label = get_required(record, header_map, "label")?.to_string();
    let duration = parse_f64(get_required(record, header_map, "duration")?)?;
    if duration < 0.0 {
        return Err(format!("Negative duration {duration} for '{label}'."));
    }
    let yield_ = unit.to_decimal(parse_f64(get_required(record, header_map, "yield")?)?);
    Ok((
        region,
        TermAnchor {
            label,
            point: TermStructurePoint::new(duration, yield_),
        },
    ))
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn ensure_columns(header_map: &HashMap<String, usize>, required: &[&str]) -> Result<(), CmaError> {
    for name in required {
        if !header_map.contains_key(*name) {
            return Err(CmaError::Parse(format!("Missing required column: `{name}`")));
        }
    }
    Ok(())
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<&'a str, String> {
    let idx = header_map
        .get(name)
        .ok_or_else(|| format!("Missing required column: `{name}`"))?;
    record
        .get(*idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    const FMTS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    for fmt in FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    Err(format!(
        "Invalid date '{s}'. Expected one of: YYYY-MM-DD, MM/DD/YYYY, YYYY/MM/DD, DD-MM-YYYY."
    ))
}

fn parse_f64(s: &str) -> Result<f64, String> {
    let v = s
        .trim_end_matches('%')
        .parse::<f64>()
        .map_err(|_| format!("Invalid number '{s}'."))?;
    if v.is_finite() { Ok(v) } else { Err(format!("Non-finite number '{s}'.")) }
}

fn parse_opt_rate(s: Option<&str>, unit: RateUnit) -> Result<Option<f64>, String> {
    match s {
        None => Ok(None),
        Some(t) if t.eq_ignore_ascii_case("n/a") || t.eq_ignore_ascii_case("#n/a") => Ok(None),
        Some(t) => parse_f64(t).map(|v| Some(unit.to_decimal(v))),
    }
}
