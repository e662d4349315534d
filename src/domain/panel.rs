//! Monthly return series and the aligned panel the engines consume.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::domain::AssetId;
use crate::error::CmaError;

/// Return series for many assets, aligned on one chronological date axis.
///
/// Each column has one slot per axis date; `None` marks a missing period.
/// Column order is the insertion order and drives the order of every matrix
/// the risk model produces.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnPanel {
    dates: Vec<NaiveDate>,
    assets: Vec<AssetId>,
    columns: Vec<Vec<Option<f64>>>,
    index: HashMap<AssetId, usize>,
}

impl ReturnPanel {
    /// Build a panel from pre-aligned columns.
    pub fn new(dates: Vec<NaiveDate>, columns: Vec<(AssetId, Vec<Option<f64>>)>) -> Result<Self, CmaError> {
        for pair in dates.windows(2) {
            if pair[1] <= pair[0] {
                return Err(CmaError::Parse(format!(
                    "Panel dates must be strictly increasing ({} then {}).",
                    pair[0], pair[1]
                )));
            }
        }

        let mut assets = Vec::with_capacity(columns.len());
        let mut values = Vec::with_capacity(columns.len());
        let mut index = HashMap::with_capacity(columns.len());
        for (id, column) in columns {
            if column.len() != dates.len() {
                return Err(CmaError::Parse(format!(
                    "Column '{id}' has {} values for {} dates.",
                    column.len(),
                    dates.len()
                )));
            }
            if column.iter().flatten().any(|v| !v.is_finite()) {
                return Err(CmaError::Parse(format!("Column '{id}' contains non-finite values.")));
            }
            if index.insert(id.clone(), assets.len()).is_some() {
                return Err(CmaError::Parse(format!("Duplicate column '{id}'.")));
            }
            assets.push(id);
            values.push(column);
        }

        Ok(Self {
            dates,
            assets,
            columns: values,
            index,
        })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn assets(&self) -> &[AssetId] {
        &self.assets
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn contains(&self, asset: &str) -> bool {
        self.index.contains_key(asset)
    }

    pub fn column(&self, asset: &str) -> Option<&[Option<f64>]> {
        self.index.get(asset).map(|&i| self.columns[i].as_slice())
    }

    pub(crate) fn column_mut(&mut self, asset: &str) -> Option<&mut Vec<Option<f64>>> {
        let i = *self.index.get(asset)?;
        Some(&mut self.columns[i])
    }

    /// Number of missing periods for an asset (0 for unknown assets).
    pub fn missing_count(&self, asset: &str) -> usize {
        self.column(asset)
            .map(|c| c.iter().filter(|v| v.is_none()).count())
            .unwrap_or(0)
    }

    pub fn is_complete(&self) -> bool {
        self.columns.iter().all(|c| c.iter().all(|v| v.is_some()))
    }

    /// A panel with only the listed assets, in the listed order.
    pub fn subset(&self, assets: &[AssetId]) -> Result<ReturnPanel, CmaError> {
        let columns = assets
            .iter()
            .map(|id| {
                self.column(id)
                    .map(|c| (id.clone(), c.to_vec()))
                    .ok_or_else(|| CmaError::config(format!("Asset '{id}' is not in the return panel.")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        ReturnPanel::new(self.dates.clone(), columns)
    }

    /// The last `window` observations of an asset, oldest first.
    ///
    /// Fails with `DataInsufficient` if the panel is shorter than the window or
    /// the asset has a gap inside it.
    pub fn trailing(&self, asset: &str, window: usize) -> Result<Vec<f64>, CmaError> {
        let column = self
            .column(asset)
            .ok_or_else(|| CmaError::config(format!("Asset '{asset}' is not in the return panel.")))?;
        if column.len() < window {
            return Err(CmaError::data(format!(
                "'{asset}' has {} periods; the weighting window needs {window}.",
                column.len()
            )));
        }
        let tail = &column[column.len() - window..];
        let missing = tail.iter().filter(|v| v.is_none()).count();
        if missing > 0 {
            return Err(CmaError::data(format!(
                "'{asset}' is missing {missing} of the last {window} periods."
            )));
        }
        Ok(tail.iter().flatten().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 28).unwrap()
    }

    #[test]
    fn panel_rejects_unsorted_dates_and_ragged_columns() {
        let unsorted = ReturnPanel::new(vec![d(2020, 2), d(2020, 1)], vec![("A".into(), vec![Some(0.1), None])]);
        assert!(matches!(unsorted, Err(CmaError::Parse(_))));

        let ragged = ReturnPanel::new(vec![d(2020, 1), d(2020, 2)], vec![("A".into(), vec![Some(0.1)])]);
        assert!(matches!(ragged, Err(CmaError::Parse(_))));

        let duplicate = ReturnPanel::new(
            vec![d(2020, 1)],
            vec![("A".into(), vec![Some(0.1)]), ("A".into(), vec![Some(0.2)])],
        );
        assert!(matches!(duplicate, Err(CmaError::Parse(_))));
    }

    #[test]
    fn missing_cells_are_counted_per_column() {
        let panel = ReturnPanel::new(
            vec![d(2020, 1), d(2020, 2), d(2020, 3)],
            vec![
                ("A".into(), vec![Some(0.01), Some(0.02), Some(0.03)]),
                ("B".into(), vec![None, Some(0.05), Some(0.06)]),
            ],
        )
        .unwrap();

        assert_eq!(panel.len(), 3);
        assert_eq!(panel.column("B").unwrap(), &[None, Some(0.05), Some(0.06)]);
        assert_eq!(panel.missing_count("A"), 0);
        assert_eq!(panel.missing_count("B"), 1);
        assert!(!panel.is_complete());
    }

    #[test]
    fn trailing_rejects_short_or_gappy_windows() {
        let dates = vec![d(2020, 1), d(2020, 2), d(2020, 3)];
        let panel = ReturnPanel::new(
            dates,
            vec![
                ("A".into(), vec![Some(0.1), Some(0.2), Some(0.3)]),
                ("B".into(), vec![Some(0.1), None, Some(0.3)]),
            ],
        )
        .unwrap();

        assert_eq!(panel.trailing("A", 2).unwrap(), vec![0.2, 0.3]);
        assert!(matches!(panel.trailing("A", 4), Err(CmaError::DataInsufficient(_))));
        assert!(matches!(panel.trailing("B", 3), Err(CmaError::DataInsufficient(_))));

        let only_b = panel.subset(&["B".to_string()]).unwrap();
        assert_eq!(only_b.assets(), &["B".to_string()]);
        assert_eq!(only_b.len(), 3);
        assert!(panel.subset(&["Z".to_string()]).is_err());
    }
}
