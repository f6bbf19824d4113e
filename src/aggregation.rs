use crate::error::{ReconciliationError, Result};
use crate::schema::ColumnNames;
use crate::table::Table;
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExpenditureKey {
    pub fiscal_year: i32,
    pub project: String,
    pub period: u32,
}

/// Expenditure amounts summed per (fiscal year, project, period).
#[derive(Debug, Clone, Default)]
pub struct AggregatedExpenditure {
    totals: BTreeMap<ExpenditureKey, f64>,
}

impl AggregatedExpenditure {
    /// Groups the transaction rows of an expenditure sheet.
    ///
    /// Rows with an empty fiscal year, project or period take no part in any
    /// group. Empty amounts count as zero.
    pub fn from_table(table: &Table, columns: &ColumnNames) -> Result<Self> {
        let year_idx = table.require_column(&columns.fiscal_year)?;
        let project_idx = table.require_column(&columns.project)?;
        let period_idx = table.require_column(&columns.period)?;
        let value_idx = table.require_column(&columns.value)?;

        let mut totals: BTreeMap<ExpenditureKey, f64> = BTreeMap::new();
        let mut skipped = 0usize;

        for row in 0..table.len() {
            let fiscal_year = table.integer_at(row, year_idx)?;
            let project = table.key_at(row, project_idx);
            let period = table.integer_at(row, period_idx)?;

            let (Some(fiscal_year), Some(project), Some(period)) = (fiscal_year, project, period)
            else {
                skipped += 1;
                continue;
            };

            let key = ExpenditureKey {
                fiscal_year: to_fiscal_year(fiscal_year, &columns.fiscal_year, row)?,
                project,
                period: to_period(period, &columns.period, row)?,
            };
            let value = table.number_at(row, value_idx)?;

            *totals.entry(key).or_insert(0.0) += value;
        }

        if skipped > 0 {
            warn!(
                "Skipped {} expenditure rows with an empty fiscal year, project or period",
                skipped
            );
        }
        debug!(
            "Aggregated {} expenditure rows into {} groups",
            table.len(),
            totals.len()
        );

        Ok(Self { totals })
    }

    #[cfg(test)]
    pub fn get(&self, fiscal_year: i32, project: &str, period: u32) -> Option<f64> {
        self.totals
            .get(&ExpenditureKey {
                fiscal_year,
                project: project.to_string(),
                period,
            })
            .copied()
    }

    /// Amounts of one period of one fiscal year, keyed by project.
    pub fn for_period(&self, fiscal_year: i32, period: u32) -> HashMap<&str, f64> {
        self.totals
            .iter()
            .filter(|(key, _)| key.fiscal_year == fiscal_year && key.period == period)
            .map(|(key, value)| (key.project.as_str(), *value))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }
}

pub(crate) fn to_fiscal_year(value: i64, column: &str, row: usize) -> Result<i32> {
    i32::try_from(value).map_err(|_| ReconciliationError::InvalidValue {
        column: column.to_string(),
        row: row + 1,
        details: format!("fiscal year {} is out of range", value),
    })
}

fn to_period(value: i64, column: &str, row: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| ReconciliationError::InvalidValue {
        column: column.to_string(),
        row: row + 1,
        details: format!("period {} is not a positive number", value),
    })
}
