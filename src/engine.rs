use crate::aggregation::{to_fiscal_year, AggregatedExpenditure};
use crate::error::Result;
use crate::periods::{period_column_name, period_columns, PeriodColumn};
use crate::schema::{ColumnNames, PeriodSelection, RoundingMode};
use crate::table::{Cell, Table};
use log::{debug, info, warn};
use std::collections::HashMap;

pub const NO_PERIOD_COLUMNS_WARNING: &str =
    "No column in the 'Period X' format was found to calculate the totals";

/// Result of a reconciliation that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// Period columns merged and totals derived.
    Completed(Table),
    /// The budget has no `Period <n>` columns; the table is returned unchanged.
    NoPeriodColumns(Table),
}

impl ReconcileOutcome {
    pub fn table(&self) -> &Table {
        match self {
            ReconcileOutcome::Completed(table) | ReconcileOutcome::NoPeriodColumns(table) => table,
        }
    }

    pub fn into_table(self) -> Table {
        match self {
            ReconcileOutcome::Completed(table) | ReconcileOutcome::NoPeriodColumns(table) => table,
        }
    }

    pub fn warning(&self) -> Option<&'static str> {
        match self {
            ReconcileOutcome::Completed(_) => None,
            ReconcileOutcome::NoPeriodColumns(_) => Some(NO_PERIOD_COLUMNS_WARNING),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, ReconcileOutcome::Completed(_))
    }
}

/// Merges actual expenditures into a budget and derives per-project totals.
pub struct Reconciler<'a> {
    columns: &'a ColumnNames,
    rounding: RoundingMode,
}

// Key columns of the budget, read once per run.
struct RowKeys {
    projects: Vec<Option<String>>,
    fiscal_years: Vec<Option<i32>>,
}

impl<'a> Reconciler<'a> {
    pub fn new(columns: &'a ColumnNames, rounding: RoundingMode) -> Self {
        Self { columns, rounding }
    }

    pub fn reconcile(
        &self,
        budget: &Table,
        expenditures: &Table,
        fiscal_year: i32,
        periods: PeriodSelection,
    ) -> Result<ReconcileOutcome> {
        let mut result = budget.clone();
        result.drop_placeholder_columns();

        let mut expenditures = expenditures.clone();
        expenditures.drop_placeholder_columns();

        info!(
            "Reconciling {} budget rows against {} expenditure rows for fiscal year {}, periods {} to {}",
            result.len(),
            expenditures.len(),
            fiscal_year,
            periods.start(),
            periods.end()
        );

        let aggregated = AggregatedExpenditure::from_table(&expenditures, self.columns)?;

        // Merging only rewrites existing columns, so the period columns found
        // here are the ones present after the merge.
        let period_cols = period_columns(result.columns());
        if period_cols.is_empty() {
            warn!("{}", NO_PERIOD_COLUMNS_WARNING);
            return Ok(ReconcileOutcome::NoPeriodColumns(result));
        }

        let keys = self.read_row_keys(&result)?;
        self.merge_periods(&mut result, &period_cols, &keys, &aggregated, fiscal_year, periods);

        debug!(
            "Totalling {} period columns: {:?}",
            period_cols.len(),
            period_cols.iter().map(|c| c.name.as_str()).collect::<Vec<_>>()
        );

        let mut row_totals = Vec::with_capacity(result.len());
        for row in 0..result.len() {
            let mut sum = 0.0;
            for column in &period_cols {
                sum += result.number_at(row, column.index)?;
            }
            row_totals.push(sum);
        }
        let accumulated = sum_by_project(&keys.projects, &row_totals);

        let total_idx = result.require_column(&self.columns.total)?;
        let mut budgeted_rows = Vec::with_capacity(result.len());
        for row in 0..result.len() {
            budgeted_rows.push(result.number_at(row, total_idx)?);
        }
        let budgeted = sum_by_project(&keys.projects, &budgeted_rows);

        let latest_years = latest_year_by_project(&keys);

        let mut accumulated_col = Vec::with_capacity(result.len());
        let mut budgeted_col = Vec::with_capacity(result.len());
        let mut balance_col = Vec::with_capacity(result.len());

        for row in 0..result.len() {
            let project = keys.projects[row].as_deref();
            let superseded = match (project, keys.fiscal_years[row]) {
                (Some(p), Some(year)) => latest_years.get(p).is_some_and(|max| year < *max),
                _ => false,
            };

            let totals = project
                .filter(|_| !superseded)
                .and_then(|p| Some((*budgeted.get(p)?, *accumulated.get(p)?)));

            match totals {
                Some((budgeted_total, accumulated_total)) => {
                    accumulated_col.push(Cell::Number(accumulated_total));
                    budgeted_col.push(Cell::Number(budgeted_total));
                    balance_col.push(Cell::Number(budgeted_total - accumulated_total));
                }
                None => {
                    accumulated_col.push(Cell::Empty);
                    budgeted_col.push(Cell::Empty);
                    balance_col.push(Cell::Empty);
                }
            }
        }

        result.set_column(&self.columns.accumulated_total, accumulated_col)?;
        result.set_column(&self.columns.budgeted_total, budgeted_col)?;
        result.set_column(&self.columns.balance, balance_col)?;

        info!("Derived totals for {} projects", budgeted.len());

        Ok(ReconcileOutcome::Completed(result))
    }

    fn read_row_keys(&self, budget: &Table) -> Result<RowKeys> {
        let project_idx = budget.require_column(&self.columns.project)?;
        let year_idx = budget.require_column(&self.columns.fiscal_year)?;

        let mut projects = Vec::with_capacity(budget.len());
        let mut fiscal_years = Vec::with_capacity(budget.len());
        for row in 0..budget.len() {
            projects.push(budget.key_at(row, project_idx));
            let year = budget
                .integer_at(row, year_idx)?
                .map(|y| to_fiscal_year(y, &self.columns.fiscal_year, row))
                .transpose()?;
            fiscal_years.push(year);
        }

        Ok(RowKeys {
            projects,
            fiscal_years,
        })
    }

    /// Replaces each selected period column of the target fiscal year with
    /// the matching expenditure total, or zero when there is none. Periods
    /// without a budget column are skipped; a period named by several
    /// columns updates all of them.
    fn merge_periods(
        &self,
        table: &mut Table,
        period_cols: &[PeriodColumn],
        keys: &RowKeys,
        aggregated: &AggregatedExpenditure,
        fiscal_year: i32,
        periods: PeriodSelection,
    ) {
        for period in periods.iter() {
            let column = period_column_name(period);
            let targets: Vec<usize> = period_cols
                .iter()
                .filter(|c| c.name == column)
                .map(|c| c.index)
                .collect();
            if targets.is_empty() {
                debug!("Budget has no '{}' column, skipping", column);
                continue;
            }

            let amounts = aggregated.for_period(fiscal_year, period);
            let mut updated = 0usize;

            for row in 0..table.len() {
                if keys.fiscal_years[row] != Some(fiscal_year) {
                    continue;
                }
                let amount = keys.projects[row]
                    .as_deref()
                    .and_then(|p| amounts.get(p).copied())
                    .unwrap_or(0.0);
                let rounded = self.rounding.round(amount);
                for &col_idx in &targets {
                    table.set_cell(row, col_idx, Cell::Number(rounded));
                }
                updated += 1;
            }

            debug!(
                "{}: {} expenditure groups merged, {} rows updated",
                column,
                amounts.len(),
                updated
            );
        }
    }
}

fn sum_by_project(projects: &[Option<String>], values: &[f64]) -> HashMap<String, f64> {
    let mut sums: HashMap<String, f64> = HashMap::new();
    for (project, value) in projects.iter().zip(values) {
        if let Some(p) = project {
            *sums.entry(p.clone()).or_insert(0.0) += value;
        }
    }
    sums
}

fn latest_year_by_project(keys: &RowKeys) -> HashMap<&str, i32> {
    let mut latest: HashMap<&str, i32> = HashMap::new();
    for (project, year) in keys.projects.iter().zip(&keys.fiscal_years) {
        if let (Some(p), Some(y)) = (project, year) {
            latest
                .entry(p.as_str())
                .and_modify(|max| *max = (*max).max(*y))
                .or_insert(*y);
        }
    }
    latest
}
