use crate::error::{ReconciliationError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_FISCAL_YEAR: i32 = 2026;
pub const FIRST_PERIOD: u32 = 1;
pub const LAST_PERIOD: u32 = 12;

/// Names of the spreadsheet columns the reconciliation depends on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(default)]
pub struct ColumnNames {
    #[schemars(description = "Project code column, present in both sheets.")]
    pub project: String,

    #[schemars(description = "Fiscal year column, present in both sheets.")]
    pub fiscal_year: String,

    #[schemars(description = "Period number column of the expenditure sheet.")]
    pub period: String,

    #[schemars(description = "Amount column of the expenditure sheet.")]
    pub value: String,

    #[schemars(description = "Budgeted total column of the budget sheet.")]
    pub total: String,

    #[schemars(description = "Output column holding the budgeted total per project.")]
    pub budgeted_total: String,

    #[schemars(description = "Output column holding the accumulated actual total per project.")]
    pub accumulated_total: String,

    #[schemars(description = "Output column holding the remaining balance per project.")]
    pub balance: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            project: "WBS Element".to_string(),
            fiscal_year: "Fiscal Year".to_string(),
            period: "Period".to_string(),
            value: "Vbl. value/Obj. curr".to_string(),
            total: "Total".to_string(),
            budgeted_total: "Total Orcado".to_string(),
            accumulated_total: "Total Acumulado".to_string(),
            balance: "Saldo".to_string(),
        }
    }
}

/// Tie-breaking rule applied when merged amounts are rounded to whole units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    #[default]
    #[schemars(description = "Banker's rounding: 2.5 rounds to 2 and 3.5 rounds to 4.")]
    HalfEven,

    #[schemars(description = "2.5 rounds to 3 and -2.5 rounds to -3.")]
    HalfAwayFromZero,
}

impl RoundingMode {
    pub fn round(self, value: f64) -> f64 {
        match self {
            RoundingMode::HalfAwayFromZero => value.round(),
            RoundingMode::HalfEven => value.round_ties_even(),
        }
    }
}

/// Closed interval of periods to update. Construction guarantees `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodSelection {
    start: u32,
    end: u32,
}

impl PeriodSelection {
    pub fn new(start: u32, end: u32) -> Result<Self> {
        if end < start {
            return Err(ReconciliationError::InvalidPeriodRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn iter(&self) -> std::ops::RangeInclusive<u32> {
        self.start..=self.end
    }
}

impl Default for PeriodSelection {
    fn default() -> Self {
        Self {
            start: FIRST_PERIOD,
            end: LAST_PERIOD,
        }
    }
}

/// Parameters of one reconciliation run, loadable from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct ReconcileConfig {
    #[schemars(description = "Fiscal year whose period columns are replaced by actual expenditures.")]
    pub fiscal_year: i32,

    #[schemars(description = "First period to update (inclusive).")]
    pub period_start: u32,

    #[schemars(description = "Last period to update (inclusive). Must not be before period_start.")]
    pub period_end: u32,

    #[schemars(description = "Rounding applied to merged amounts.")]
    pub rounding: RoundingMode,

    #[schemars(description = "Spreadsheet column names.")]
    pub columns: ColumnNames,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            fiscal_year: DEFAULT_FISCAL_YEAR,
            period_start: FIRST_PERIOD,
            period_end: LAST_PERIOD,
            rounding: RoundingMode::default(),
            columns: ColumnNames::default(),
        }
    }
}

impl ReconcileConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn periods(&self) -> Result<PeriodSelection> {
        PeriodSelection::new(self.period_start, self.period_end)
    }

    pub fn json_schema() -> serde_json::Result<serde_json::Value> {
        let root = schemars::schema_for!(ReconcileConfig);
        serde_json::to_value(root)
    }
}
