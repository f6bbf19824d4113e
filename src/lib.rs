//! # Budget Reconciliation
//!
//! Replaces the planned amounts of a budget spreadsheet with the actual
//! expenditures booked for a fiscal year, then derives per-project totals and
//! balances.
//!
//! ## Core Concepts
//!
//! - **Budget**: one row per project code (`WBS Element`) and fiscal year, with
//!   `Period <n>` amount columns and a `Total` column
//! - **Expenditures**: transaction rows keyed by fiscal year, project code and
//!   period, summed before they are merged
//! - **Merge**: for the chosen fiscal year and period range, each `Period <n>`
//!   cell becomes the rounded expenditure total (zero when nothing was spent)
//! - **Derived totals**: `Total Acumulado`, `Total Orcado` and `Saldo` per
//!   project, kept only on the rows of its most recent fiscal year
//!
//! ## Example
//!
//! ```rust
//! use budget_reconciliation::*;
//!
//! let budget = Table::from_rows(
//!     vec![
//!         "WBS Element".to_string(),
//!         "Fiscal Year".to_string(),
//!         "Period 1".to_string(),
//!         "Total".to_string(),
//!     ],
//!     vec![vec!["P1".into(), 2026.into(), 100.0.into(), 300.0.into()]],
//! )
//! .unwrap();
//!
//! let expenditures = Table::from_rows(
//!     vec![
//!         "Fiscal Year".to_string(),
//!         "WBS Element".to_string(),
//!         "Period".to_string(),
//!         "Vbl. value/Obj. curr".to_string(),
//!     ],
//!     vec![vec![2026.into(), "P1".into(), 1.into(), 80.0.into()]],
//! )
//! .unwrap();
//!
//! let periods = PeriodSelection::new(1, 12).unwrap();
//! let outcome = reconcile(&budget, &expenditures, 2026, periods).unwrap();
//!
//! assert_eq!(outcome.table().value(0, "Saldo"), Some(&Cell::Number(220.0)));
//! ```

pub mod aggregation;
pub mod engine;
pub mod error;
pub mod export;
pub mod ingestion;
pub mod periods;
pub mod schema;
pub mod table;

pub use aggregation::{AggregatedExpenditure, ExpenditureKey};
pub use engine::{ReconcileOutcome, Reconciler, NO_PERIOD_COLUMNS_WARNING};
pub use error::{ReconciliationError, Result};
pub use export::*;
pub use ingestion::*;
pub use periods::{parse_period_column, period_column_name, period_columns, PeriodColumn};
pub use schema::*;
pub use table::{is_placeholder_column, Cell, Table};

use log::{debug, info};
use std::path::Path;

pub struct BudgetReconciler;

impl BudgetReconciler {
    pub fn reconcile(
        budget: &Table,
        expenditures: &Table,
        fiscal_year: i32,
        periods: PeriodSelection,
    ) -> Result<ReconcileOutcome> {
        let columns = ColumnNames::default();
        Reconciler::new(&columns, RoundingMode::default()).reconcile(
            budget,
            expenditures,
            fiscal_year,
            periods,
        )
    }

    pub fn reconcile_with_config(
        budget: &Table,
        expenditures: &Table,
        config: &ReconcileConfig,
    ) -> Result<ReconcileOutcome> {
        let periods = config.periods()?;
        debug!("Reconciliation config: {:?}", config);

        Reconciler::new(&config.columns, config.rounding).reconcile(
            budget,
            expenditures,
            config.fiscal_year,
            periods,
        )
    }

    /// Reads both spreadsheets from disk and reconciles them.
    pub fn reconcile_files(
        budget_path: &Path,
        expenditures_path: &Path,
        config: &ReconcileConfig,
    ) -> Result<ReconcileOutcome> {
        // Validate the range before touching the filesystem.
        config.periods()?;

        info!("Reading budget from {}", budget_path.display());
        let budget = read_path(budget_path)?;
        info!("Reading expenditures from {}", expenditures_path.display());
        let expenditures = read_path(expenditures_path)?;

        Self::reconcile_with_config(&budget, &expenditures, config)
    }
}

pub fn reconcile(
    budget: &Table,
    expenditures: &Table,
    fiscal_year: i32,
    periods: PeriodSelection,
) -> Result<ReconcileOutcome> {
    BudgetReconciler::reconcile(budget, expenditures, fiscal_year, periods)
}

pub fn reconcile_with_config(
    budget: &Table,
    expenditures: &Table,
    config: &ReconcileConfig,
) -> Result<ReconcileOutcome> {
    BudgetReconciler::reconcile_with_config(budget, expenditures, config)
}
