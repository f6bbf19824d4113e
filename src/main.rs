//! Command-line front end for the budget reconciliation.

use anyhow::{Context, Result};
use budget_reconciliation::{
    report_file_name, write_path, BudgetReconciler, OutputFormat, PeriodSelection,
    ReconcileConfig, ReconcileOutcome, FIRST_PERIOD, LAST_PERIOD,
};
use clap::Parser;
use log::{error, info, warn};
use std::path::PathBuf;
use std::process::ExitCode;

/// Replace budgeted period amounts with actual expenditures and compute
/// per-project totals and balances.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Budget spreadsheet (.xls, .xlsx, .csv, .tsv)
    #[arg(short, long, required_unless_present = "print_schema")]
    budget: Option<PathBuf>,

    /// Expenditure spreadsheet (.xls, .xlsx, .csv, .tsv)
    #[arg(short, long, required_unless_present = "print_schema")]
    expenditures: Option<PathBuf>,

    /// Fiscal year to update [default: 2026]
    #[arg(short = 'y', long)]
    fiscal_year: Option<i32>,

    /// First period to update [default: 1]
    #[arg(long, value_parser = clap::value_parser!(u32).range(FIRST_PERIOD as i64..=LAST_PERIOD as i64))]
    period_start: Option<u32>,

    /// Last period to update [default: 12]
    #[arg(long, value_parser = clap::value_parser!(u32).range(FIRST_PERIOD as i64..=LAST_PERIOD as i64))]
    period_end: Option<u32>,

    /// JSON file with reconciliation settings; flags take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output file (.xlsx, .csv, .json) [default: Relatorio_Atualizado_<year>.<ext>]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the JSON schema of the settings file and exit
    #[arg(long)]
    print_schema: bool,
}

impl Cli {
    fn resolve_config(&self) -> Result<ReconcileConfig> {
        let mut config = match &self.config {
            Some(path) => ReconcileConfig::from_path(path)
                .with_context(|| format!("failed to load settings from {}", path.display()))?,
            None => ReconcileConfig::default(),
        };

        if let Some(year) = self.fiscal_year {
            config.fiscal_year = year;
        }
        if let Some(start) = self.period_start {
            config.period_start = start;
        }
        if let Some(end) = self.period_end {
            config.period_end = end;
        }
        Ok(config)
    }
}

/// Settings files bypass the flag parsers, so the merged values are checked
/// against the same bounds.
fn check_period_bounds(config: &ReconcileConfig) -> Result<()> {
    let bounds = FIRST_PERIOD..=LAST_PERIOD;
    for (label, period) in [("initial", config.period_start), ("final", config.period_end)] {
        if !bounds.contains(&period) {
            anyhow::bail!(
                "the {} period {} is outside {}..={}",
                label,
                period,
                FIRST_PERIOD,
                LAST_PERIOD
            );
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    if cli.print_schema {
        let schema = ReconcileConfig::json_schema()?;
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    let config = cli.resolve_config()?;
    check_period_bounds(&config)?;
    let periods = PeriodSelection::new(config.period_start, config.period_end)
        .context("the final period must be greater than or equal to the initial period")?;

    let (Some(budget), Some(expenditures)) = (&cli.budget, &cli.expenditures) else {
        anyhow::bail!("both the budget and the expenditure files are required");
    };

    info!(
        "Fiscal year {}, periods {} to {}",
        config.fiscal_year,
        periods.start(),
        periods.end()
    );

    let outcome = BudgetReconciler::reconcile_files(budget, expenditures, &config)
        .context("reconciliation failed")?;

    if let Some(message) = outcome.warning() {
        warn!("{}", message);
    }

    let output = cli.output.clone().unwrap_or_else(|| {
        PathBuf::from(report_file_name(
            config.fiscal_year,
            OutputFormat::default_report(),
        ))
    });

    let table = outcome.table();
    write_path(table, &output)
        .with_context(|| format!("failed to write report to {}", output.display()))?;

    match outcome {
        ReconcileOutcome::Completed(_) => {
            println!("Processing completed successfully: {}", output.display())
        }
        ReconcileOutcome::NoPeriodColumns(_) => {
            println!("Report written without totals: {}", output.display())
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::parse_from([
            "budget-reconcile",
            "--budget",
            "orcamento.xls",
            "--expenditures",
            "gastos.xls",
            "--fiscal-year",
            "2025",
            "--period-end",
            "3",
        ]);

        let config = cli.resolve_config().unwrap();
        assert_eq!(config.fiscal_year, 2025);
        assert_eq!(config.period_start, 1);
        assert_eq!(config.period_end, 3);
    }

    #[test]
    fn test_out_of_range_period_is_rejected() {
        let result = Cli::try_parse_from([
            "budget-reconcile",
            "--budget",
            "a.csv",
            "--expenditures",
            "b.csv",
            "--period-start",
            "13",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_settings_file_periods_outside_the_year_are_rejected() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let settings = dir.path().join("settings.json");
        std::fs::write(&settings, r#"{ "period_start": 0, "period_end": 40 }"#)?;

        let cli = Cli::parse_from([
            "budget-reconcile",
            "--budget",
            "does-not-exist.csv",
            "--expenditures",
            "does-not-exist.csv",
            "--config",
            settings.to_str().unwrap(),
        ]);

        let message = format!("{:#}", run(&cli).unwrap_err());
        assert!(message.contains("initial period 0 is outside 1..=12"), "{}", message);
        Ok(())
    }

    #[test]
    fn test_period_bounds_apply_to_both_ends() {
        let config = ReconcileConfig {
            period_start: 3,
            period_end: 13,
            ..Default::default()
        };
        let message = check_period_bounds(&config).unwrap_err().to_string();
        assert!(message.contains("final period 13"), "{}", message);

        assert!(check_period_bounds(&ReconcileConfig::default()).is_ok());
    }

    #[test]
    fn test_reversed_range_fails_before_reading_files() {
        let cli = Cli::parse_from([
            "budget-reconcile",
            "--budget",
            "does-not-exist.csv",
            "--expenditures",
            "does-not-exist.csv",
            "--period-start",
            "5",
            "--period-end",
            "2",
        ]);

        let message = format!("{:#}", run(&cli).unwrap_err());
        assert!(message.contains("final period"), "{}", message);
    }
}
