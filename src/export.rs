use crate::error::{ReconciliationError, Result};
use crate::table::Table;
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub const REPORT_SHEET_NAME: &str = "Relatorio_Atualizado";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Json,
    Xlsx,
}

impl OutputFormat {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let extension = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            "xlsx" if cfg!(feature = "excel") => Ok(OutputFormat::Xlsx),
            "xlsx" => Err(ReconciliationError::UnsupportedFormat(
                "xlsx output requires the `excel` feature".to_string(),
            )),
            other => Err(ReconciliationError::UnsupportedFormat(format!(
                "'{}' (expected csv, json or xlsx)",
                other
            ))),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
            OutputFormat::Xlsx => "xlsx",
        }
    }

    /// Richest format this build can write.
    pub fn default_report() -> Self {
        if cfg!(feature = "excel") {
            OutputFormat::Xlsx
        } else {
            OutputFormat::Csv
        }
    }
}

pub fn report_file_name(fiscal_year: i32, format: OutputFormat) -> String {
    format!("Relatorio_Atualizado_{}.{}", fiscal_year, format.extension())
}

pub fn write_csv<W: Write>(table: &Table, writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(table.columns())?;
    for row in table.rows() {
        writer.write_record(row.iter().map(|cell| cell.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn to_json(table: &Table) -> Result<String> {
    Ok(serde_json::to_string_pretty(table)?)
}

/// Serializes the report as an `.xlsx` workbook. Negative numbers in the
/// data region are highlighted with a conditional format.
#[cfg(feature = "excel")]
pub fn write_xlsx(table: &Table) -> Result<Vec<u8>> {
    use crate::table::Cell;
    use rust_xlsxwriter::{Color, ConditionalFormatCell, ConditionalFormatCellRule, Format, Workbook};

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(REPORT_SHEET_NAME)?;

    let header_format = Format::new().set_bold();
    for (col, name) in table.columns().iter().enumerate() {
        worksheet.write_string_with_format(0, to_col(col)?, name, &header_format)?;
    }

    for (idx, row) in table.rows().iter().enumerate() {
        let row_num = to_row(idx + 1)?;
        for (col, cell) in row.iter().enumerate() {
            match cell {
                Cell::Number(n) if n.is_finite() => {
                    worksheet.write_number(row_num, to_col(col)?, *n)?;
                }
                Cell::Text(s) => {
                    worksheet.write_string(row_num, to_col(col)?, s)?;
                }
                _ => {}
            }
        }
    }

    if !table.is_empty() && table.width() > 0 {
        let negative = Format::new()
            .set_background_color(Color::RGB(0xFFC7CE))
            .set_font_color(Color::RGB(0x9C0006));
        let rule = ConditionalFormatCell::new()
            .set_rule(ConditionalFormatCellRule::LessThan(0))
            .set_format(&negative);
        worksheet.add_conditional_format(
            1,
            0,
            to_row(table.len())?,
            to_col(table.width() - 1)?,
            &rule,
        )?;
    }

    Ok(workbook.save_to_buffer()?)
}

#[cfg(feature = "excel")]
fn to_row(idx: usize) -> Result<u32> {
    u32::try_from(idx)
        .map_err(|_| ReconciliationError::InvalidTable(format!("row {} exceeds the sheet size", idx)))
}

#[cfg(feature = "excel")]
fn to_col(idx: usize) -> Result<u16> {
    u16::try_from(idx).map_err(|_| {
        ReconciliationError::InvalidTable(format!("column {} exceeds the sheet size", idx))
    })
}

/// Writes the table to `path` in the format implied by its extension.
pub fn write_path(table: &Table, path: impl AsRef<Path>) -> Result<OutputFormat> {
    let path = path.as_ref();
    let format = OutputFormat::from_path(path)?;

    match format {
        OutputFormat::Csv => {
            let file = BufWriter::new(File::create(path)?);
            write_csv(table, file)?;
        }
        OutputFormat::Json => {
            std::fs::write(path, to_json(table)?)?;
        }
        #[cfg(feature = "excel")]
        OutputFormat::Xlsx => {
            std::fs::write(path, write_xlsx(table)?)?;
        }
        #[cfg(not(feature = "excel"))]
        OutputFormat::Xlsx => {
            return Err(ReconciliationError::UnsupportedFormat(
                "xlsx output requires the `excel` feature".to_string(),
            ));
        }
    }

    info!("Wrote {} rows to {}", table.len(), path.display());
    Ok(format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;

    fn report() -> Table {
        Table::from_rows(
            vec!["WBS Element".to_string(), "Period 1".to_string(), "Saldo".to_string()],
            vec![
                vec!["P1".into(), 75.0.into(), (-12.5).into()],
                vec!["P, 2".into(), Cell::Empty, Cell::Empty],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_csv_output() {
        let mut buffer = Vec::new();
        write_csv(&report(), &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(
            text,
            "WBS Element,Period 1,Saldo\nP1,75,-12.5\n\"P, 2\",,\n"
        );
    }

    #[test]
    fn test_json_output() {
        let json: serde_json::Value = serde_json::from_str(&to_json(&report()).unwrap()).unwrap();
        assert_eq!(json["columns"][2], "Saldo");
        assert_eq!(json["rows"][0][1], 75.0);
        assert!(json["rows"][1][2].is_null());
    }

    #[test]
    fn test_output_format_from_extension() {
        assert_eq!(OutputFormat::from_path("out.CSV").unwrap(), OutputFormat::Csv);
        assert_eq!(OutputFormat::from_path("out.json").unwrap(), OutputFormat::Json);
        assert!(matches!(
            OutputFormat::from_path("out.pdf"),
            Err(ReconciliationError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_report_file_name() {
        assert_eq!(
            report_file_name(2026, OutputFormat::Xlsx),
            "Relatorio_Atualizado_2026.xlsx"
        );
    }

    #[cfg(feature = "excel")]
    #[test]
    fn test_xlsx_is_a_zip_container() {
        let bytes = write_xlsx(&report()).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }
}
