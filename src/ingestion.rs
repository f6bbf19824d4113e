use crate::error::{ReconciliationError, Result};
use crate::table::{Cell, Table, PLACEHOLDER_PREFIX};
use log::{debug, info};
use std::collections::HashMap;
use std::path::Path;

/// One way of turning raw file bytes into a typed table.
pub trait ReadStrategy {
    fn name(&self) -> &'static str;
    fn read(&self, bytes: &[u8]) -> Result<Table>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    /// ISO-8859-1: every byte is the code point of the same value.
    Latin1,
}

impl TextEncoding {
    pub fn decode(self, bytes: &[u8]) -> Result<String> {
        match self {
            TextEncoding::Utf8 => {
                let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
                String::from_utf8(bytes.to_vec()).map_err(|e| {
                    ReconciliationError::InvalidTable(format!("input is not valid UTF-8: {}", e))
                })
            }
            TextEncoding::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }
}

/// Delimited text with a header row (CSV, tab-separated exports).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelimitedText {
    pub delimiter: u8,
    pub encoding: TextEncoding,
}

impl DelimitedText {
    pub fn tab_latin1() -> Self {
        Self {
            delimiter: b'\t',
            encoding: TextEncoding::Latin1,
        }
    }

    pub fn comma_utf8() -> Self {
        Self {
            delimiter: b',',
            encoding: TextEncoding::Utf8,
        }
    }
}

impl ReadStrategy for DelimitedText {
    fn name(&self) -> &'static str {
        match self.delimiter {
            b'\t' => "tab-separated text",
            b',' => "comma-separated text",
            _ => "delimited text",
        }
    }

    fn read(&self, bytes: &[u8]) -> Result<Table> {
        let text = self.encoding.decode(bytes)?;
        if text.contains('\0') {
            return Err(ReconciliationError::InvalidTable(
                "input contains binary data".to_string(),
            ));
        }

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers = reader.headers()?.clone();
        if headers.is_empty() {
            return Err(ReconciliationError::InvalidTable("missing header row".to_string()));
        }

        let mut columns: Vec<String> = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| header_name(idx, name))
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(parse_text_cell).collect::<Vec<_>>());
        }

        // Data rows wider than the header get placeholder columns.
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        while columns.len() < width {
            columns.push(header_name(columns.len(), ""));
        }

        Table::from_rows(dedup_headers(columns), rows)
    }
}

/// Renames repeated header names to `name.1`, `name.2`, ... in order of
/// appearance, skipping suffixes that collide with an existing name.
fn dedup_headers(columns: Vec<String>) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();

    columns
        .into_iter()
        .map(|mut name| {
            let mut count = counts.get(&name).copied().unwrap_or(0);
            while count > 0 {
                counts.insert(name.clone(), count + 1);
                name = format!("{}.{}", name, count);
                count = counts.get(&name).copied().unwrap_or(0);
            }
            counts.insert(name.clone(), 1);
            name
        })
        .collect()
}

fn header_name(idx: usize, name: &str) -> String {
    if name.trim().is_empty() {
        format!("{}: {}", PLACEHOLDER_PREFIX, idx)
    } else {
        name.to_string()
    }
}

/// Types a text cell: blank is empty, numeric text is a number, anything else
/// stays text.
pub fn parse_text_cell(raw: &str) -> Cell {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Cell::Empty;
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_nan() => Cell::Empty,
        Ok(n) => Cell::Number(n),
        Err(_) => Cell::Text(raw.to_string()),
    }
}

#[cfg(feature = "excel")]
pub use workbook::Workbook;

#[cfg(feature = "excel")]
mod workbook {
    use super::{dedup_headers, header_name, ReadStrategy};
    use crate::error::{ReconciliationError, Result};
    use crate::table::{Cell, Table};
    use calamine::{open_workbook_auto_from_rs, Data, Reader};
    use std::io::Cursor;

    /// First worksheet of an `.xls` or `.xlsx` workbook.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct Workbook;

    impl ReadStrategy for Workbook {
        fn name(&self) -> &'static str {
            "workbook"
        }

        fn read(&self, bytes: &[u8]) -> Result<Table> {
            let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
                .map_err(|e| ReconciliationError::InvalidTable(e.to_string()))?;

            let range = workbook
                .worksheet_range_at(0)
                .ok_or_else(|| ReconciliationError::InvalidTable("workbook has no sheets".to_string()))?
                .map_err(|e| ReconciliationError::InvalidTable(e.to_string()))?;

            let mut rows = range.rows();
            let header = rows
                .next()
                .ok_or_else(|| ReconciliationError::InvalidTable("missing header row".to_string()))?;

            let columns: Vec<String> = header
                .iter()
                .enumerate()
                .map(|(idx, cell)| header_name(idx, &data_to_cell(cell).to_string()))
                .collect();

            let body = rows
                .map(|row| row.iter().map(data_to_cell).collect())
                .collect();

            Table::from_rows(dedup_headers(columns), body)
        }
    }

    fn data_to_cell(data: &Data) -> Cell {
        match data {
            Data::Empty | Data::Error(_) => Cell::Empty,
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::String(s) if s.trim().is_empty() => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Bool(b) => Cell::Text(b.to_string()),
            Data::DateTime(dt) => Cell::Number(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        }
    }
}

/// Ordered chain of read strategies; the first one that parses wins.
pub struct TableReader {
    strategies: Vec<Box<dyn ReadStrategy>>,
}

impl TableReader {
    pub fn new(strategies: Vec<Box<dyn ReadStrategy>>) -> Self {
        Self { strategies }
    }

    /// Picks strategies from the file extension. Legacy `.xls` exports are
    /// often tab-separated Latin-1 text, so that is tried after the workbook
    /// reader.
    pub fn for_file_name(name: &str) -> Self {
        let extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        let mut strategies: Vec<Box<dyn ReadStrategy>> = Vec::new();
        match extension.as_deref() {
            Some("xlsx") => {
                push_workbook(&mut strategies);
            }
            Some("csv") => strategies.push(Box::new(DelimitedText::comma_utf8())),
            Some("tsv") | Some("txt") => strategies.push(Box::new(DelimitedText::tab_latin1())),
            _ => {
                push_workbook(&mut strategies);
                strategies.push(Box::new(DelimitedText::tab_latin1()));
            }
        }

        Self::new(strategies)
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn read(&self, source_name: &str, bytes: &[u8]) -> Result<Table> {
        if self.strategies.is_empty() {
            return Err(ReconciliationError::ReadError {
                source_name: source_name.to_string(),
                details: "no reader is available for this format (workbook support requires the `excel` feature)"
                    .to_string(),
            });
        }

        let mut failures = Vec::new();
        for (attempt, strategy) in self.strategies.iter().enumerate() {
            match strategy.read(bytes) {
                Ok(table) => {
                    if attempt > 0 {
                        info!(
                            "Read {} as {} after {} failed attempt(s)",
                            source_name,
                            strategy.name(),
                            attempt
                        );
                    }
                    debug!(
                        "{}: {} rows, {} columns",
                        source_name,
                        table.len(),
                        table.width()
                    );
                    return Ok(table);
                }
                Err(e) => {
                    debug!("Reading {} as {} failed: {}", source_name, strategy.name(), e);
                    failures.push(format!("{}: {}", strategy.name(), e));
                }
            }
        }

        Err(ReconciliationError::ReadError {
            source_name: source_name.to_string(),
            details: failures.join("; "),
        })
    }
}

#[cfg(feature = "excel")]
fn push_workbook(strategies: &mut Vec<Box<dyn ReadStrategy>>) {
    strategies.push(Box::new(Workbook));
}

#[cfg(not(feature = "excel"))]
fn push_workbook(_strategies: &mut Vec<Box<dyn ReadStrategy>>) {}

/// Reads a spreadsheet from disk, choosing strategies from its file name.
pub fn read_path(path: impl AsRef<Path>) -> Result<Table> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    TableReader::for_file_name(name).read(&path.display().to_string(), &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latin1_tab_separated_export() {
        let bytes: &[u8] = b"WBS Element\tFiscal Year\t\tDescri\xE7\xE3o\nP1\t2026\t\tObra\n";
        let table = DelimitedText::tab_latin1().read(bytes).unwrap();

        assert_eq!(
            table.columns(),
            &[
                "WBS Element".to_string(),
                "Fiscal Year".to_string(),
                "Unnamed: 2".to_string(),
                "Descrição".to_string()
            ]
        );
        assert_eq!(table.value(0, "Fiscal Year"), Some(&Cell::Number(2026.0)));
        assert_eq!(table.value(0, "Unnamed: 2"), Some(&Cell::Empty));
        assert_eq!(table.value(0, "Descrição"), Some(&Cell::from("Obra")));
    }

    #[test]
    fn test_parse_text_cell() {
        assert_eq!(parse_text_cell(""), Cell::Empty);
        assert_eq!(parse_text_cell("  "), Cell::Empty);
        assert_eq!(parse_text_cell("NaN"), Cell::Empty);
        assert_eq!(parse_text_cell(" -12.5 "), Cell::Number(-12.5));
        assert_eq!(parse_text_cell("P-001"), Cell::from("P-001"));
    }

    #[test]
    fn test_ragged_rows() {
        let table = DelimitedText::comma_utf8()
            .read(b"A,B\n1\n2,3,4\n")
            .unwrap();
        assert_eq!(table.width(), 3);
        assert_eq!(table.columns()[2], "Unnamed: 2");
        assert_eq!(table.value(0, "B"), Some(&Cell::Empty));
        assert_eq!(table.rows()[1][2], Cell::Number(4.0));
    }

    #[test]
    fn test_repeated_headers_are_renamed() {
        let table = DelimitedText::tab_latin1()
            .read(b"Period 1\tPeriod 1\tPeriod 1.1\tPeriod 1\n1\t2\t3\t4\n")
            .unwrap();
        assert_eq!(
            table.columns(),
            ["Period 1", "Period 1.1", "Period 1.1.1", "Period 1.2"]
        );
        assert_eq!(table.value(0, "Period 1"), Some(&Cell::Number(1.0)));
        assert_eq!(table.value(0, "Period 1.2"), Some(&Cell::Number(4.0)));
    }

    #[test]
    fn test_utf8_bom_is_stripped() {
        let table = DelimitedText::comma_utf8()
            .read(b"\xEF\xBB\xBFTotal\n10\n")
            .unwrap();
        assert_eq!(table.columns(), &["Total".to_string()]);
    }

    #[test]
    fn test_strategies_by_extension() {
        assert_eq!(
            TableReader::for_file_name("gastos.csv").strategy_names(),
            vec!["comma-separated text"]
        );
        assert_eq!(
            TableReader::for_file_name("orcamento.TSV").strategy_names(),
            vec!["tab-separated text"]
        );
        assert_eq!(
            TableReader::for_file_name("orcamento.xls").strategy_names().last(),
            Some(&"tab-separated text")
        );
    }

    #[test]
    fn test_xls_falls_back_to_text() {
        let reader = TableReader::for_file_name("gastos.xls");
        let table = reader
            .read("gastos.xls", b"Fiscal Year\tPeriod\n2026\t1\n")
            .unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.value(0, "Period"), Some(&Cell::Number(1.0)));
    }

    #[test]
    fn test_all_strategies_failing_is_a_read_error() {
        let reader = TableReader::for_file_name("gastos.xls");
        let result = reader.read("gastos.xls", b"\xD0\xCF\x11\xE0\x00\x00garbage");
        match result {
            Err(ReconciliationError::ReadError { source_name, details }) => {
                assert_eq!(source_name, "gastos.xls");
                assert!(details.contains("tab-separated text"));
            }
            other => panic!("expected ReadError, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_utf8_csv_is_rejected() {
        let reader = TableReader::for_file_name("gastos.csv");
        assert!(matches!(
            reader.read("gastos.csv", b"A\n\xFF\n"),
            Err(ReconciliationError::ReadError { .. })
        ));
    }
}
