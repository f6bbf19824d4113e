use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconciliationError {
    #[error("Could not read {source_name}: {details}")]
    ReadError {
        source_name: String,
        details: String,
    },

    #[error("Required column '{0}' was not found")]
    MissingColumn(String),

    #[error("Invalid period range: final period {end} is before initial period {start}")]
    InvalidPeriodRange { start: u32, end: u32 },

    #[error("Invalid value in column '{column}' at row {row}: {details}")]
    InvalidValue {
        column: String,
        row: usize,
        details: String,
    },

    #[error("Invalid table: {0}")]
    InvalidTable(String),

    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[cfg(feature = "excel")]
    #[error("XLSX error: {0}")]
    XlsxError(#[from] rust_xlsxwriter::XlsxError),
}

pub type Result<T> = std::result::Result<T, ReconciliationError>;
