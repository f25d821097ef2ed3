use thiserror::Error;

#[derive(Error, Debug)]
pub enum FormError {
    #[error("Input is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("{0}")]
    NoRecords(NoRecordsReason),

    #[error("Failed to read CSV: {0}")]
    Csv(String),

    #[error("PDF operation failed: {0}")]
    Pdf(String),

    #[error("Invalid layout: {0}")]
    Layout(String),

    #[error("Failed to build archive: {0}")]
    Archive(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Amounts out of range: {0}")]
    Overflow(String),
}

/// Why a request produced no usable records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NoRecordsReason {
    #[error("The input file contains no data rows")]
    EmptyInput,

    #[error(
        "No rows have a disposal action type ({skipped} rows skipped); \
         check that the export contains sell or trade transactions"
    )]
    NoMatchingAction { skipped: usize },

    #[error(
        "{out_of_year} rows have valid data but were sold outside tax year {year}; \
         select the year the sales happened in"
    )]
    OutsideTaxYear { year: i32, out_of_year: usize },

    #[error("All {rejected} rows failed to parse; see the warnings for details")]
    AllRowsRejected { rejected: usize },
}

impl From<lopdf::Error> for FormError {
    fn from(e: lopdf::Error) -> Self {
        FormError::Pdf(e.to_string())
    }
}

impl From<csv::Error> for FormError {
    fn from(e: csv::Error) -> Self {
        FormError::Csv(e.to_string())
    }
}

impl From<zip::result::ZipError> for FormError {
    fn from(e: zip::result::ZipError) -> Self {
        FormError::Archive(e.to_string())
    }
}
