//! Upload parsing and validation.
//!
//! Raw string-keyed rows come in, a typed [`ValidatedBatch`] comes out. Any
//! problem rejects the whole batch.

pub mod csv;
pub mod normalize;
pub mod validate;

use thiserror::Error;

pub use self::csv::{parse_batch, write_orders_csv};
pub use normalize::normalize_key;
pub use validate::{BatchValidator, ValidatedBatch};

/// One uploaded row: column name and raw text value, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    pub fields: Vec<(String, String)>,
}

impl RawRow {
    pub fn new(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }

    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// Rows of one upload, before validation.
pub type RawBatch = Vec<RawRow>;

/// Why a batch was rejected. Row numbers are 1-based data rows.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("batch contains no rows")]
    EmptyBatch,
    #[error("batch has {rows} rows, limit is {max}")]
    TooManyRows { rows: usize, max: usize },
    #[error("malformed CSV: {0}")]
    MalformedCsv(String),
    #[error("uploader identity is required")]
    MissingUploader,
    #[error("row {row}: missing required field '{field}'")]
    MissingField { row: usize, field: &'static str },
    #[error("row {row}: unexpected field '{field}'")]
    UnknownField { row: usize, field: String },
    #[error("row {row}: unrecognized order_status '{value}'")]
    InvalidStatus { row: usize, value: String },
    #[error("row {row}: total_price '{value}' must be a number greater than 0")]
    InvalidPrice { row: usize, value: String },
    #[error("row {row}: phone_number '{value}' must be masked as 999XXX9999")]
    InvalidPhone { row: usize, value: String },
    #[error("row {row}: {field} '{value}' is not a valid timestamp")]
    InvalidTimestamp {
        row: usize,
        field: &'static str,
        value: String,
    },
    #[error("row {row}: timestamp_created is more than one day in the future")]
    FutureTimestamp { row: usize },
    #[error("row {row}: duplicate order {order_id} with status {status} in batch")]
    DuplicateInBatch {
        row: usize,
        order_id: String,
        status: String,
    },
    #[error("row {row}: order {order_id} with status {status} was already uploaded")]
    AlreadyUploaded {
        row: usize,
        order_id: String,
        status: String,
    },
}
