//! CSV in (upload parsing) and CSV out (uploader export).

use std::io;

use super::{RawBatch, RawRow, ValidationError};
use crate::domain::OrderRecord;

/// Parse CSV text with a header row into raw rows.
///
/// Fully blank lines are skipped. A record whose width differs from the header
/// rejects the batch.
pub fn parse_batch(csv_bytes: &[u8]) -> Result<RawBatch, ValidationError> {
    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(::csv::Trim::All)
        .from_reader(csv_bytes);

    let headers = reader
        .headers()
        .map_err(|e| ValidationError::MalformedCsv(e.to_string()))?
        .clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ValidationError::MalformedCsv(e.to_string()))?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let fields = headers
            .iter()
            .zip(record.iter())
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        rows.push(RawRow::new(fields));
    }

    Ok(rows)
}

/// Render an uploader's orders as CSV.
pub fn write_orders_csv(orders: &[OrderRecord]) -> Result<String, ::csv::Error> {
    let mut writer = ::csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "game_id",
        "order_id",
        "total_price",
        "order_status",
        "points",
        "timestamp_created",
        "timestamp_updated",
    ])?;

    for order in orders {
        writer.write_record([
            order.game_id.as_str().to_string(),
            order.order_id.as_str().to_string(),
            order.total_price.to_canonical_string(),
            order.status.as_str().to_string(),
            order.points.to_string(),
            order.timestamp_created.to_string(),
            order
                .timestamp_updated
                .map(|t| t.to_string())
                .unwrap_or_default(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ::csv::Error::from(e.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|e| ::csv::Error::from(io::Error::new(io::ErrorKind::InvalidData, e)))
}
