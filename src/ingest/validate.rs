//! Whole-batch validation into typed order rows.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use super::{normalize_key, RawBatch, RawRow, ValidationError};
use crate::domain::{BusinessTz, Decimal, OrderId, OrderRow, OrderStatus, TimeMs, Uid};

pub const REQUIRED_FIELDS: [&str; 5] = [
    "phone_number",
    "order_id",
    "order_status",
    "timestamp_created",
    "total_price",
];

pub const OPTIONAL_FIELDS: [&str; 6] = [
    "name",
    "timestamp_updated",
    "category",
    "buyer_app_id",
    "seller_id",
    "domain",
];

const MAX_FUTURE_SKEW_MS: i64 = 24 * 60 * 60 * 1000;

// ASCII digits only; `\d` in `regex` also matches other Unicode digits.
static MASKED_PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{3}XXX[0-9]{4}$").expect("invalid masked phone regex"));

const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d-%m-%Y %H:%M:%S",
];

/// Batch split by lifecycle. Both halves keep upload order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatedBatch {
    pub new_orders: Vec<OrderRow>,
    pub cancellations: Vec<OrderRow>,
}

impl ValidatedBatch {
    pub fn len(&self) -> usize {
        self.new_orders.len() + self.cancellations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows subject to the per-uploader uniqueness check. Repeated partial
    /// cancellations are allowed.
    pub fn unique_keyed_rows(&self) -> impl Iterator<Item = &OrderRow> {
        self.new_orders
            .iter()
            .chain(self.cancellations.iter())
            .filter(|r| r.status != OrderStatus::PartiallyCancelled)
    }
}

/// Stateless checks over a raw batch. Checks that need stored orders run
/// later, inside the ingestion transaction.
#[derive(Debug, Clone, Copy)]
pub struct BatchValidator {
    max_rows: usize,
    tz: BusinessTz,
}

impl BatchValidator {
    pub fn new(max_rows: usize, tz: BusinessTz) -> Self {
        Self { max_rows, tz }
    }

    pub fn validate(&self, batch: &RawBatch, now: TimeMs) -> Result<ValidatedBatch, ValidationError> {
        if batch.is_empty() {
            return Err(ValidationError::EmptyBatch);
        }
        if batch.len() > self.max_rows {
            return Err(ValidationError::TooManyRows {
                rows: batch.len(),
                max: self.max_rows,
            });
        }

        let mut out = ValidatedBatch::default();
        let mut seen: HashSet<(String, OrderStatus)> = HashSet::new();

        for (idx, raw) in batch.iter().enumerate() {
            let row = self.validate_row(idx + 1, raw, now)?;

            if row.status != OrderStatus::PartiallyCancelled
                && !seen.insert((row.order_id.as_str().to_string(), row.status))
            {
                return Err(ValidationError::DuplicateInBatch {
                    row: row.row_number,
                    order_id: row.order_id.to_string(),
                    status: row.status.to_string(),
                });
            }

            if row.status.is_cancellation() {
                out.cancellations.push(row);
            } else {
                out.new_orders.push(row);
            }
        }

        Ok(out)
    }

    fn validate_row(
        &self,
        row_number: usize,
        raw: &RawRow,
        now: TimeMs,
    ) -> Result<OrderRow, ValidationError> {
        let fields = normalize_fields(row_number, raw)?;
        let get = |name: &str| -> Option<&str> {
            fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
                .filter(|v| !v.is_empty())
        };

        for field in REQUIRED_FIELDS {
            if get(field).is_none() {
                return Err(ValidationError::MissingField {
                    row: row_number,
                    field,
                });
            }
        }
        let required = |name: &'static str| {
            get(name).ok_or(ValidationError::MissingField {
                row: row_number,
                field: name,
            })
        };

        let status_raw = required("order_status")?;
        let status: OrderStatus =
            status_raw
                .parse()
                .map_err(|_| ValidationError::InvalidStatus {
                    row: row_number,
                    value: status_raw.to_string(),
                })?;

        let price_raw = required("total_price")?;
        let total_price = Decimal::from_str_canonical(price_raw)
            .ok()
            .filter(Decimal::is_positive)
            .ok_or_else(|| ValidationError::InvalidPrice {
                row: row_number,
                value: price_raw.to_string(),
            })?;

        let phone = required("phone_number")?;
        if !MASKED_PHONE.is_match(phone) {
            return Err(ValidationError::InvalidPhone {
                row: row_number,
                value: phone.to_string(),
            });
        }

        let created_raw = required("timestamp_created")?;
        let timestamp_created =
            parse_timestamp(created_raw, &self.tz).ok_or_else(|| {
                ValidationError::InvalidTimestamp {
                    row: row_number,
                    field: "timestamp_created",
                    value: created_raw.to_string(),
                }
            })?;
        if timestamp_created.as_ms() > now.as_ms().saturating_add(MAX_FUTURE_SKEW_MS) {
            return Err(ValidationError::FutureTimestamp { row: row_number });
        }

        let timestamp_updated = get("timestamp_updated")
            .map(|v| {
                parse_timestamp(v, &self.tz).ok_or_else(|| ValidationError::InvalidTimestamp {
                    row: row_number,
                    field: "timestamp_updated",
                    value: v.to_string(),
                })
            })
            .transpose()?;

        let text = |name: &str| get(name).map(str::to_string);

        Ok(OrderRow {
            row_number,
            order_id: OrderId::new(required("order_id")?.to_string()),
            status,
            uid: Uid::new(phone.to_string()),
            total_price,
            timestamp_created,
            timestamp_updated,
            name: text("name"),
            category: text("category"),
            buyer_app_id: text("buyer_app_id"),
            seller_id: text("seller_id"),
            domain: text("domain"),
        })
    }
}

fn normalize_fields(
    row_number: usize,
    raw: &RawRow,
) -> Result<Vec<(String, String)>, ValidationError> {
    raw.fields
        .iter()
        .map(|(k, v)| {
            let key = normalize_key(k);
            if REQUIRED_FIELDS.contains(&key.as_str()) || OPTIONAL_FIELDS.contains(&key.as_str()) {
                Ok((key, v.trim().to_string()))
            } else {
                Err(ValidationError::UnknownField {
                    row: row_number,
                    field: k.trim().to_string(),
                })
            }
        })
        .collect()
}

/// Parse an upload timestamp. Values without an offset are local business time.
pub fn parse_timestamp(s: &str, tz: &BusinessTz) -> Option<TimeMs> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(TimeMs::from_datetime(&dt));
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return tz.from_local(naive);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| tz.day_start(d))
}
