//! Batch ingestion: validate, then apply new orders and cancellations in one
//! transaction.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::reversal::ReversalProcessor;
use crate::config::Config;
use crate::db::{LedgerTx, Repository};
use crate::domain::{
    BusinessTz, Decimal, GameId, LedgerEntry, LedgerReason, NewOrderRecord, OrderRow, TimeMs,
    UploaderId,
};
use crate::engine::{derive_game_id, ComputationError, PointsAward, PointsRules, StreakState};
use crate::ingest::{BatchValidator, RawBatch, ValidatedBatch, ValidationError};

/// Why a batch was rejected. Nothing from a rejected batch is persisted.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("row {row}: order {order_id}: {reason}")]
    Referential {
        row: usize,
        order_id: String,
        reason: &'static str,
    },
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("row {row}: {source}")]
    Computation {
        row: usize,
        #[source]
        source: ComputationError,
    },
}

impl IngestError {
    /// Message safe to show the uploader. Storage details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            IngestError::Storage(_) => {
                "upload failed due to a storage error; retry the whole file".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Verdict returned to the uploader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    pub success: bool,
    pub message: String,
}

/// Counts for a committed batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub batch_id: String,
    pub new_orders: usize,
    pub cancellations: usize,
    pub ledger_entries: usize,
}

pub struct BatchIngestor {
    repo: Arc<Repository>,
    validator: BatchValidator,
    rules: PointsRules,
    tz: BusinessTz,
}

impl BatchIngestor {
    pub fn new(repo: Arc<Repository>, config: &Config) -> Self {
        let tz = config.business_tz();
        Self {
            repo,
            validator: BatchValidator::new(config.max_batch_rows, tz),
            rules: config.points_rules(),
            tz,
        }
    }

    /// Ingest one upload and report a single verdict.
    pub async fn ingest_batch(
        &self,
        batch: &RawBatch,
        uploader: &UploaderId,
        now: TimeMs,
    ) -> IngestOutcome {
        match self.ingest(batch, uploader, now).await {
            Ok(report) => IngestOutcome {
                success: true,
                message: format!(
                    "processed {} new orders and {} cancellations",
                    report.new_orders, report.cancellations
                ),
            },
            Err(e) => {
                match &e {
                    IngestError::Storage(err) => {
                        error!(uploader = %uploader, error = %err, "Batch failed on storage")
                    }
                    IngestError::Computation { .. } => {
                        error!(uploader = %uploader, error = %e, rows = batch.len(), "Batch failed in points computation")
                    }
                    _ => warn!(uploader = %uploader, error = %e, "Batch rejected"),
                }
                IngestOutcome {
                    success: false,
                    message: e.public_message(),
                }
            }
        }
    }

    /// Validate and apply a batch atomically.
    pub async fn ingest(
        &self,
        batch: &RawBatch,
        uploader: &UploaderId,
        now: TimeMs,
    ) -> Result<IngestReport, IngestError> {
        if uploader.as_str().trim().is_empty() {
            return Err(ValidationError::MissingUploader.into());
        }
        let validated = self.validator.validate(batch, now)?;

        let batch_id = Uuid::new_v4().to_string();
        let mut tx = self.repo.begin_ledger_tx(now).await?;
        tx.insert_upload_batch(&batch_id, uploader).await?;
        check_not_uploaded(&mut tx, &validated, uploader).await?;

        let mut ledger_entries = 0usize;

        let mut new_orders: Vec<&OrderRow> = validated.new_orders.iter().collect();
        new_orders.sort_by_key(|r| (r.timestamp_created, r.row_number));
        for row in new_orders {
            ledger_entries += self.apply_new_order(&mut tx, &batch_id, uploader, row).await?;
        }

        let reversal = ReversalProcessor::new(self.rules, self.tz);
        for row in &validated.cancellations {
            ledger_entries += reversal.apply(&mut tx, &batch_id, uploader, row).await?;
        }

        tx.finish_upload_batch(
            &batch_id,
            validated.new_orders.len(),
            validated.cancellations.len(),
        )
        .await?;
        tx.commit().await?;

        info!(
            batch_id = %batch_id,
            uploader = %uploader,
            new_orders = validated.new_orders.len(),
            cancellations = validated.cancellations.len(),
            ledger_entries,
            "Batch ingested"
        );

        Ok(IngestReport {
            batch_id,
            new_orders: validated.new_orders.len(),
            cancellations: validated.cancellations.len(),
            ledger_entries,
        })
    }

    async fn apply_new_order(
        &self,
        tx: &mut LedgerTx,
        batch_id: &str,
        uploader: &UploaderId,
        row: &OrderRow,
    ) -> Result<usize, IngestError> {
        let game_id = match tx.find_latest_order(&row.uid).await? {
            Some(existing) => existing.game_id,
            None => derive_game_id(&row.uid),
        };

        let day = self.tz.local_day(row.timestamp_created);
        let prev = tx
            .find_streak_predecessor(&row.uid, row.timestamp_created)
            .await?
            .map(|o| StreakState {
                count: o.streak_count,
                last_day: o.last_streak_date.unwrap_or(o.order_day),
            });
        let streak = StreakState::advance(prev, day);
        let same_day = tx
            .count_same_day_orders(&row.uid, day, row.timestamp_created)
            .await?;

        let gmv = row.gmv();
        let award = self
            .rules
            .new_order(gmv, streak.count, same_day)
            .map_err(|source| IngestError::Computation {
                row: row.row_number,
                source,
            })?;

        tx.insert_order(
            batch_id,
            uploader,
            &NewOrderRecord {
                row: row.clone(),
                game_id: game_id.clone(),
                order_day: day,
                points: award.total(),
                gmv,
                streak_count: streak.count,
                last_streak_date: Some(streak.last_day),
                same_day_order_count: same_day,
            },
        )
        .await?;

        debug!(
            order_id = %row.order_id,
            streak = streak.count,
            same_day,
            points = award.total(),
            "Order awarded"
        );

        let entries = award_entries(
            &award,
            gmv,
            LedgerReason::BasePoints,
            row,
            &game_id,
            &self.tz,
        );
        Ok(tx.append_ledger_entries(&entries).await?)
    }
}

/// Per-uploader uniqueness of `(order_id, status)` against stored rows.
async fn check_not_uploaded(
    tx: &mut LedgerTx,
    batch: &ValidatedBatch,
    uploader: &UploaderId,
) -> Result<(), IngestError> {
    for row in batch.unique_keyed_rows() {
        if tx
            .order_status_exists(&row.order_id, row.status, uploader)
            .await?
        {
            return Err(ValidationError::AlreadyUploaded {
                row: row.row_number,
                order_id: row.order_id.to_string(),
                status: row.status.to_string(),
            }
            .into());
        }
    }
    Ok(())
}

/// Ledger entries for an award caused by `row`.
///
/// The GMV delta rides on the first component. With no components a single
/// `fallback` entry carries it; a zero/zero entry is dropped on write.
pub(crate) fn award_entries(
    award: &PointsAward,
    gmv_delta: Decimal,
    fallback: LedgerReason,
    row: &OrderRow,
    game_id: &GameId,
    tz: &BusinessTz,
) -> Vec<LedgerEntry> {
    let entry = |reason: LedgerReason, points: i64, gmv: Decimal| LedgerEntry {
        order_id: row.order_id.clone(),
        game_id: game_id.clone(),
        gmv,
        points,
        reason,
        effective_at: row.timestamp_created,
        effective_day: tz.local_day(row.timestamp_created),
    };

    if award.components().is_empty() {
        return vec![entry(fallback, 0, gmv_delta)];
    }

    award
        .components()
        .iter()
        .enumerate()
        .map(|(idx, c)| {
            let gmv = if idx == 0 { gmv_delta } else { Decimal::zero() };
            entry(c.reason, c.points, gmv)
        })
        .collect()
}
