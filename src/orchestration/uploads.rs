//! Uploader-scoped order history.

use std::sync::Arc;
use thiserror::Error;

use crate::db::Repository;
use crate::domain::{OrderRecord, UploaderId};
use crate::ingest::write_orders_csv;

pub const DEFAULT_PAGE_LIMIT: u32 = 50;
pub const MAX_PAGE_LIMIT: u32 = 500;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("csv error: {0}")]
    Csv(#[from] ::csv::Error),
}

/// One page of an uploader's orders.
#[derive(Debug, Clone)]
pub struct UploadPage {
    pub orders: Vec<OrderRecord>,
    pub page: u32,
    pub limit: u32,
    pub total: i64,
}

pub struct UploadHistory {
    repo: Arc<Repository>,
}

impl UploadHistory {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    /// Newest first. `page` is 1-based; `limit` is clamped to `1..=MAX_PAGE_LIMIT`.
    pub async fn list_uploads(
        &self,
        uploader: &UploaderId,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<UploadPage, sqlx::Error> {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
        let (orders, total) = self.repo.list_uploads(uploader, page, limit).await?;
        Ok(UploadPage {
            orders,
            page,
            limit,
            total,
        })
    }

    pub async fn export_orders_csv(&self, uploader: &UploaderId) -> Result<String, ExportError> {
        let orders = self.repo.all_uploads(uploader).await?;
        Ok(write_orders_csv(&orders)?)
    }
}
