use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::domain::{OrderRecord, TimeMs, UploaderId};
use crate::error::AppError;
use crate::ingest::parse_batch;
use crate::orchestration::IngestOutcome;

pub const UPLOADER_HEADER: &str = "x-uploader-id";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadsQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadsResponse {
    pub orders: Vec<OrderRecord>,
    pub page: u32,
    pub limit: u32,
    pub total: i64,
}

fn uploader_header(headers: &HeaderMap) -> Option<UploaderId> {
    headers
        .get(UPLOADER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| UploaderId::new(s.to_string()))
}

fn require_uploader(headers: &HeaderMap) -> Result<UploaderId, AppError> {
    uploader_header(headers)
        .ok_or_else(|| AppError::BadRequest(format!("{} header is required", UPLOADER_HEADER)))
}

/// Accept one CSV file. The whole file is applied or nothing is.
pub async fn upload_orders(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<IngestOutcome>) {
    let uploader = uploader_header(&headers).unwrap_or_else(|| UploaderId::new(String::new()));

    let outcome = match parse_batch(&body) {
        Ok(batch) => {
            state
                .ingestor
                .ingest_batch(&batch, &uploader, TimeMs::now())
                .await
        }
        Err(e) => {
            tracing::warn!(uploader = %uploader, error = %e, "Upload is not valid CSV");
            IngestOutcome {
                success: false,
                message: e.to_string(),
            }
        }
    };

    let status = if outcome.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(outcome))
}

pub async fn list_uploads(
    Query(params): Query<UploadsQuery>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UploadsResponse>, AppError> {
    let uploader = require_uploader(&headers)?;
    let page = state
        .uploads
        .list_uploads(&uploader, params.page, params.limit)
        .await?;

    Ok(Json(UploadsResponse {
        orders: page.orders,
        page: page.page,
        limit: page.limit,
        total: page.total,
    }))
}

pub async fn export_uploads(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let uploader = require_uploader(&headers)?;
    let csv = state.uploads.export_orders_csv(&uploader).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"orders.csv\""),
        ],
        csv,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_uploader_header_trimmed() {
        let mut headers = HeaderMap::new();
        headers.insert(UPLOADER_HEADER, HeaderValue::from_static("  seller-7 "));
        assert_eq!(uploader_header(&headers).unwrap().as_str(), "seller-7");
    }

    #[test]
    fn test_blank_uploader_header_is_missing() {
        let mut headers = HeaderMap::new();
        headers.insert(UPLOADER_HEADER, HeaderValue::from_static("   "));
        assert!(uploader_header(&headers).is_none());
        assert!(matches!(
            require_uploader(&headers),
            Err(AppError::BadRequest(_))
        ));
    }
}
