//! CSV ingestion outcome as the user sees it.

use serde::Serialize;

use crate::error::ApiError;
use crate::models::CsvIngestResponse;

pub const INGEST_FALLBACK_MESSAGE: &str = "Failed to load the CSV.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Success,
    Error,
}

/// Notification shown after an upload attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestNotice {
    pub kind: NoticeKind,
    pub message: String,
}

impl IngestNotice {
    pub fn success(resp: &CsvIngestResponse) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: format!(
                "Processed {} rows: {} clients inserted, {} transcripts inserted, {} classified.",
                resp.processed_rows,
                resp.inserted_clients,
                resp.inserted_transcripts,
                resp.classified_transcripts
            ),
        }
    }

    pub fn failure(error: &ApiError) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: error.user_message(INGEST_FALLBACK_MESSAGE),
        }
    }

    /// Rows the server skipped do not make the upload a failure; only a
    /// failed request does.
    pub fn from_result(result: &Result<CsvIngestResponse, ApiError>) -> Self {
        match result {
            Ok(resp) => Self::success(resp),
            Err(e) => Self::failure(e),
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind == NoticeKind::Success
    }
}
