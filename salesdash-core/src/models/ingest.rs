use serde::{Deserialize, Serialize};

/// Body of a successful `POST /ingest/csv`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CsvIngestResponse {
    pub processed_rows: u64,
    pub inserted_clients: u64,
    pub inserted_transcripts: u64,
    pub classified_transcripts: u64,
}
