use serde::{Deserialize, Serialize};

use super::classification::Classification;

/// A recorded sales call tied to one client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub id: i64,
    pub client_id: i64,
    #[serde(default)]
    pub assigned_seller: Option<String>,
    /// Kept as sent by the API; parsed leniently by the aggregators.
    #[serde(default)]
    pub meeting_date: Option<String>,
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub classification: Option<Classification>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub email_hash: Option<String>,
    #[serde(default)]
    pub phone_hash: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub transcripts: Vec<Transcript>,
}

/// Body of `GET /clients`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClientListResponse {
    #[serde(default)]
    pub total: u64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub items: Vec<Client>,
}

/// What [`ClientListResponse::sanitize`] had to correct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SanitizeReport {
    pub orphan_transcripts: usize,
    pub clamped_scores: usize,
}

impl SanitizeReport {
    pub fn is_clean(&self) -> bool {
        self.orphan_transcripts == 0 && self.clamped_scores == 0
    }
}

impl ClientListResponse {
    /// Enforce the record invariants on a freshly decoded payload: transcripts
    /// must belong to the client they are nested under, and classification
    /// scores must lie in [0, 1].
    pub fn sanitize(&mut self) -> SanitizeReport {
        let mut report = SanitizeReport::default();

        for client in &mut self.items {
            let client_id = client.id;
            let before = client.transcripts.len();
            client.transcripts.retain(|t| t.client_id == client_id);
            report.orphan_transcripts += before - client.transcripts.len();

            for transcript in &mut client.transcripts {
                if let Some(classification) = transcript.classification.as_mut() {
                    if classification.clamp_scores() {
                        report.clamped_scores += 1;
                    }
                }
            }
        }

        report
    }
}

pub(crate) fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
