//! Dashboard REST API client.
//!
//! `SalesApi` is the seam the query layer talks to; `HttpApiClient` is the
//! reqwest implementation against the dashboard backend. No retries happen
//! here or in the query layer above it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::filters::{ClientFilters, UseCaseStatus};
use crate::models::{
    AutomatizationOutcomeSeries, ClientListResponse, ConversionMetrics, CsvIngestResponse,
    MetricsFunnel, MetricsOverview, OriginDistribution, PainDistribution,
    SellerConversionResponse, SentimentConversionSeries, UrgencyBudgetHeatmap,
    UseCaseDistribution,
};

// ============================================================================
// SalesApi trait
// ============================================================================

/// Typed access to every endpoint the dashboard reads or posts to.
#[async_trait]
pub trait SalesApi: Send + Sync {
    async fn clients(&self, filters: &ClientFilters) -> Result<ClientListResponse, ApiError>;

    async fn overview(&self) -> Result<MetricsOverview, ApiError>;

    async fn funnel(&self) -> Result<MetricsFunnel, ApiError>;

    async fn conversions(&self) -> Result<ConversionMetrics, ApiError>;

    async fn urgency_budget(&self) -> Result<UrgencyBudgetHeatmap, ApiError>;

    async fn use_cases(&self, status: UseCaseStatus) -> Result<UseCaseDistribution, ApiError>;

    async fn pains(&self) -> Result<PainDistribution, ApiError>;

    async fn seller_conversion(&self) -> Result<SellerConversionResponse, ApiError>;

    async fn origins(&self) -> Result<OriginDistribution, ApiError>;

    async fn automatization_outcomes(&self) -> Result<AutomatizationOutcomeSeries, ApiError>;

    async fn sentiment_conversion(&self) -> Result<SentimentConversionSeries, ApiError>;

    /// Upload a CSV of clients/transcripts for server-side ingestion.
    async fn ingest_csv(
        &self,
        file_name: &str,
        contents: Vec<u8>,
    ) -> Result<CsvIngestResponse, ApiError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Wire structs (private)
// ============================================================================

/// Error body used by the backend: `{"detail": "..."}`. Validation errors send
/// a list under `detail`; only string details are surfaced.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

// ============================================================================
// HttpApiClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct HttpApiClient {
    client: Client,
    base_url: String,
}

impl HttpApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        Self::with_base_url(config.base_url.clone(), config.timeout())
    }

    /// Create a client against an explicit base URL (tests, CLI overrides).
    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ApiError::InvalidRequest(format!(
                "base URL must start with http:// or https://, got '{}'",
                base_url
            )));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        tracing::debug!(url = %url, ?params, "GET");

        let response = self.client.get(&url).query(params).send().await?;
        decode(response).await
    }
}

/// Turn a response into `T`, mapping non-2xx statuses to `ApiError::Status`.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|e| e.detail)
            .and_then(|d| d.as_str().map(str::to_string));

        tracing::warn!(status = status.as_u16(), detail = ?detail, "dashboard API error");

        return Err(ApiError::Status {
            status: status.as_u16(),
            detail,
        });
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
}

#[async_trait]
impl SalesApi for HttpApiClient {
    async fn clients(&self, filters: &ClientFilters) -> Result<ClientListResponse, ApiError> {
        let mut resp: ClientListResponse =
            self.get_json("/clients", &filters.query_params()).await?;

        let report = resp.sanitize();
        if !report.is_clean() {
            tracing::warn!(
                orphan_transcripts = report.orphan_transcripts,
                clamped_scores = report.clamped_scores,
                "clients payload violated record invariants; corrected"
            );
        }
        Ok(resp)
    }

    async fn overview(&self) -> Result<MetricsOverview, ApiError> {
        self.get_json("/metrics/overview", &[]).await
    }

    async fn funnel(&self) -> Result<MetricsFunnel, ApiError> {
        self.get_json("/metrics/funnel", &[]).await
    }

    async fn conversions(&self) -> Result<ConversionMetrics, ApiError> {
        self.get_json("/metrics/conversions", &[]).await
    }

    async fn urgency_budget(&self) -> Result<UrgencyBudgetHeatmap, ApiError> {
        self.get_json("/metrics/urgency-budget", &[]).await
    }

    async fn use_cases(&self, status: UseCaseStatus) -> Result<UseCaseDistribution, ApiError> {
        self.get_json("/metrics/use-cases", &[("status", status.as_str().to_string())])
            .await
    }

    async fn pains(&self) -> Result<PainDistribution, ApiError> {
        self.get_json("/metrics/pains/distribution", &[]).await
    }

    async fn seller_conversion(&self) -> Result<SellerConversionResponse, ApiError> {
        self.get_json("/metrics/seller-conversion", &[]).await
    }

    async fn origins(&self) -> Result<OriginDistribution, ApiError> {
        self.get_json("/metrics/origins", &[]).await
    }

    async fn automatization_outcomes(&self) -> Result<AutomatizationOutcomeSeries, ApiError> {
        self.get_json("/metrics/automatization-outcomes", &[]).await
    }

    async fn sentiment_conversion(&self) -> Result<SentimentConversionSeries, ApiError> {
        self.get_json("/metrics/sentiment-conversion", &[]).await
    }

    async fn ingest_csv(
        &self,
        file_name: &str,
        contents: Vec<u8>,
    ) -> Result<CsvIngestResponse, ApiError> {
        let url = self.url("/ingest/csv");
        let size = contents.len();

        let part = Part::bytes(contents)
            .file_name(file_name.to_string())
            .mime_str("text/csv")?;
        let form = Form::new().part("upload", part);

        tracing::info!(url = %url, file = file_name, bytes = size, "uploading CSV");

        let response = self.client.post(&url).multipart(form).send().await?;
        decode(response).await
    }

    fn name(&self) -> &str {
        "http"
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::DateRange;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> HttpApiClient {
        HttpApiClient::with_base_url(server.uri(), Duration::from_secs(5))
            .expect("Failed to create client")
    }

    #[test]
    fn test_rejects_base_url_without_scheme() {
        let result = HttpApiClient::with_base_url("localhost:8000", Duration::from_secs(1));
        match result {
            Err(ApiError::InvalidRequest(msg)) => assert!(msg.contains("localhost:8000")),
            other => panic!("Expected InvalidRequest, got {:?}", other),
        }
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client =
            HttpApiClient::with_base_url("http://api.local/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://api.local");
        assert_eq!(client.url("/clients"), "http://api.local/clients");
    }

    #[tokio::test]
    async fn test_clients_sends_filter_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/clients"))
            .and(query_param("seller", "Sara"))
            .and(query_param("date_range", "7d"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total": 1,
                "items": [{
                    "id": 1,
                    "name": "Acme",
                    "transcripts": [{
                        "id": 10, "client_id": 1, "assigned_seller": "Sara",
                        "meeting_date": "2024-04-02T15:00:00", "closed": true
                    }]
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let filters = ClientFilters {
            date_range: DateRange::Last7Days,
            seller: "Sara".to_string(),
            segment: "Enterprise".to_string(),
        };
        let resp = client_for(&server).clients(&filters).await.expect("clients");
        assert_eq!(resp.total, 1);
        assert_eq!(resp.items[0].transcripts[0].assigned_seller.as_deref(), Some("Sara"));
    }

    #[tokio::test]
    async fn test_clients_omits_all_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/clients"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total": 0, "items": []
            })))
            .mount(&server)
            .await;

        let filters = ClientFilters {
            date_range: DateRange::All,
            ..ClientFilters::default()
        };
        client_for(&server).clients(&filters).await.expect("clients");

        let requests = server.received_requests().await.expect("recording enabled");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url.query(), None);
    }

    #[tokio::test]
    async fn test_clients_are_sanitized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/clients"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total": 1,
                "items": [{
                    "id": 5, "name": "Globex",
                    "transcripts": [
                        { "id": 1, "client_id": 6, "closed": false },
                        { "id": 2, "client_id": 5, "closed": false,
                          "classification": { "sentiment": 1, "urgency": 2,
                                              "fit_score": 2.0, "close_probability": -1.0 } }
                    ]
                }]
            })))
            .mount(&server)
            .await;

        let resp = client_for(&server)
            .clients(&ClientFilters::default())
            .await
            .expect("clients");
        let transcripts = &resp.items[0].transcripts;
        assert_eq!(transcripts.len(), 1);
        let c = transcripts[0].classification.as_ref().unwrap();
        assert_eq!((c.fit_score, c.close_probability), (1.0, 0.0));
    }

    #[tokio::test]
    async fn test_use_cases_sends_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/metrics/use-cases"))
            .and(query_param("status", "closed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{ "use_case": "Lead qualification", "total": 4 }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dist = client_for(&server)
            .use_cases(UseCaseStatus::Closed)
            .await
            .expect("use cases");
        assert_eq!(dist.items[0].total, 4);
    }

    #[tokio::test]
    async fn test_status_error_surfaces_detail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/metrics/overview"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "detail": "database unavailable"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).overview().await.unwrap_err();
        assert_eq!(
            err,
            ApiError::Status {
                status: 503,
                detail: Some("database unavailable".to_string())
            }
        );
    }

    #[tokio::test]
    async fn test_status_error_without_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let err = client_for(&server).funnel().await.unwrap_err();
        assert_eq!(
            err,
            ApiError::Status {
                status: 404,
                detail: None
            }
        );
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/metrics/funnel"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"discovery\": \"many\"}"))
            .mount(&server)
            .await;

        let err = client_for(&server).funnel().await.unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_transport_error_when_unreachable() {
        // Nothing listens on port 1.
        let client =
            HttpApiClient::with_base_url("http://127.0.0.1:1", Duration::from_secs(2)).unwrap();
        let err = client.pains().await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_ingest_csv_posts_multipart_upload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ingest/csv"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "processed_rows": 10,
                "inserted_clients": 8,
                "inserted_transcripts": 8,
                "classified_transcripts": 6
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resp = client_for(&server)
            .ingest_csv("leads.csv", b"name,email\nAcme,a@acme.io\n".to_vec())
            .await
            .expect("ingest");
        assert_eq!(resp.processed_rows, 10);
        assert_eq!(resp.inserted_clients, 8);

        let requests = server.received_requests().await.expect("recording enabled");
        let content_type = requests[0]
            .headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(content_type.starts_with("multipart/form-data"), "{}", content_type);
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("name=\"upload\""));
        assert!(body.contains("filename=\"leads.csv\""));
    }
}
