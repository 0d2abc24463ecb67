//! Fetch layer of the dashboard: one keyed query per endpoint.
//!
//! `Dashboard` owns a `QueryCache` per endpoint, keyed by that endpoint's full
//! parameter tuple, and is the only thing that calls the `SalesApi`.
//! `ClientsView` binds the clients query to the filter store.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::api::{HttpApiClient, SalesApi};
use crate::config::SalesdashConfig;
use crate::error::{ApiError, SalesdashError};
use crate::filters::{ClientFilters, FilterSelection, FilterStore, UseCaseStatus};
use crate::models::{
    AutomatizationOutcomeSeries, ClientListResponse, ConversionMetrics, CsvIngestResponse,
    MetricsFunnel, MetricsOverview, OriginDistribution, PainDistribution,
    SellerConversionResponse, SentimentConversionSeries, UrgencyBudgetHeatmap,
    UseCaseDistribution,
};
use crate::query::{QueryCache, QueryState};

pub struct Dashboard {
    api: Arc<dyn SalesApi>,
    clients: QueryCache<ClientFilters, ClientListResponse>,
    overview: QueryCache<(), MetricsOverview>,
    funnel: QueryCache<(), MetricsFunnel>,
    conversions: QueryCache<(), ConversionMetrics>,
    urgency_budget: QueryCache<(), UrgencyBudgetHeatmap>,
    use_cases: QueryCache<UseCaseStatus, UseCaseDistribution>,
    pains: QueryCache<(), PainDistribution>,
    seller_conversion: QueryCache<(), SellerConversionResponse>,
    origins: QueryCache<(), OriginDistribution>,
    automatization: QueryCache<(), AutomatizationOutcomeSeries>,
    sentiment_conversion: QueryCache<(), SentimentConversionSeries>,
}

impl Dashboard {
    pub fn new(api: Arc<dyn SalesApi>, stale_after: Option<Duration>) -> Self {
        tracing::debug!(backend = api.name(), ?stale_after, "dashboard queries ready");
        Self {
            api,
            clients: QueryCache::new("clients", stale_after),
            overview: QueryCache::new("metrics/overview", stale_after),
            funnel: QueryCache::new("metrics/funnel", stale_after),
            conversions: QueryCache::new("metrics/conversions", stale_after),
            urgency_budget: QueryCache::new("metrics/urgency-budget", stale_after),
            use_cases: QueryCache::new("metrics/use-cases", stale_after),
            pains: QueryCache::new("metrics/pains/distribution", stale_after),
            seller_conversion: QueryCache::new("metrics/seller-conversion", stale_after),
            origins: QueryCache::new("metrics/origins", stale_after),
            automatization: QueryCache::new("metrics/automatization-outcomes", stale_after),
            sentiment_conversion: QueryCache::new("metrics/sentiment-conversion", stale_after),
        }
    }

    /// Dashboard over the HTTP backend named in `config`.
    pub fn from_config(config: &SalesdashConfig) -> Result<Self, SalesdashError> {
        let api = HttpApiClient::new(&config.api)?;
        Ok(Self::new(Arc::new(api), config.query.stale_after()))
    }

    // --- clients ---

    pub async fn clients(&self, filters: &ClientFilters) -> Result<ClientListResponse, ApiError> {
        let api = self.api.clone();
        let key = filters.clone();
        let filters = filters.clone();
        self.clients
            .fetch(key, move || async move { api.clients(&filters).await })
            .await
    }

    pub fn clients_state(&self, filters: &ClientFilters) -> QueryState<ClientListResponse> {
        self.clients.state(filters)
    }

    pub fn invalidate_clients(&self, filters: &ClientFilters) {
        self.clients.invalidate(filters);
    }

    // --- metrics ---

    pub async fn overview(&self) -> Result<MetricsOverview, ApiError> {
        let api = self.api.clone();
        self.overview
            .fetch((), move || async move { api.overview().await })
            .await
    }

    pub fn overview_state(&self) -> QueryState<MetricsOverview> {
        self.overview.state(&())
    }

    pub async fn funnel(&self) -> Result<MetricsFunnel, ApiError> {
        let api = self.api.clone();
        self.funnel
            .fetch((), move || async move { api.funnel().await })
            .await
    }

    pub fn funnel_state(&self) -> QueryState<MetricsFunnel> {
        self.funnel.state(&())
    }

    pub async fn conversions(&self) -> Result<ConversionMetrics, ApiError> {
        let api = self.api.clone();
        self.conversions
            .fetch((), move || async move { api.conversions().await })
            .await
    }

    pub fn conversions_state(&self) -> QueryState<ConversionMetrics> {
        self.conversions.state(&())
    }

    pub async fn urgency_budget(&self) -> Result<UrgencyBudgetHeatmap, ApiError> {
        let api = self.api.clone();
        self.urgency_budget
            .fetch((), move || async move { api.urgency_budget().await })
            .await
    }

    pub fn urgency_budget_state(&self) -> QueryState<UrgencyBudgetHeatmap> {
        self.urgency_budget.state(&())
    }

    pub async fn use_cases(&self, status: UseCaseStatus) -> Result<UseCaseDistribution, ApiError> {
        let api = self.api.clone();
        self.use_cases
            .fetch(status, move || async move { api.use_cases(status).await })
            .await
    }

    pub fn use_cases_state(&self, status: UseCaseStatus) -> QueryState<UseCaseDistribution> {
        self.use_cases.state(&status)
    }

    pub async fn pains(&self) -> Result<PainDistribution, ApiError> {
        let api = self.api.clone();
        self.pains
            .fetch((), move || async move { api.pains().await })
            .await
    }

    pub fn pains_state(&self) -> QueryState<PainDistribution> {
        self.pains.state(&())
    }

    pub async fn seller_conversion(&self) -> Result<SellerConversionResponse, ApiError> {
        let api = self.api.clone();
        self.seller_conversion
            .fetch((), move || async move { api.seller_conversion().await })
            .await
    }

    pub fn seller_conversion_state(&self) -> QueryState<SellerConversionResponse> {
        self.seller_conversion.state(&())
    }

    pub async fn origins(&self) -> Result<OriginDistribution, ApiError> {
        let api = self.api.clone();
        self.origins
            .fetch((), move || async move { api.origins().await })
            .await
    }

    pub fn origins_state(&self) -> QueryState<OriginDistribution> {
        self.origins.state(&())
    }

    pub async fn automatization_outcomes(&self) -> Result<AutomatizationOutcomeSeries, ApiError> {
        let api = self.api.clone();
        self.automatization
            .fetch((), move || async move { api.automatization_outcomes().await })
            .await
    }

    pub fn automatization_outcomes_state(&self) -> QueryState<AutomatizationOutcomeSeries> {
        self.automatization.state(&())
    }

    pub async fn sentiment_conversion(&self) -> Result<SentimentConversionSeries, ApiError> {
        let api = self.api.clone();
        self.sentiment_conversion
            .fetch((), move || async move { api.sentiment_conversion().await })
            .await
    }

    pub fn sentiment_conversion_state(&self) -> QueryState<SentimentConversionSeries> {
        self.sentiment_conversion.state(&())
    }

    // --- ingestion ---

    /// Upload a CSV. Success invalidates every query, since new rows move
    /// every metric.
    pub async fn ingest_csv(
        &self,
        file_name: &str,
        contents: Vec<u8>,
    ) -> Result<CsvIngestResponse, ApiError> {
        let resp = self.api.ingest_csv(file_name, contents).await?;
        tracing::info!(
            processed_rows = resp.processed_rows,
            inserted_clients = resp.inserted_clients,
            "CSV ingested; invalidating dashboard queries"
        );
        self.invalidate_all();
        Ok(resp)
    }

    pub fn invalidate_all(&self) {
        self.clients.clear();
        self.overview.clear();
        self.funnel.clear();
        self.conversions.clear();
        self.urgency_budget.clear();
        self.use_cases.clear();
        self.pains.clear();
        self.seller_conversion.clear();
        self.origins.clear();
        self.automatization.clear();
        self.sentiment_conversion.clear();
    }
}

// ============================================================================
// ClientsView
// ============================================================================

/// Outcome of [`ClientsView::refresh`].
#[derive(Debug, Clone, PartialEq)]
pub enum ViewUpdate {
    /// The response matched the current selection and is now shown.
    Applied,
    /// The selection changed while the request was in flight; the response
    /// was not applied.
    Superseded,
    Failed(ApiError),
}

/// Clients data currently on display, with the filters it was fetched for.
#[derive(Debug, Clone, PartialEq)]
pub struct ShownClients {
    pub filters: ClientFilters,
    pub data: ClientListResponse,
}

/// The clients table bound to the filter store.
pub struct ClientsView {
    dashboard: Arc<Dashboard>,
    selection: watch::Receiver<FilterSelection>,
    shown: Option<ShownClients>,
}

impl ClientsView {
    pub fn new(dashboard: Arc<Dashboard>, store: &FilterStore) -> Self {
        Self {
            dashboard,
            selection: store.subscribe(),
            shown: None,
        }
    }

    pub fn shown(&self) -> Option<&ShownClients> {
        self.shown.as_ref()
    }

    /// Fetch clients for the current selection and show them, unless the
    /// selection moves on before the response arrives. A superseded response
    /// still lands in the cache under its own filters.
    pub async fn refresh(&mut self) -> ViewUpdate {
        let filters = ClientFilters::from(&*self.selection.borrow_and_update());

        // Runs as its own task so an abandoned request still fills the cache.
        let request = {
            let dashboard = self.dashboard.clone();
            let filters = filters.clone();
            tokio::spawn(async move { dashboard.clients(&filters).await })
        };

        let outcome = {
            let changed = self.selection.changed();
            tokio::select! {
                joined = request => Some(joined.unwrap_or_else(|e| {
                    Err(ApiError::Transport(format!("clients request task failed: {}", e)))
                })),
                Ok(()) = changed => None,
            }
        };

        match outcome {
            Some(Ok(data)) => {
                self.shown = Some(ShownClients { filters, data });
                ViewUpdate::Applied
            }
            Some(Err(e)) => ViewUpdate::Failed(e),
            None => {
                tracing::debug!(filters = ?filters, "selection changed mid-flight; dropping clients response");
                ViewUpdate::Superseded
            }
        }
    }

    /// Refresh until a response for the then-current selection is applied
    /// or a request fails.
    pub async fn refresh_latest(&mut self) -> ViewUpdate {
        loop {
            match self.refresh().await {
                ViewUpdate::Superseded => continue,
                other => return other,
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
