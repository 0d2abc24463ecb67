pub mod classification;
pub mod client;
pub mod ingest;
pub mod metrics;

pub use classification::Classification;
pub use client::{Client, ClientListResponse, Transcript};
pub use ingest::CsvIngestResponse;
pub use metrics::{
    AutomatizationOutcome, AutomatizationOutcomeSeries, ConversionMetrics, MetricsFunnel,
    MetricsOverview, MonthlyConversion, OriginDistribution, OriginStat, PainDistribution,
    PainStat, SellerConversionResponse, SellerConversionStat, SentimentConversionSeries,
    SentimentConversionStat, UrgencyBudgetCell, UrgencyBudgetHeatmap, UseCaseDistribution,
    UseCaseStat,
};
