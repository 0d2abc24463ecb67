//! Pre-aggregated payloads served by the `/metrics/*` endpoints.
//!
//! Every collection defaults to empty when the field is absent or `null`;
//! a partial payload renders as "no data" rather than failing the query.

use serde::{Deserialize, Serialize};

use super::client::null_as_empty;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricsOverview {
    pub total_clients: u64,
    pub classified_clients: u64,
    pub open_opportunities: u64,
    pub closed_wins: u64,
}

/// Funnel stage counts, in stage order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricsFunnel {
    pub discovery: u64,
    pub evaluation: u64,
    pub negotiation: u64,
    pub closed: u64,
}

impl MetricsFunnel {
    pub fn stages(&self) -> [(&'static str, u64); 4] {
        [
            ("discovery", self.discovery),
            ("evaluation", self.evaluation),
            ("negotiation", self.negotiation),
            ("closed", self.closed),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MonthlyConversion {
    /// `YYYY-MM`
    #[serde(default)]
    pub month: String,
    #[serde(default)]
    pub closed: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub conversion: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConversionMetrics {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub monthly: Vec<MonthlyConversion>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UrgencyBudgetCell {
    pub urgency: u8,
    pub budget_tier: String,
    pub total: u64,
    pub closed: u64,
    pub conversion: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UrgencyBudgetHeatmap {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub cells: Vec<UrgencyBudgetCell>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UseCaseStat {
    pub use_case: String,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UseCaseDistribution {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub items: Vec<UseCaseStat>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PainStat {
    pub pain: String,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PainDistribution {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub items: Vec<PainStat>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SellerConversionStat {
    pub seller: String,
    pub closed: u64,
    pub total: u64,
    pub conversion: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SellerConversionResponse {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub items: Vec<SellerConversionStat>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OriginStat {
    pub origin: String,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OriginDistribution {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub items: Vec<OriginStat>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AutomatizationOutcome {
    pub automatization: bool,
    pub closed: u64,
    pub open: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AutomatizationOutcomeSeries {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub items: Vec<AutomatizationOutcome>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SentimentConversionStat {
    pub sentiment: i8,
    pub closed: u64,
    pub open: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SentimentConversionSeries {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub items: Vec<SentimentConversionStat>,
}
