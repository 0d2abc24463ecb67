//! Filter state shared by every view of the dashboard.
//!
//! `FilterStore` is a cheap handle over a `watch` channel: reads are
//! synchronous snapshots, each setter replaces exactly one field, and views
//! that care about changes subscribe to the receiver side.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Sentinel meaning "no restriction" for seller and segment.
pub const ALL: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DateRange {
    #[serde(rename = "all")]
    All,
    #[serde(rename = "7d")]
    Last7Days,
    #[default]
    #[serde(rename = "30d")]
    Last30Days,
    #[serde(rename = "90d")]
    Last90Days,
}

impl DateRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateRange::All => "all",
            DateRange::Last7Days => "7d",
            DateRange::Last30Days => "30d",
            DateRange::Last90Days => "90d",
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DateRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "all" => Ok(DateRange::All),
            "7d" => Ok(DateRange::Last7Days),
            "30d" => Ok(DateRange::Last30Days),
            "90d" => Ok(DateRange::Last90Days),
            other => Err(format!(
                "unknown date range '{}' (expected all, 7d, 30d or 90d)",
                other
            )),
        }
    }
}

/// Status filter of the use-case distribution query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UseCaseStatus {
    #[default]
    All,
    Closed,
    Open,
}

impl UseCaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UseCaseStatus::All => "all",
            UseCaseStatus::Closed => "closed",
            UseCaseStatus::Open => "open",
        }
    }
}

impl FromStr for UseCaseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "all" => Ok(UseCaseStatus::All),
            "closed" => Ok(UseCaseStatus::Closed),
            "open" => Ok(UseCaseStatus::Open),
            other => Err(format!(
                "unknown status '{}' (expected all, closed or open)",
                other
            )),
        }
    }
}

/// Current selection of the filter controls.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterSelection {
    pub date_range: DateRange,
    pub seller: String,
    pub segment: String,
}

impl Default for FilterSelection {
    fn default() -> Self {
        Self {
            date_range: DateRange::default(),
            seller: ALL.to_string(),
            segment: ALL.to_string(),
        }
    }
}

/// Parameter tuple of the clients query, and its cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientFilters {
    pub date_range: DateRange,
    pub seller: String,
    pub segment: String,
}

impl Default for ClientFilters {
    fn default() -> Self {
        FilterSelection::default().into()
    }
}

impl From<FilterSelection> for ClientFilters {
    fn from(s: FilterSelection) -> Self {
        Self {
            date_range: s.date_range,
            seller: s.seller,
            segment: s.segment,
        }
    }
}

impl From<&FilterSelection> for ClientFilters {
    fn from(s: &FilterSelection) -> Self {
        s.clone().into()
    }
}

impl ClientFilters {
    /// Wire parameters of `GET /clients`. "all" values are left out; the
    /// segment only partitions the cache.
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if self.seller != ALL {
            params.push(("seller", self.seller.clone()));
        }
        if self.date_range != DateRange::All {
            params.push(("date_range", self.date_range.as_str().to_string()));
        }
        params
    }
}

/// Process-wide filter state. Clones share the same underlying selection.
#[derive(Debug, Clone)]
pub struct FilterStore {
    tx: Arc<watch::Sender<FilterSelection>>,
}

impl Default for FilterStore {
    fn default() -> Self {
        Self::new(FilterSelection::default())
    }
}

impl FilterStore {
    pub fn new(initial: FilterSelection) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn selection(&self) -> FilterSelection {
        self.tx.borrow().clone()
    }

    pub fn client_filters(&self) -> ClientFilters {
        ClientFilters::from(&*self.tx.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<FilterSelection> {
        self.tx.subscribe()
    }

    pub fn set_date_range(&self, value: DateRange) {
        self.replace(|s| &mut s.date_range, value);
    }

    pub fn set_seller(&self, value: impl Into<String>) {
        self.replace(|s| &mut s.seller, value.into());
    }

    pub fn set_segment(&self, value: impl Into<String>) {
        self.replace(|s| &mut s.segment, value.into());
    }

    fn replace<T: PartialEq>(&self, field: impl FnOnce(&mut FilterSelection) -> &mut T, value: T) {
        let changed = self.tx.send_if_modified(|selection| {
            let slot = field(selection);
            if *slot == value {
                false
            } else {
                *slot = value;
                true
            }
        });
        if changed {
            let selection = self.selection();
            tracing::debug!(?selection, "filter selection updated");
        }
    }
}
