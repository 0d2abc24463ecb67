//! Derived metrics: pure projections from API payloads to chart-ready shapes.
//!
//! Nothing here performs I/O or returns an error: missing or malformed input
//! degrades to `None`, `0.0` or an empty list.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

use crate::filters::ALL;
use crate::models::{
    Client, MonthlyConversion, OriginDistribution, SellerConversionStat, Transcript,
    UrgencyBudgetHeatmap,
};

pub const URGENCY_LEVELS: [u8; 4] = [0, 1, 2, 3];
pub const BUDGET_TIERS: [&str; 3] = ["Low", "Med", "High"];

// ============================================================================
// Transcripts
// ============================================================================

/// Parse a meeting date as sent by the API. Naive timestamps are taken as UTC.
pub fn parse_meeting_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// The transcript with the latest meeting date.
///
/// Transcripts without a parseable date sort as earliest and are never picked;
/// `None` when no transcript has one. On equal dates the one listed later wins.
pub fn latest_transcript(client: &Client) -> Option<&Transcript> {
    let mut best: Option<(DateTime<Utc>, &Transcript)> = None;
    for transcript in &client.transcripts {
        let Some(at) = transcript
            .meeting_date
            .as_deref()
            .and_then(parse_meeting_date)
        else {
            continue;
        };
        match best {
            Some((current, _)) if at < current => {}
            _ => best = Some((at, transcript)),
        }
    }
    best.map(|(_, t)| t)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptStatus {
    Closed,
    Open,
}

/// Closed/open status from the latest transcript; open when there is none.
pub fn transcript_status(client: &Client) -> TranscriptStatus {
    match latest_transcript(client) {
        Some(t) if t.closed => TranscriptStatus::Closed,
        _ => TranscriptStatus::Open,
    }
}

/// Distinct seller names across every transcript, sorted case-insensitively,
/// with the "all" sentinel first.
pub fn seller_options(clients: &[Client]) -> Vec<String> {
    let names: BTreeSet<&str> = clients
        .iter()
        .flat_map(|c| c.transcripts.iter())
        .filter_map(|t| t.assigned_seller.as_deref())
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != ALL)
        .collect();

    let mut sorted: Vec<&str> = names.into_iter().collect();
    sorted.sort_by(|a, b| {
        a.to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| a.cmp(b))
    });

    std::iter::once(ALL)
        .chain(sorted)
        .map(str::to_string)
        .collect()
}

// ============================================================================
// Monthly conversion
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConversionTotals {
    pub closed: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyKpi {
    pub latest: MonthlyConversion,
    pub previous: Option<MonthlyConversion>,
    /// `latest.conversion - previous.conversion`
    pub delta: Option<f64>,
}

fn by_month(series: &[MonthlyConversion]) -> Vec<&MonthlyConversion> {
    let mut sorted: Vec<&MonthlyConversion> = series.iter().collect();
    sorted.sort_by(|a, b| a.month.cmp(&b.month));
    sorted
}

pub fn conversion_totals(series: &[MonthlyConversion]) -> ConversionTotals {
    series.iter().fold(ConversionTotals::default(), |acc, m| ConversionTotals {
        closed: acc.closed.saturating_add(m.closed),
        total: acc.total.saturating_add(m.total),
    })
}

/// Closed over total across the whole series; 0 when there is no total.
pub fn total_conversion(series: &[MonthlyConversion]) -> f64 {
    let totals = conversion_totals(series);
    if totals.total == 0 {
        0.0
    } else {
        totals.closed as f64 / totals.total as f64
    }
}

/// Conversion change between the last two months.
pub fn monthly_delta(series: &[MonthlyConversion]) -> Option<f64> {
    match by_month(series).as_slice() {
        [.., previous, latest] => Some(latest.conversion - previous.conversion),
        _ => None,
    }
}

pub fn monthly_kpi(series: &[MonthlyConversion]) -> Option<MonthlyKpi> {
    let sorted = by_month(series);
    let latest = (*sorted.last()?).clone();
    let previous = sorted
        .len()
        .checked_sub(2)
        .map(|i| sorted[i].clone());
    let delta = previous
        .as_ref()
        .map(|p| latest.conversion - p.conversion);
    Some(MonthlyKpi {
        latest,
        previous,
        delta,
    })
}

// ============================================================================
// Heatmap, origins, sellers
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapCell {
    pub budget_tier: &'static str,
    pub total: u64,
    pub closed: u64,
    pub conversion: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapRow {
    pub urgency: u8,
    pub label: &'static str,
    pub cells: Vec<HeatmapCell>,
}

pub fn urgency_label(level: u8) -> &'static str {
    match level {
        0 => "Exploring",
        1 => "Moderate pain",
        2 => "High pain",
        3 => "Critical",
        _ => "Unknown",
    }
}

/// Full urgency × budget grid. Tiers match case-insensitively; absent cells
/// are zero.
pub fn heatmap_grid(heatmap: &UrgencyBudgetHeatmap) -> Vec<HeatmapRow> {
    let lookup: HashMap<(u8, String), (u64, u64, f64)> = heatmap
        .cells
        .iter()
        .map(|c| {
            (
                (c.urgency, c.budget_tier.trim().to_lowercase()),
                (c.total, c.closed, finite_or_zero(c.conversion)),
            )
        })
        .collect();

    URGENCY_LEVELS
        .iter()
        .map(|&urgency| HeatmapRow {
            urgency,
            label: urgency_label(urgency),
            cells: BUDGET_TIERS
                .iter()
                .map(|&tier| {
                    let (total, closed, conversion) = lookup
                        .get(&(urgency, tier.to_lowercase()))
                        .copied()
                        .unwrap_or((0, 0, 0.0));
                    HeatmapCell {
                        budget_tier: tier,
                        total,
                        closed,
                        conversion,
                    }
                })
                .collect(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OriginShare {
    pub origin: String,
    pub total: u64,
    pub share: f64,
}

pub fn origin_shares(distribution: &OriginDistribution) -> Vec<OriginShare> {
    let sum = distribution
        .items
        .iter()
        .fold(0u64, |acc, o| acc.saturating_add(o.total));
    distribution
        .items
        .iter()
        .map(|o| OriginShare {
            origin: o.origin.clone(),
            total: o.total,
            share: if sum == 0 {
                0.0
            } else {
                o.total as f64 / sum as f64
            },
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedSeller {
    /// 1-based
    pub rank: usize,
    pub seller: String,
    pub closed: u64,
    pub total: u64,
    pub conversion: f64,
}

/// Leaderboard order: conversion, then closed deals, both descending. Stable.
pub fn rank_sellers(items: &[SellerConversionStat]) -> Vec<RankedSeller> {
    let mut sorted: Vec<&SellerConversionStat> = items.iter().collect();
    sorted.sort_by(|a, b| {
        finite_or_zero(b.conversion)
            .total_cmp(&finite_or_zero(a.conversion))
            .then_with(|| b.closed.cmp(&a.closed))
    });
    sorted
        .into_iter()
        .enumerate()
        .map(|(i, s)| RankedSeller {
            rank: i + 1,
            seller: s.seller.clone(),
            closed: s.closed,
            total: s.total,
            conversion: finite_or_zero(s.conversion),
        })
        .collect()
}

// ============================================================================
// Labels and formatting
// ============================================================================

pub fn sentiment_label(score: i8) -> String {
    match score {
        -2 => "Very negative".to_string(),
        -1 => "Negative".to_string(),
        0 => "Neutral".to_string(),
        1 => "Positive".to_string(),
        2 => "Very positive".to_string(),
        other => format!("Sentiment {}", other),
    }
}

/// `0.125 → "12.5%"`, `0.4 → "40%"`.
pub fn format_percent(value: f64) -> String {
    if !value.is_finite() {
        return "-".to_string();
    }
    let formatted = one_decimal(value * 100.0);
    let trimmed = formatted.strip_suffix(".0").unwrap_or(&formatted);
    format!("{}%", trimmed)
}

/// Signed percentage points: `0.1 → "+10.0 %"`.
pub fn format_delta(delta: f64) -> String {
    if !delta.is_finite() {
        return "-".to_string();
    }
    let points = one_decimal(delta * 100.0);
    let sign = if points.starts_with('-') { "" } else { "+" };
    format!("{}{} %", sign, points)
}

/// One decimal place; values that round to zero never keep a minus sign.
fn one_decimal(value: f64) -> String {
    let formatted = format!("{:.1}", value);
    match formatted.strip_prefix('-') {
        Some("0.0") => "0.0".to_string(),
        _ => formatted,
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

// ============================================================================
// Tests
// ============================================================================
