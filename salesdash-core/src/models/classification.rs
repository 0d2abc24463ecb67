use serde::{Deserialize, Serialize};

/// Model-derived annotation of a transcript's sales signals.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Classification {
    /// -2 (very negative) ..= 2 (very positive)
    pub sentiment: i8,
    /// 0 (exploring) ..= 3 (critical)
    pub urgency: u8,
    #[serde(default)]
    pub budget_tier: Option<String>,
    #[serde(default)]
    pub buyer_role: Option<String>,
    #[serde(default)]
    pub use_case: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub automatization: Option<bool>,
    #[serde(default)]
    pub pains: Option<Vec<String>>,
    #[serde(default)]
    pub objections: Option<Vec<String>>,
    #[serde(default)]
    pub competitors: Option<Vec<String>>,
    #[serde(default)]
    pub risks: Option<Vec<String>>,
    #[serde(default)]
    pub next_step_clarity: Option<u8>,
    pub fit_score: f64,
    pub close_probability: f64,
}

impl Classification {
    /// Pull `fit_score` and `close_probability` into [0, 1]; NaN becomes 0.
    /// Returns whether anything changed.
    pub fn clamp_scores(&mut self) -> bool {
        let fit = clamp_unit(self.fit_score);
        let close = clamp_unit(self.close_probability);
        let changed = fit.to_bits() != self.fit_score.to_bits()
            || close.to_bits() != self.close_probability.to_bits();
        self.fit_score = fit;
        self.close_probability = close;
        changed
    }

    pub fn pains(&self) -> &[String] {
        self.pains.as_deref().unwrap_or_default()
    }

    pub fn objections(&self) -> &[String] {
        self.objections.as_deref().unwrap_or_default()
    }

    pub fn competitors(&self) -> &[String] {
        self.competitors.as_deref().unwrap_or_default()
    }

    pub fn risks(&self) -> &[String] {
        self.risks.as_deref().unwrap_or_default()
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
