//! Risk scores, bands, and proceed recommendations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Upper bound of every risk score.
pub const MAX_RISK: f64 = 10.0;

/// Clamp a score into `[0, 10]`. NaN becomes `0.0`.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, MAX_RISK)
    }
}

/// Round to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Fixed risk bands. Lower bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// `<2.5` LOW, `<5.0` MEDIUM, `<7.5` HIGH, otherwise CRITICAL.
    pub fn from_score(score: f64) -> Self {
        let score = clamp_score(score);
        if score < 2.5 {
            RiskLevel::Low
        } else if score < 5.0 {
            RiskLevel::Medium
        } else if score < 7.5 {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }

    /// Parse a band label, ignoring case and surrounding whitespace.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "LOW" => Some(RiskLevel::Low),
            "MEDIUM" => Some(RiskLevel::Medium),
            "HIGH" => Some(RiskLevel::High),
            "CRITICAL" => Some(RiskLevel::Critical),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final recommendation on whether to proceed with the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Approve,
    Conditional,
    Reject,
    #[default]
    InvestigateFurther,
}

impl Recommendation {
    /// Map a free-text label onto a recommendation.
    /// Anything unrecognized is `InvestigateFurther`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().replace([' ', '-'], "_").as_str() {
            "APPROVE" => Recommendation::Approve,
            "CONDITIONAL" => Recommendation::Conditional,
            "REJECT" => Recommendation::Reject,
            _ => Recommendation::InvestigateFurther,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Approve => "APPROVE",
            Recommendation::Conditional => "CONDITIONAL",
            Recommendation::Reject => "REJECT",
            Recommendation::InvestigateFurther => "INVESTIGATE_FURTHER",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_boundaries_are_half_open() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(2.49), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(2.5), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(4.99), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(5.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(7.5), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(10.0), RiskLevel::Critical);
    }

    #[test]
    fn clamp_handles_out_of_range_and_nan() {
        assert_eq!(clamp_score(-3.0), 0.0);
        assert_eq!(clamp_score(42.0), 10.0);
        assert_eq!(clamp_score(f64::NAN), 0.0);
        assert_eq!(clamp_score(6.25), 6.25);
    }

    #[test]
    fn unknown_recommendation_means_investigate_further() {
        assert_eq!(Recommendation::from_label("approve"), Recommendation::Approve);
        assert_eq!(
            Recommendation::from_label("investigate further"),
            Recommendation::InvestigateFurther
        );
        assert_eq!(Recommendation::from_label("MAYBE"), Recommendation::InvestigateFurther);
        assert_eq!(
            serde_json::to_string(&Recommendation::InvestigateFurther).unwrap(),
            "\"INVESTIGATE_FURTHER\""
        );
    }

    #[test]
    fn risk_level_parses_engine_labels() {
        assert_eq!(RiskLevel::parse(" high "), Some(RiskLevel::High));
        assert_eq!(RiskLevel::parse("SEVERE"), None);
    }
}
