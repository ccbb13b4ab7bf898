//! Engine configuration.
//!
//! [`MeridianConfig`] is built once at startup (defaults, then environment,
//! then CLI overrides) and shared by reference. Call
//! [`MeridianConfig::validate`] before handing it to the orchestrator.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use meridian_state::CollectionSpec;
use serde::{Deserialize, Serialize};

use crate::tasks::names;

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },

    #[error("no reasoning API key configured (set MERIDIAN_GEMINI_API_KEY or GEMINI_API_KEY)")]
    MissingApiKey,
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Reasoning engine endpoint settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub request_timeout: Duration,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Rate-limit retry policy for reasoning calls.
///
/// Delay after attempt `n` (1-based) is `backoff_base * n`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            backoff_base: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(attempt)
    }
}

/// Specialist batches and the pause between them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub batches: Vec<Vec<String>>,
    pub cooldown: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            batches: vec![
                vec![
                    names::FINANCIAL_SIGNAL.to_string(),
                    names::LEGAL_INTELLIGENCE.to_string(),
                    names::EXECUTIVE_BACKGROUND.to_string(),
                ],
                vec![
                    names::SENTIMENT_NARRATIVE.to_string(),
                    names::GEO_JURISDICTION.to_string(),
                ],
            ],
            cooldown: Duration::from_secs(2),
        }
    }
}

/// Collection names in the data store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collections {
    pub entities: String,
    pub filings: String,
    pub legal_cases: String,
    pub news: String,
    pub executives: String,
    pub investigations: String,
}

impl Default for Collections {
    fn default() -> Self {
        Self {
            entities: "entities".to_string(),
            filings: "filings".to_string(),
            legal_cases: "legal_cases".to_string(),
            news: "news".to_string(),
            executives: "executives".to_string(),
            investigations: "investigations".to_string(),
        }
    }
}

impl Collections {
    /// Collection definitions with the fields tasks filter and sort on.
    pub fn specs(&self) -> Vec<CollectionSpec> {
        vec![
            CollectionSpec::new(&self.entities, &["entity_id", "name", "parent_entity_id"]),
            CollectionSpec::new(&self.filings, &["entity_name", "filing_date"]),
            CollectionSpec::new(&self.legal_cases, &["filed_date"]),
            CollectionSpec::new(&self.news, &["published_at", "sentiment_label"]),
            CollectionSpec::new(&self.executives, &["current_entity_id"]),
            CollectionSpec::new(&self.investigations, &["started_at", "status"]),
        ]
    }

    /// Field holding the natural id of documents in `collection`.
    pub fn id_field(&self, collection: &str) -> Option<&'static str> {
        [
            (&self.entities, "entity_id"),
            (&self.filings, "filing_id"),
            (&self.legal_cases, "case_id"),
            (&self.news, "article_id"),
            (&self.executives, "person_id"),
            (&self.investigations, "investigation_id"),
        ]
        .into_iter()
        .find(|(name, _)| name.as_str() == collection)
        .map(|(_, field)| field)
    }
}

/// Per-task synthesis weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskWeights {
    pub weights: BTreeMap<String, f64>,
    /// Weight for task names not listed in `weights`.
    pub residual: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        let weights = [
            (names::LEGAL_INTELLIGENCE, 0.30),
            (names::FINANCIAL_SIGNAL, 0.25),
            (names::EXECUTIVE_BACKGROUND, 0.20),
            (names::ENTITY_DISCOVERY, 0.10),
            (names::SENTIMENT_NARRATIVE, 0.08),
            (names::GEO_JURISDICTION, 0.07),
        ]
        .into_iter()
        .map(|(name, w)| (name.to_string(), w))
        .collect();
        Self {
            weights,
            residual: 0.05,
        }
    }
}

impl RiskWeights {
    pub fn weight_for(&self, task_name: &str) -> f64 {
        self.weights.get(task_name).copied().unwrap_or(self.residual)
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeridianConfig {
    pub reasoning: ReasoningConfig,
    pub retry: RetryPolicy,
    pub schedule: ScheduleConfig,
    pub collections: Collections,
    pub weights: RiskWeights,
    /// Engine-vs-hint delta above which a divergence is recorded.
    pub divergence_threshold: f64,
    /// Capacity of the event channel between the run and its consumer.
    pub event_buffer: usize,
}

impl Default for MeridianConfig {
    fn default() -> Self {
        Self {
            reasoning: ReasoningConfig::default(),
            retry: RetryPolicy::default(),
            schedule: ScheduleConfig::default(),
            collections: Collections::default(),
            weights: RiskWeights::default(),
            divergence_threshold: 2.5,
            event_buffer: 64,
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::invalid(key, e.to_string())),
        Err(_) => Ok(None),
    }
}

impl MeridianConfig {
    /// Create from environment variables, starting from defaults.
    ///
    /// Reads:
    /// - MERIDIAN_GEMINI_API_KEY (falls back to GEMINI_API_KEY)
    /// - MERIDIAN_MODEL, MERIDIAN_REASONING_URL, MERIDIAN_REQUEST_TIMEOUT_SECS
    /// - MERIDIAN_MAX_ATTEMPTS, MERIDIAN_BACKOFF_BASE_SECS
    /// - MERIDIAN_BATCH_COOLDOWN_MS
    /// - MERIDIAN_DIVERGENCE_THRESHOLD, MERIDIAN_EVENT_BUFFER
    /// - MERIDIAN_COLLECTION_{ENTITIES,FILINGS,LEGAL_CASES,NEWS,EXECUTIVES,INVESTIGATIONS}
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        config.reasoning.api_key = std::env::var("MERIDIAN_GEMINI_API_KEY")
            .or_else(|_| std::env::var("GEMINI_API_KEY"))
            .ok()
            .filter(|k| !k.trim().is_empty());
        if let Ok(model) = std::env::var("MERIDIAN_MODEL") {
            config.reasoning.model = model;
        }
        if let Ok(url) = std::env::var("MERIDIAN_REASONING_URL") {
            config.reasoning.base_url = url;
        }
        if let Some(secs) = env_parse::<u64>("MERIDIAN_REQUEST_TIMEOUT_SECS")? {
            config.reasoning.request_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = env_parse::<u32>("MERIDIAN_MAX_ATTEMPTS")? {
            config.retry.max_attempts = n;
        }
        if let Some(secs) = env_parse::<u64>("MERIDIAN_BACKOFF_BASE_SECS")? {
            config.retry.backoff_base = Duration::from_secs(secs);
        }
        if let Some(ms) = env_parse::<u64>("MERIDIAN_BATCH_COOLDOWN_MS")? {
            config.schedule.cooldown = Duration::from_millis(ms);
        }
        if let Some(t) = env_parse::<f64>("MERIDIAN_DIVERGENCE_THRESHOLD")? {
            config.divergence_threshold = t;
        }
        if let Some(n) = env_parse::<usize>("MERIDIAN_EVENT_BUFFER")? {
            config.event_buffer = n;
        }

        let c = &mut config.collections;
        for (key, slot) in [
            ("MERIDIAN_COLLECTION_ENTITIES", &mut c.entities),
            ("MERIDIAN_COLLECTION_FILINGS", &mut c.filings),
            ("MERIDIAN_COLLECTION_LEGAL_CASES", &mut c.legal_cases),
            ("MERIDIAN_COLLECTION_NEWS", &mut c.news),
            ("MERIDIAN_COLLECTION_EXECUTIVES", &mut c.executives),
            ("MERIDIAN_COLLECTION_INVESTIGATIONS", &mut c.investigations),
        ] {
            if let Ok(name) = std::env::var(key) {
                *slot = name;
            }
        }

        Ok(config)
    }

    /// Check numeric bounds and schedule shape.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::invalid("retry.max_attempts", "must be at least 1"));
        }
        for (name, weight) in &self.weights.weights {
            if !(weight.is_finite() && *weight >= 0.0) {
                return Err(ConfigError::invalid(
                    &format!("weights.{name}"),
                    format!("must be a non-negative number, got {weight}"),
                ));
            }
        }
        if !(self.weights.residual.is_finite() && self.weights.residual >= 0.0) {
            return Err(ConfigError::invalid(
                "weights.residual",
                format!("must be a non-negative number, got {}", self.weights.residual),
            ));
        }
        if self.schedule.batches.is_empty() {
            return Err(ConfigError::invalid("schedule.batches", "at least one batch is required"));
        }
        if let Some(i) = self.schedule.batches.iter().position(Vec::is_empty) {
            return Err(ConfigError::invalid(
                "schedule.batches",
                format!("batch {} is empty", i + 1),
            ));
        }
        if !(self.divergence_threshold.is_finite() && self.divergence_threshold >= 0.0) {
            return Err(ConfigError::invalid(
                "divergence_threshold",
                "must be a non-negative number",
            ));
        }
        if self.event_buffer == 0 {
            return Err(ConfigError::invalid("event_buffer", "must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_fields_follow_collection_names() {
        let collections = Collections {
            news: "articles".to_string(),
            ..Collections::default()
        };
        assert_eq!(collections.id_field("articles"), Some("article_id"));
        assert_eq!(collections.id_field("legal_cases"), Some("case_id"));
        assert_eq!(collections.id_field("news"), None);
        assert_eq!(collections.specs().len(), 6);
    }

    #[test]
    fn defaults_validate() {
        let config = MeridianConfig::default();
        config.validate().unwrap();
        assert_eq!(config.reasoning.model, "gemini-2.5-flash");
        assert_eq!(config.schedule.batches.len(), 2);
        assert_eq!(config.schedule.cooldown, Duration::from_secs(2));
    }

    #[test]
    fn retry_delay_is_linear() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (1..=4).map(|n| policy.delay_for(n).as_secs()).collect();
        assert_eq!(delays, vec![15, 30, 45, 60]);
    }

    #[test]
    fn weights_fall_back_to_residual() {
        let weights = RiskWeights::default();
        assert_eq!(weights.weight_for(names::LEGAL_INTELLIGENCE), 0.30);
        assert_eq!(weights.weight_for("Satellite Imagery"), 0.05);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = MeridianConfig::default();
        config.weights.weights.insert("Financial Signal".into(), -0.1);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));

        let mut config = MeridianConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = MeridianConfig::default();
        config.schedule.batches.push(vec![]);
        assert!(config.validate().is_err());

        let mut config = MeridianConfig::default();
        config.schedule.batches.clear();
        assert!(config.validate().is_err());
    }
}
