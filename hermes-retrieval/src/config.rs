//! Retrieval configuration
//!
//! Parameters arrive as JSON (camelCase keys) from the query layer. Every
//! field has a default so partial parameter objects are accepted.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default number of results when `requested` is not given
pub const DEFAULT_REQUESTED: usize = 1000;

/// Default number of candidates between cancellation checks
pub const DEFAULT_CANCEL_CHECK_INTERVAL: u32 = 4096;

/// How many results a query may return.
///
/// Serialized as a signed integer: negative values mean unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum ResultLimit {
    Bounded(usize),
    Unbounded,
}

impl ResultLimit {
    pub fn is_unbounded(&self) -> bool {
        matches!(self, ResultLimit::Unbounded)
    }
}

impl Default for ResultLimit {
    fn default() -> Self {
        ResultLimit::Bounded(DEFAULT_REQUESTED)
    }
}

impl From<i64> for ResultLimit {
    fn from(requested: i64) -> Self {
        if requested < 0 {
            ResultLimit::Unbounded
        } else {
            ResultLimit::Bounded(requested as usize)
        }
    }
}

impl From<ResultLimit> for i64 {
    fn from(limit: ResultLimit) -> Self {
        match limit {
            ResultLimit::Bounded(k) => k as i64,
            ResultLimit::Unbounded => -1,
        }
    }
}

/// Document-at-a-time processing strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingModel {
    /// Score every candidate (ranked document model baseline)
    Exhaustive,
    /// Sentinel-partitioned delta scoring
    #[default]
    MaxScore,
    /// Weak-AND pivoting
    Wand,
}

/// Per-query retrieval configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetrievalConfig {
    /// K for the top-k heap
    pub requested: ResultLimit,
    pub processing_model: ProcessingModel,
    /// Merge duplicate leaves into a single cursor
    pub share_nodes: bool,
    /// Multiplier applied to the heap minimum before WAND pivots on it.
    /// 1.0 is rank-safe; larger values prune harder and may drop true top-k
    /// documents.
    pub threshold_factor: f64,
    /// Attach per-cursor contributions to returned documents
    pub annotate: bool,
    /// Candidates between cancellation checks (0 disables checking)
    pub cancel_check_interval: u32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            requested: ResultLimit::default(),
            processing_model: ProcessingModel::default(),
            share_nodes: true,
            threshold_factor: 1.0,
            annotate: false,
            cancel_check_interval: DEFAULT_CANCEL_CHECK_INTERVAL,
        }
    }
}

impl RetrievalConfig {
    /// Parse and validate a JSON parameter object
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::Configuration(format!("invalid retrieval parameters: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.threshold_factor.is_finite() || self.threshold_factor <= 0.0 {
            return Err(Error::Configuration(format!(
                "thresholdFactor must be a positive finite number, got {}",
                self.threshold_factor
            )));
        }
        Ok(())
    }

    pub fn with_requested(mut self, requested: ResultLimit) -> Self {
        self.requested = requested;
        self
    }

    pub fn with_processing_model(mut self, model: ProcessingModel) -> Self {
        self.processing_model = model;
        self
    }

    pub fn with_share_nodes(mut self, share_nodes: bool) -> Self {
        self.share_nodes = share_nodes;
        self
    }

    pub fn with_threshold_factor(mut self, factor: f64) -> Self {
        self.threshold_factor = factor;
        self
    }

    pub fn with_annotate(mut self, annotate: bool) -> Self {
        self.annotate = annotate;
        self
    }

    pub fn with_cancel_check_interval(mut self, interval: u32) -> Self {
        self.cancel_check_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RetrievalConfig::default();
        assert_eq!(config.requested, ResultLimit::Bounded(1000));
        assert_eq!(config.processing_model, ProcessingModel::MaxScore);
        assert!(config.share_nodes);
        assert_eq!(config.threshold_factor, 1.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config =
            RetrievalConfig::from_json(r#"{"requested": 10, "processingModel": "wand"}"#).unwrap();
        assert_eq!(config.requested, ResultLimit::Bounded(10));
        assert_eq!(config.processing_model, ProcessingModel::Wand);
        assert!(config.share_nodes);
    }

    #[test]
    fn test_negative_requested_is_unbounded() {
        let config = RetrievalConfig::from_json(r#"{"requested": -1}"#).unwrap();
        assert!(config.requested.is_unbounded());
        assert_eq!(i64::from(config.requested), -1);
    }

    #[test]
    fn test_invalid_threshold_factor() {
        let err = RetrievalConfig::from_json(r#"{"thresholdFactor": 0.0}"#).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        let config = RetrievalConfig::default().with_threshold_factor(f64::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            RetrievalConfig::from_json(r#"{"requested": "many"}"#),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_round_trip_serialization() {
        let config = RetrievalConfig::default()
            .with_requested(ResultLimit::Unbounded)
            .with_share_nodes(false);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"shareNodes\":false"));
        assert_eq!(RetrievalConfig::from_json(&json).unwrap(), config);
    }
}
