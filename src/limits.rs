//! Limits and policies for instance generation
//!
//! Every otherwise-unbounded quantity in the engine (pattern repetition,
//! `maxOccurs="unbounded"`, recursion depth, retries) is capped by a value in
//! [`GeneratorConfig`]. The caps scale with the size parameter so that larger
//! sizes allow deeper and larger instances without requiring them.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How branches of a choice are weighted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChoiceWeighting {
    /// Every branch is equally likely
    #[default]
    Uniform,
    /// Use weights attached to the choice in the schema model, when present
    SchemaHint,
}

/// Generation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Maximum synthesis steps for a single pattern-generation call
    pub max_pattern_steps: usize,

    /// Maximum attempts to satisfy pattern and length/range facets together
    pub max_facet_attempts: u32,

    /// Upper cap on repetitions drawn for unbounded quantifiers and occurs
    pub max_unbounded_occurs: u32,

    /// Upper cap on the size passed to leaf values (strings, numbers, text)
    pub max_leaf_length: u32,

    /// Element depth available at size 0
    pub base_depth: u32,

    /// Size increment that buys one more level of depth
    pub depth_step: u32,

    /// Hard depth ceiling; exceeding it fails the sample
    pub max_depth: u32,

    /// Elements per instance after which only minimal content is produced
    pub node_budget: usize,

    /// Probability of emitting an optional attribute at large sizes
    pub optional_attribute_probability: f64,

    /// Choice branch weighting policy
    pub choice_weighting: ChoiceWeighting,

    /// Probability of drawing a character from the ASCII part of a class
    pub ascii_bias: f64,

    /// Size used by `generate(count)`
    pub default_size: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_pattern_steps: 100_000,
            max_facet_attempts: 100,
            max_unbounded_occurs: 32,
            max_leaf_length: 256,
            base_depth: 2,
            depth_step: 4,
            max_depth: 64,
            node_budget: 2_000,
            optional_attribute_probability: 0.5,
            choice_weighting: ChoiceWeighting::Uniform,
            ascii_bias: 0.9,
            default_size: 10,
        }
    }
}

impl GeneratorConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Small instances, tight budgets
    pub fn strict() -> Self {
        Self {
            max_pattern_steps: 10_000,
            max_facet_attempts: 20,
            max_unbounded_occurs: 4,
            max_leaf_length: 32,
            base_depth: 1,
            depth_step: 10,
            max_depth: 16,
            node_budget: 200,
            ..Self::default()
        }
    }

    /// Large instances, generous budgets (use with caution)
    pub fn permissive() -> Self {
        Self {
            max_pattern_steps: 1_000_000,
            max_facet_attempts: 1_000,
            max_unbounded_occurs: 256,
            max_leaf_length: 4096,
            base_depth: 4,
            depth_step: 2,
            max_depth: 256,
            node_budget: 50_000,
            ..Self::default()
        }
    }

    /// Load a config from a JSON string; missing fields take default values
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        let probability = |name: &str, value: f64| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(Error::Config(format!("{} must be within [0, 1], got {}", name, value)))
            }
        };
        probability("ascii_bias", self.ascii_bias)?;
        probability("optional_attribute_probability", self.optional_attribute_probability)?;
        if self.max_depth == 0 {
            return Err(Error::Config("max_depth must be at least 1".to_string()));
        }
        if self.max_pattern_steps == 0 {
            return Err(Error::Config("max_pattern_steps must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Load a config from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Cap on repetitions when the upper bound is unbounded
    pub fn repeat_cap(&self, size: u32) -> u32 {
        size.min(self.max_unbounded_occurs)
    }

    /// Size handed to leaf value synthesis
    pub fn leaf_size(&self, size: u32) -> u32 {
        size.min(self.max_leaf_length)
    }

    /// Depth after which generation prefers terminal alternatives
    pub fn depth_limit(&self, size: u32) -> u32 {
        let step = self.depth_step.max(1);
        self.base_depth.saturating_add(size / step).min(self.max_depth)
    }

    /// Probability of emitting an optional attribute at this size
    pub fn attribute_probability(&self, size: u32) -> f64 {
        let s = size as f64 + 1.0;
        (self.optional_attribute_probability * s / (s + 1.0)).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GeneratorConfig::default();
        assert_eq!(config.repeat_cap(0), 0);
        assert_eq!(config.repeat_cap(10), 10);
        assert_eq!(config.repeat_cap(1000), config.max_unbounded_occurs);
    }

    #[test]
    fn test_depth_limit_grows_and_saturates() {
        let config = GeneratorConfig::default();
        assert_eq!(config.depth_limit(0), config.base_depth);
        assert!(config.depth_limit(20) > config.depth_limit(0));
        assert_eq!(config.depth_limit(u32::MAX / 2), config.max_depth);
    }

    #[test]
    fn test_strict_and_permissive() {
        let strict = GeneratorConfig::strict();
        let permissive = GeneratorConfig::permissive();
        assert!(strict.max_unbounded_occurs < GeneratorConfig::default().max_unbounded_occurs);
        assert!(permissive.max_depth > GeneratorConfig::default().max_depth);
    }

    #[test]
    fn test_attribute_probability_grows_with_size() {
        let config = GeneratorConfig::default();
        let small = config.attribute_probability(0);
        let large = config.attribute_probability(1000);
        assert!(small < large);
        assert!(large <= config.optional_attribute_probability);
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        for json in [
            r#"{"ascii_bias": 1.5}"#,
            r#"{"ascii_bias": -0.1}"#,
            r#"{"optional_attribute_probability": 2.0}"#,
            r#"{"max_depth": 0}"#,
        ] {
            let err = GeneratorConfig::from_json_str(json).unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::Config, "{}", json);
        }
        let nan = GeneratorConfig {
            optional_attribute_probability: f64::NAN,
            ..GeneratorConfig::default()
        };
        assert!(nan.validate().is_err());
        assert!(GeneratorConfig::strict().validate().is_ok());
        assert!(GeneratorConfig::permissive().validate().is_ok());
    }

    #[test]
    fn test_huge_base_depth_saturates() {
        let config = GeneratorConfig {
            base_depth: u32::MAX,
            ..GeneratorConfig::default()
        };
        assert_eq!(config.depth_limit(1000), config.max_depth);
        assert_eq!(config.leaf_size(1_000_000), config.max_leaf_length);
    }

    #[test]
    fn test_from_json_partial() {
        let config =
            GeneratorConfig::from_json_str(r#"{"max_depth": 8, "choice_weighting": "schema_hint"}"#)
                .unwrap();
        assert_eq!(config.max_depth, 8);
        assert_eq!(config.choice_weighting, ChoiceWeighting::SchemaHint);
        assert_eq!(config.node_budget, GeneratorConfig::default().node_budget);
    }
}
