//! Configuration types for normalization, rewriting and the registry.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Beta-reduction limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Maximum number of reduction steps before giving up
    pub max_steps: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self { max_steps: 10_000 }
    }
}

/// Rewrite engine limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteConfig {
    /// Maximum number of bottom-up passes before stopping short of a fixpoint
    pub max_passes: usize,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self { max_passes: 64 }
    }
}

/// Canonicalization limits used when computing souls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoulConfig {
    /// Step budget for each normalization round
    pub normalize_budget: usize,
    /// Maximum normalize/rewrite alternations
    pub max_rounds: usize,
    /// Pass cap for each rewrite round
    pub max_passes: usize,
    /// Largest canonical tree, in nodes, that is encoded node by node.
    /// Bigger forms get a provisional soul.
    #[serde(default = "default_max_tree_size")]
    pub max_tree_size: usize,
}

fn default_max_tree_size() -> usize {
    1 << 20
}

impl Default for SoulConfig {
    fn default() -> Self {
        Self {
            normalize_budget: 100_000,
            max_rounds: 16,
            max_passes: 64,
            max_tree_size: default_max_tree_size(),
        }
    }
}

/// Whether an objective rewards high or low values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Maximize,
    Minimize,
}

/// One weighted term of the champion score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    /// Metric type this objective reads (`latency`, `memory`, `size`, ...)
    pub metric_type: String,
    pub weight: f64,
    pub direction: Direction,
}

impl Objective {
    pub fn new(metric_type: &str, weight: f64, direction: Direction) -> Self {
        Self {
            metric_type: metric_type.to_string(),
            weight,
            direction,
        }
    }
}

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Database path (SQLite), `:memory:` for a private in-process database
    pub database_path: String,
    /// Minimum edge confidence for two souls to share a champion group
    pub min_confidence: f64,
    /// Weighted objectives used for champion selection
    pub objectives: Vec<Objective>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            database_path: "./data/souls.db".to_string(),
            min_confidence: 0.5,
            objectives: vec![
                Objective::new("latency", 0.4, Direction::Minimize),
                Objective::new("memory", 0.2, Direction::Minimize),
                Objective::new("size", 0.2, Direction::Minimize),
                Objective::new("purity", 0.2, Direction::Maximize),
            ],
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub normalizer: NormalizerConfig,
    #[serde(default)]
    pub rewrite: RewriteConfig,
    #[serde(default)]
    pub soul: SoulConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
}

impl EngineConfig {
    /// Load a JSON configuration file, falling back to defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                Ok(serde_json::from_str(&text)?)
            }
            None => Ok(Self::default()),
        }
    }
}
