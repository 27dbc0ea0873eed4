//! Model checking options.
//!
//! Options are plain serde data and can be kept in a TOML file:
//!
//! ```toml
//! reaction_graph_with_cycles = true
//! measure_time = false
//! strategy = "breadth_first"
//! random_seed = 0
//!
//! [transition]
//! maximum_transitions = 100
//! maximum_time_ms = 30000
//! allow_reducible_classes = false
//! rewrite_open_links = false
//! ```
//!
//! Missing keys take their defaults; unknown keys are rejected.

use super::strategy::ExplorationStrategy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Error type for loading and saving options.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse options{}: {source}", in_file(.path))]
    Parse {
        source: toml::de::Error,
        /// Set when the text was read from a file.
        path: Option<PathBuf>,
    },

    #[error("failed to serialize options: {0}")]
    Serialize(#[from] toml::ser::Error),
}

fn in_file(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" file '{}'", p.display()))
        .unwrap_or_default()
}

/// Limits and state-identification knobs of an exploration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransitionOptions {
    /// Exploration stops once this many transitions are recorded.
    pub maximum_transitions: usize,
    /// Wall-clock budget in milliseconds.
    pub maximum_time_ms: u64,
    /// Treat the roots of a state as unordered when identifying states.
    pub allow_reducible_classes: bool,
    /// Identify states that differ only in the names of their open links.
    pub rewrite_open_links: bool,
}

impl Default for TransitionOptions {
    fn default() -> Self {
        Self {
            maximum_transitions: 100,
            maximum_time_ms: 30_000,
            allow_reducible_classes: false,
            rewrite_open_links: false,
        }
    }
}

/// Options consumed by [`ModelChecker`](super::ModelChecker).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelCheckingOptions {
    /// Record transitions into already known states.
    pub reaction_graph_with_cycles: bool,
    /// Accumulate per-phase timings into the exploration statistics.
    pub measure_time: bool,
    /// Order in which discovered states are expanded.
    pub strategy: ExplorationStrategy,
    /// Seed of the `random` strategy.
    pub random_seed: u64,
    pub transition: TransitionOptions,
}

impl ModelCheckingOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_maximum_transitions(mut self, maximum: usize) -> Self {
        self.transition.maximum_transitions = maximum;
        self
    }

    pub fn with_maximum_time(mut self, budget: Duration) -> Self {
        self.transition.maximum_time_ms = budget.as_millis().min(u64::MAX as u128) as u64;
        self
    }

    pub fn with_allow_reducible_classes(mut self, allow: bool) -> Self {
        self.transition.allow_reducible_classes = allow;
        self
    }

    pub fn with_rewrite_open_links(mut self, rewrite: bool) -> Self {
        self.transition.rewrite_open_links = rewrite;
        self
    }

    pub fn with_reaction_graph_with_cycles(mut self, cycles: bool) -> Self {
        self.reaction_graph_with_cycles = cycles;
        self
    }

    pub fn with_measure_time(mut self, measure: bool) -> Self {
        self.measure_time = measure;
        self
    }

    pub fn with_strategy(mut self, strategy: ExplorationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    pub fn maximum_transitions(&self) -> usize {
        self.transition.maximum_transitions
    }

    pub fn maximum_time(&self) -> Duration {
        Duration::from_millis(self.transition.maximum_time_ms)
    }

    /// Parses options from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse { source, path: None })
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    /// Loads options from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            source,
            path: Some(path.to_path_buf()),
        })
    }

    /// Saves options to a TOML file, creating parent directories.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let text = self.to_toml_string()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, text)?;
        Ok(())
    }
}

impl Default for ModelCheckingOptions {
    fn default() -> Self {
        Self {
            reaction_graph_with_cycles: true,
            measure_time: false,
            strategy: ExplorationStrategy::default(),
            random_seed: 0,
            transition: TransitionOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = ModelCheckingOptions::default();
        assert_eq!(options.maximum_transitions(), 100);
        assert_eq!(options.maximum_time(), Duration::from_secs(30));
        assert!(options.reaction_graph_with_cycles);
        assert!(!options.transition.allow_reducible_classes);
    }

    /// Partial files fill in defaults; unknown keys fail.
    #[test]
    fn parse_partial_and_unknown() {
        let options = ModelCheckingOptions::from_toml_str("[transition]\nmaximum_transitions = 7\n").unwrap();
        assert_eq!(options.maximum_transitions(), 7);
        assert_eq!(options.transition.maximum_time_ms, 30_000);

        let err = ModelCheckingOptions::from_toml_str("maximum_states = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { path: None, .. }));
        assert!(!err.to_string().contains("maximum_states = 3\n"));
    }

    #[test]
    fn parse_strategy() {
        let options = ModelCheckingOptions::from_toml_str("strategy = \"depth_first\"\nrandom_seed = 9\n").unwrap();
        assert_eq!(options.strategy, ExplorationStrategy::DepthFirst);
        assert_eq!(options.random_seed, 9);
        assert!(ModelCheckingOptions::from_toml_str("strategy = \"sideways\"\n").is_err());
    }

    /// File parse errors name the file rather than its contents.
    #[test]
    fn parse_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "measure_time = \"often\"\n").unwrap();
        match ModelCheckingOptions::from_file(&path) {
            Err(ConfigError::Parse { path: Some(p), .. }) => assert_eq!(p, path),
            other => panic!("expected a parse error, got {:?}", other),
        }
        let message = ModelCheckingOptions::from_file(&path).unwrap_err().to_string();
        assert!(message.contains("broken.toml"));
    }

    /// Options survive a save and load through a nested directory.
    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("checker.toml");
        let options = ModelCheckingOptions::new()
            .with_maximum_transitions(10)
            .with_maximum_time(Duration::from_millis(250))
            .with_rewrite_open_links(true)
            .with_strategy(ExplorationStrategy::Random)
            .with_random_seed(42)
            .with_reaction_graph_with_cycles(false);
        options.save_to_file(&path).unwrap();
        assert_eq!(ModelCheckingOptions::from_file(&path).unwrap(), options);
        assert!(matches!(
            ModelCheckingOptions::from_file(&dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
