//! Run configuration loaded from TOML.
//!
//! Every key is optional; missing keys take their defaults.
//!
//! ```toml
//! seed = 7
//! population_size = 48
//! generations = 200
//! checkpoint_interval = 25
//! scenario = "conjecture"
//!
//! [selection]
//! tournament_size = 4
//!
//! [genome]
//! solver_depth = 5
//! guidance_layers = [9, 12, 1]
//!
//! [genome.mutation]
//! max_nodes = 96
//! ```

use crate::genome::GenomeConfig;
use crate::gp::MAX_DEPTH;
use crate::guidance::FEATURE_COUNT;
use crate::selection::SelectionConfig;
use crate::snapshot::ScenarioId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Errors raised while loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The text is not valid TOML for a run configuration.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    /// Values that parse but cannot drive a run.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration of an evolution run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Seed of the run scope.
    pub seed: u32,
    /// Individuals per generation.
    pub population_size: usize,
    /// Generations to run.
    pub generations: u64,
    /// Write a checkpoint every this many generations (0 disables periodic
    /// checkpoints; the final one is always written).
    pub checkpoint_interval: u64,
    /// Scenario recorded in snapshots.
    pub scenario: ScenarioId,
    /// Selection settings.
    pub selection: SelectionConfig,
    /// Genome factory settings.
    pub genome: GenomeConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            population_size: 32,
            generations: 50,
            checkpoint_interval: 10,
            scenario: ScenarioId::default(),
            selection: SelectionConfig::default(),
            genome: GenomeConfig::default(),
        }
    }
}

impl RunConfig {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] on bad TOML, [`ConfigError::Invalid`] on
    /// unusable values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`Self::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        info!(path = %path.display(), seed = config.seed, "configuration loaded");
        Ok(config)
    }

    /// Render as TOML.
    ///
    /// # Errors
    ///
    /// Propagates serializer failures.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Check values that deserialize but cannot drive a run.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size < 2 {
            return Err(ConfigError::Invalid(format!(
                "population_size must be at least 2, got {}",
                self.population_size
            )));
        }
        if self.selection.elite_count >= self.population_size {
            return Err(ConfigError::Invalid(format!(
                "elite_count {} leaves no room for offspring in a population of {}",
                self.selection.elite_count, self.population_size
            )));
        }
        let rates = [
            ("solver_mutation_rate", self.genome.solver_mutation_rate),
            ("template_mutation_rate", self.genome.template_mutation_rate),
        ];
        if let Some((name, rate)) = rates.iter().find(|(_, r)| !(0.0..=1.0).contains(r)) {
            return Err(ConfigError::Invalid(format!(
                "{name} must be within [0, 1], got {rate}"
            )));
        }
        let depth = self.genome.solver_depth.max(self.genome.template_depth);
        let max_nodes = self.genome.mutation.max_nodes;
        if depth >= MAX_DEPTH || full_tree_nodes(depth) > max_nodes {
            return Err(ConfigError::Invalid(format!(
                "random trees of depth {depth} do not fit max_nodes = {max_nodes}"
            )));
        }
        let layers = &self.genome.guidance_layers;
        if self.genome.with_guidance && layers.first() != Some(&FEATURE_COUNT) {
            return Err(ConfigError::Invalid(format!(
                "guidance_layers must start with {FEATURE_COUNT} inputs, got {layers:?}"
            )));
        }
        Ok(())
    }
}

/// Node count of a full binary tree of the given depth, saturating.
fn full_tree_nodes(depth: usize) -> usize {
    u32::try_from(depth + 1)
        .ok()
        .and_then(|shift| 1usize.checked_shl(shift))
        .map_or(usize::MAX, |n| n - 1)
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(RunConfig::from_toml_str("").unwrap(), RunConfig::default());
    }

    #[test]
    fn test_partial_overrides() {
        let config = RunConfig::from_toml_str(
            r#"
            seed = 7
            scenario = "ecology"

            [selection]
            tournament_size = 3

            [genome]
            solver_depth = 6

            [genome.mutation]
            max_nodes = 128
            "#,
        )
        .unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.scenario, ScenarioId::Ecology);
        assert_eq!(config.selection.tournament_size, 3);
        assert_eq!(config.selection.elite_count, 2);
        assert_eq!(config.genome.solver_depth, 6);
        assert_eq!(config.genome.template_depth, 3);
        assert_eq!(config.genome.mutation.max_nodes, 128);
        assert_eq!(config.genome.mutation.max_subtree_depth, 2);
        assert_eq!(config.population_size, 32);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            RunConfig::from_toml_str("population_size = 1"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            RunConfig::from_toml_str("population_size = 2\n[selection]\nelite_count = 2"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            RunConfig::from_toml_str("[genome]\nsolver_mutation_rate = 1.5"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            RunConfig::from_toml_str("[genome]\nguidance_layers = [4, 1]"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            RunConfig::from_toml_str("[genome]\nsolver_depth = 6"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            RunConfig::from_toml_str("[genome]\nsolver_depth = 900\n[genome.mutation]\nmax_nodes = 100000"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            RunConfig::from_toml_str("scenario = \"chess\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = RunConfig::default();
        config.genome.bias_step = 0.125;
        let text = config.to_toml_string().unwrap();
        assert_eq!(RunConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "generations = 3").unwrap();
        let config = RunConfig::load(file.path()).unwrap();
        assert_eq!(config.generations, 3);

        let missing = file.path().with_extension("missing");
        assert!(matches!(
            RunConfig::load(&missing),
            Err(ConfigError::Io { .. })
        ));
    }
}
