//! Core configuration, loaded the same way `core-config::Config` loads
//! `oxidized.toml`: `serde`-derived structs with `#[serde(default)]` on
//! every optional field, parsed by the `toml` crate, wrapped in
//! `anyhow::Result`, logged on success via `tracing::info`.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::step_types::{StepType, ALL_STEP_TYPES};

/// `CoreConfig` as described by spec §6, deserialised from TOML.
///
/// `step_type_replacements` is kept as string keys/values at the
/// deserialisation boundary (TOML tables only have string keys) and
/// resolved to [`StepType`] in [`CoreConfig::from_file_with_defaults`].
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub step_type_replacements: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub output_desired_arrow_weights: Vec<f64>,
    #[serde(default = "default_max_bracket_separation")]
    pub max_bracket_separation: u32,
    #[serde(default = "default_seed_source")]
    pub random_seed_source: String,
}

fn default_max_bracket_separation() -> u32 {
    1
}

fn default_seed_source() -> String {
    String::new()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            step_type_replacements: HashMap::new(),
            output_desired_arrow_weights: Vec::new(),
            max_bracket_separation: default_max_bracket_separation(),
            random_seed_source: default_seed_source(),
        }
    }
}

/// Validated, ready-to-use configuration.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub step_type_replacements: HashMap<StepType, Vec<StepType>>,
    pub output_desired_arrow_weights: Vec<f64>,
    pub max_bracket_separation: usize,
    pub random_seed_source: String,
}

impl CoreConfig {
    /// Builds a config with identity step-type replacements and uniform
    /// lane weights for `num_arrows`, the default used when no TOML file
    /// is supplied.
    pub fn default_for(num_arrows: usize) -> Self {
        let mut step_type_replacements = HashMap::new();
        for &st in &ALL_STEP_TYPES {
            step_type_replacements.insert(st, vec![st]);
        }
        Self {
            step_type_replacements,
            output_desired_arrow_weights: vec![1.0 / num_arrows as f64; num_arrows],
            max_bracket_separation: 1,
            random_seed_source: String::new(),
        }
    }

    pub fn from_file(path: &Path, num_arrows: usize) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let file: ConfigFile = toml::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        let config = Self::from_file_with_defaults(file, num_arrows)?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    fn from_file_with_defaults(file: ConfigFile, num_arrows: usize) -> Result<Self> {
        let mut defaults = Self::default_for(num_arrows);
        for (name, replacement_names) in &file.step_type_replacements {
            let st = StepType::from_name(name)
                .with_context(|| format!("unknown step type {name:?} in step_type_replacements"))?;
            let mut replacements = Vec::with_capacity(replacement_names.len());
            for rname in replacement_names {
                let rst = StepType::from_name(rname).with_context(|| {
                    format!("unknown step type {rname:?} in step_type_replacements[{name:?}]")
                })?;
                replacements.push(rst);
            }
            defaults.step_type_replacements.insert(st, replacements);
        }
        if !file.output_desired_arrow_weights.is_empty() {
            defaults.output_desired_arrow_weights = file.output_desired_arrow_weights;
        }
        if file.max_bracket_separation > 0 {
            defaults.max_bracket_separation = file.max_bracket_separation as usize;
        }
        if !file.random_seed_source.is_empty() {
            defaults.random_seed_source = file.random_seed_source;
        }
        defaults.validate()?;
        Ok(defaults)
    }

    /// Weights non-negative and not all-zero, a replacement entry present
    /// for every StepType, bracket separation at least 1.
    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.max_bracket_separation >= 1,
            "max_bracket_separation must be at least 1"
        );
        anyhow::ensure!(
            self.output_desired_arrow_weights.iter().all(|&w| w >= 0.0),
            "output_desired_arrow_weights must be non-negative"
        );
        anyhow::ensure!(
            self.output_desired_arrow_weights.iter().any(|&w| w > 0.0),
            "output_desired_arrow_weights must not be all zero"
        );
        for &st in &ALL_STEP_TYPES {
            anyhow::ensure!(
                self.step_type_replacements.contains_key(&st),
                "step_type_replacements is missing an entry for {st:?}"
            );
        }
        Ok(())
    }

    /// Normalises `output_desired_arrow_weights` to sum to 1.
    pub fn normalized_arrow_weights(&self) -> Vec<f64> {
        let total: f64 = self.output_desired_arrow_weights.iter().sum();
        if total <= 0.0 {
            let n = self.output_desired_arrow_weights.len().max(1);
            return vec![1.0 / n as f64; n];
        }
        self.output_desired_arrow_weights.iter().map(|&w| w / total).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_for_has_identity_replacements_for_every_step_type() {
        let config = CoreConfig::default_for(4);
        for &st in &ALL_STEP_TYPES {
            assert_eq!(config.step_type_replacements[&st], vec![st]);
        }
    }

    #[test]
    fn normalized_arrow_weights_sum_to_one() {
        let config = CoreConfig::default_for(8);
        let sum: f64 = config.normalized_arrow_weights().iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }
}
