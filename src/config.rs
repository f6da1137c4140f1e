//! Engine and run configuration
//!
//! YAML or JSON, picked by file extension.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::scaling::{RuleKind, DEFAULT_EPSILON};
use crate::spatial::CanonicalRule;

/// Environment variable naming the run config when no path is given
pub const CONFIG_ENV_VAR: &str = "SCENARIO_SCALER_CONFIG";

/// Settings fixed for the lifetime of one pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub normalization: RuleKind,
    /// References with magnitude at or below this are degenerate
    pub epsilon: f64,
    pub canonicalization: CanonicalRule,
    /// Scale independent scenarios on the rayon pool
    pub parallel: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            normalization: RuleKind::Ratio,
            epsilon: DEFAULT_EPSILON,
            canonicalization: CanonicalRule::default(),
            parallel: true,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            bail!("epsilon must be a finite, non-negative number (got {})", self.epsilon);
        }
        Ok(())
    }
}

fn default_ignored_fields() -> Vec<String> {
    vec!["signature_type".to_string()]
}

/// What the binary loads, scales and writes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    pub reference: PathBuf,
    #[serde(default)]
    pub scenarios: Vec<PathBuf>,
    /// Report destination; stdout when absent
    #[serde(default)]
    pub output: Option<PathBuf>,
    /// Per-unit fields in scenario files that are not indicators
    #[serde(default = "default_ignored_fields")]
    pub ignored_fields: Vec<String>,
}

impl RunConfig {
    pub fn from_str_with_format(text: &str, path: &Path) -> Result<Self> {
        let config: RunConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(text)
                .with_context(|| format!("Failed to parse JSON config {:?}", path))?,
            _ => serde_yaml::from_str(text)
                .with_context(|| format!("Failed to parse YAML config {:?}", path))?,
        };
        config.engine.validate()?;
        Ok(config)
    }

    /// Load a run config; relative paths inside it resolve against the
    /// config file's directory.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {:?}", path))?;

        let mut config = Self::from_str_with_format(&text, path)?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.reference);
        for scenario in self.scenarios.iter_mut() {
            resolve(scenario);
        }
        if let Some(out) = self.output.as_mut() {
            resolve(out);
        }
    }
}
