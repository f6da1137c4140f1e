//! Scenario loading
//!
//! Turns serialized scenario files into `Scenario`s. The scaling core never
//! reads files itself; this is the collaborator that does.
//!
//! File shape:
//!
//! ```json
//! {
//!   "id": "baseline",
//!   "units": {
//!     "E00042786": { "signature_type": 7, "air_quality": 10.1, "house_price": null }
//!   }
//! }
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

use crate::scenario::{Scenario, ScenarioBuilder};
use crate::spatial::SpatialIndex;

/// On-disk scenario: per-unit records of indicator readings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioFile {
    /// Falls back to the file stem when absent
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub units: BTreeMap<String, BTreeMap<String, Value>>,
}

impl ScenarioFile {
    /// Build a scenario, skipping `ignored` fields. A `null` reading keeps
    /// the unit in the signature without a value.
    pub fn into_scenario(self, id: String, index: &SpatialIndex, ignored: &[String]) -> Scenario {
        let mut builder = Scenario::builder(id, index);
        self.fill(&mut builder, ignored);
        builder.build()
    }

    /// Each unit key is canonicalized once; a rejected key skips its fields.
    fn fill(&self, builder: &mut ScenarioBuilder<'_>, ignored: &[String]) {
        for (raw_unit, fields) in &self.units {
            let Some(unit) = builder.push_unit(raw_unit) else {
                continue;
            };
            for (field, value) in fields {
                if ignored.iter().any(|f| f == field) {
                    continue;
                }
                match value {
                    Value::Null => {}
                    // Always `Some` without serde_json's arbitrary_precision
                    Value::Number(n) => builder.push_resolved(field, &unit, n.as_f64().unwrap_or(f64::NAN)),
                    other => warn!(
                        scenario = builder.id(),
                        unit = %unit,
                        "Ignoring non-numeric reading for '{}': {}",
                        field,
                        other
                    ),
                }
            }
        }
    }
}

/// Anything that can produce a scenario
#[async_trait]
pub trait ScenarioSource: Send + Sync {
    /// Identifier for logs
    fn describe(&self) -> String;

    async fn load(&self, index: &SpatialIndex) -> Result<Scenario>;
}

/// A scenario stored as a JSON file
pub struct JsonScenarioSource {
    path: PathBuf,
    ignored_fields: Vec<String>,
}

impl JsonScenarioSource {
    pub fn new(path: impl Into<PathBuf>, ignored_fields: Vec<String>) -> Self {
        Self {
            path: path.into(),
            ignored_fields,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn fallback_id(&self) -> String {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("scenario")
            .to_string()
    }
}

#[async_trait]
impl ScenarioSource for JsonScenarioSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self, index: &SpatialIndex) -> Result<Scenario> {
        let json = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read scenario file {:?}", self.path))?;

        let file: ScenarioFile = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse scenario file {:?}", self.path))?;

        let id = file.id.clone().unwrap_or_else(|| self.fallback_id());
        let scenario = file.into_scenario(id, index, &self.ignored_fields);
        info!(
            "Loaded scenario '{}' from {:?}: {} units, {} indicators",
            scenario.id(),
            self.path,
            scenario.signature().len(),
            scenario.indicators().len()
        );
        Ok(scenario)
    }
}
