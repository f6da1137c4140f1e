//! Report export
//!
//! Bundles one run's scaled values with per-scenario coverage so downstream
//! consumers see the gaps next to the numbers.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;
use uuid::Uuid;

use crate::error::{ScalingError, ScalingResult};
use crate::pipeline::{Pipeline, ResultKey, ScaledResults};
use crate::scaling::{ScaledSummary, ScaledValue};
use crate::spatial::SpatialUnit;

#[derive(Debug, Clone, Serialize)]
pub struct CoverageSummary {
    pub common: usize,
    pub only_in_candidate: Vec<SpatialUnit>,
    pub only_in_reference: Vec<SpatialUnit>,
    pub candidate_coverage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndicatorReport {
    pub summary: ScaledSummary,
    pub values: Vec<ScaledValue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub scenario_id: String,
    pub coverage: CoverageSummary,
    pub indicators: BTreeMap<String, IndicatorReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScalingReport {
    pub session_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub reference_id: String,
    pub rule: String,
    pub epsilon: f64,
    pub scenarios: Vec<ScenarioReport>,
}

impl ScalingReport {
    /// Assemble a report for `results`, in scenario registration order.
    ///
    /// Fails with `StaleResults` when the reference has changed since the
    /// run. Scenarios registered after the run are not included.
    pub fn build(pipeline: &Pipeline, results: &ScaledResults) -> ScalingResult<Self> {
        let store = pipeline.store();
        let current = store.epoch();
        if current != results.epoch() {
            return Err(ScalingError::StaleResults {
                reference: results.reference_id().to_string(),
                computed: results.epoch(),
                current,
            });
        }

        let mut scenarios = Vec::new();
        for scenario_id in results.scenario_ids() {
            let scenario = store
                .get(scenario_id)
                .ok_or_else(|| ScalingError::UnknownScenario(scenario_id.clone()))?;
            let alignment = pipeline.get_coverage_report(scenario_id)?;
            let mut indicators = BTreeMap::new();
            for name in scenario.indicator_names() {
                let key = ResultKey::new(scenario_id.as_str(), name);
                if let Some(values) = results.get(&key) {
                    indicators.insert(
                        name.to_string(),
                        IndicatorReport {
                            summary: ScaledSummary::from_values(values),
                            values: values.to_vec(),
                        },
                    );
                }
            }

            scenarios.push(ScenarioReport {
                scenario_id: scenario_id.clone(),
                coverage: CoverageSummary {
                    common: alignment.common_units.len(),
                    only_in_candidate: alignment.only_in_candidate.iter().cloned().collect(),
                    only_in_reference: alignment.only_in_reference.iter().cloned().collect(),
                    candidate_coverage: alignment.candidate_coverage(),
                },
                indicators,
            });
        }

        // The reference may have moved while coverage was being gathered
        let current = store.epoch();
        if current != results.epoch() {
            return Err(ScalingError::StaleResults {
                reference: results.reference_id().to_string(),
                computed: results.epoch(),
                current,
            });
        }

        Ok(Self {
            session_id: pipeline.session_id(),
            generated_at: Utc::now(),
            reference_id: results.reference_id().to_string(),
            rule: pipeline.engine().rule_name().to_string(),
            epsilon: pipeline.engine().epsilon(),
            scenarios,
        })
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize scaling report")
    }

    pub async fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = self.to_json_pretty()?;
        fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write report to {:?}", path))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::scenario::Scenario;
    use tempfile::tempdir;

    fn sample_pipeline() -> Pipeline {
        let p = Pipeline::new(&EngineConfig::default());
        let base = Scenario::builder("base", p.index())
            .value("pop", "R1", 100.0)
            .value("pop", "R2", 200.0)
            .build();
        let alt = Scenario::builder("alt", p.index())
            .value("pop", "R1", 150.0)
            .value("pop", "R3", 50.0)
            .build();
        p.set_reference(base).unwrap();
        p.add_scenario(alt).unwrap();
        p
    }

    #[test]
    fn test_report_carries_coverage_gaps() {
        let p = sample_pipeline();
        let results = p.run().unwrap();
        let report = ScalingReport::build(&p, &results).unwrap();

        assert_eq!(report.reference_id, "base");
        assert_eq!(report.rule, "ratio");
        let alt = &report.scenarios[0];
        assert_eq!(alt.coverage.common, 1);
        assert_eq!(alt.coverage.only_in_candidate[0].as_str(), "R3");
        assert_eq!(alt.coverage.only_in_reference[0].as_str(), "R2");
        assert_eq!(alt.indicators["pop"].summary.ok, 1);
    }

    #[test]
    fn test_report_rejects_results_from_replaced_reference() {
        let p = sample_pipeline();
        let results = p.run().unwrap();

        let census = Scenario::builder("census", p.index())
            .value("pop", "R1", 1.0)
            .value("pop", "R9", 1.0)
            .build();
        p.replace_reference(census).unwrap();

        let err = ScalingReport::build(&p, &results).unwrap_err();
        assert_eq!(
            err,
            ScalingError::StaleResults {
                reference: "base".into(),
                computed: 1,
                current: 2,
            }
        );

        let fresh = p.run().unwrap();
        let report = ScalingReport::build(&p, &fresh).unwrap();
        assert_eq!(report.reference_id, "census");
        let pop = &report.scenarios[0].indicators["pop"].values;
        assert_eq!(pop[0].reference_value, Some(1.0));
        assert_eq!(pop[0].scaled_value, Some(150.0));
    }

    #[test]
    fn test_report_skips_scenarios_added_after_run() {
        let p = sample_pipeline();
        let results = p.run().unwrap();

        let late = Scenario::builder("late", p.index()).value("pop", "R1", 1.0).build();
        p.add_scenario(late).unwrap();

        let report = ScalingReport::build(&p, &results).unwrap();
        let ids: Vec<&str> = report.scenarios.iter().map(|s| s.scenario_id.as_str()).collect();
        assert_eq!(ids, vec!["alt"]);
    }

    #[tokio::test]
    async fn test_write_report() {
        let p = sample_pipeline();
        let results = p.run().unwrap();
        let report = ScalingReport::build(&p, &results).unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("report.json");
        report.write(&path).await.unwrap();

        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["scenarios"][0]["indicators"]["pop"]["values"][0]["status"], "OK");
        assert_eq!(json["scenarios"][0]["indicators"]["pop"]["values"][0]["scaled_value"], 1.5);
        assert_eq!(json["scenarios"][0]["coverage"]["only_in_candidate"][0], "R3");
    }
}
