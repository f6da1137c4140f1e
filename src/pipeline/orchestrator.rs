//! Pipeline Orchestrator
//!
//! Reads the store, aligns every non-reference scenario against the
//! reference and scales each of its indicators. Results are memoized per
//! (scenario, indicator) and tagged with the store's reference epoch; an
//! epoch change throws the whole cache away.

use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use super::{EventBus, PipelineEvent, PipelineState, ResultKey, ScaledResults};
use crate::alignment::{Aligner, AlignmentResult};
use crate::config::EngineConfig;
use crate::error::{ScalingError, ScalingResult};
use crate::scaling::{NormalizationRule, ScaledSummary, ScaledValue, ScalingEngine};
use crate::scenario::{Scenario, ScenarioStore};
use crate::spatial::SpatialIndex;

#[derive(Default)]
struct Memo {
    /// Reference epoch the cached entries were computed against
    epoch: u64,
    /// Something has been committed for `epoch`
    populated: bool,
    alignments: HashMap<String, Arc<AlignmentResult>>,
    values: HashMap<ResultKey, Arc<[ScaledValue]>>,
}

impl Memo {
    /// Bring the cache up to `epoch`, dropping everything older. Epochs
    /// only move forward; callers holding an older one must retry.
    fn sync(&mut self, epoch: u64) {
        if epoch <= self.epoch {
            return;
        }
        if self.populated {
            warn!(
                "Reference changed (epoch {} -> {}); discarding {} stale results",
                self.epoch,
                epoch,
                self.values.len()
            );
        }
        self.alignments.clear();
        self.values.clear();
        self.populated = false;
        self.epoch = epoch;
    }
}

/// Work for one scenario: indicators still missing from the cache
struct Job {
    scenario: Arc<Scenario>,
    alignment: Option<Arc<AlignmentResult>>,
    indicators: Vec<String>,
}

struct JobOutput {
    scenario_id: String,
    alignment: Arc<AlignmentResult>,
    fresh_alignment: bool,
    values: Vec<(String, Arc<[ScaledValue]>)>,
}

pub struct Pipeline {
    session_id: Uuid,
    index: Arc<SpatialIndex>,
    store: Arc<ScenarioStore>,
    aligner: Aligner,
    engine: ScalingEngine,
    parallel: bool,
    memo: RwLock<Memo>,
}

impl Pipeline {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_rule(config, config.normalization.build())
    }

    /// Use a custom normalization rule instead of the configured one
    pub fn with_rule(config: &EngineConfig, rule: Arc<dyn NormalizationRule>) -> Self {
        Self::from_parts(
            Arc::new(SpatialIndex::new(config.canonicalization)),
            Arc::new(ScenarioStore::new()),
            ScalingEngine::new(rule, config.epsilon),
            config.parallel,
        )
    }

    /// Share an index and store with other collaborators (e.g. a loader
    /// registering scenarios from another thread).
    pub fn from_parts(
        index: Arc<SpatialIndex>,
        store: Arc<ScenarioStore>,
        engine: ScalingEngine,
        parallel: bool,
    ) -> Self {
        let session_id = Uuid::new_v4();
        info!(
            session = %session_id,
            rule = engine.rule_name(),
            epsilon = engine.epsilon(),
            "Scaling pipeline created"
        );
        Self {
            session_id,
            index,
            store,
            aligner: Aligner::new(),
            engine,
            parallel,
            memo: RwLock::new(Memo::default()),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn index(&self) -> &Arc<SpatialIndex> {
        &self.index
    }

    pub fn store(&self) -> &Arc<ScenarioStore> {
        &self.store
    }

    pub fn engine(&self) -> &ScalingEngine {
        &self.engine
    }

    pub fn events(&self) -> &Arc<EventBus> {
        self.store.events()
    }

    pub fn set_reference(&self, scenario: impl Into<Arc<Scenario>>) -> ScalingResult<Arc<Scenario>> {
        self.store.set_reference(scenario)
    }

    pub fn replace_reference(
        &self,
        scenario: impl Into<Arc<Scenario>>,
    ) -> ScalingResult<Option<Arc<Scenario>>> {
        self.store.replace_reference(scenario)
    }

    pub fn add_scenario(&self, scenario: impl Into<Arc<Scenario>>) -> ScalingResult<Arc<Scenario>> {
        self.store.add_scenario(scenario)
    }

    pub fn state(&self) -> PipelineState {
        let Ok((_, epoch)) = self.store.reference_with_epoch() else {
            return PipelineState::Uninitialized;
        };
        let memo = self.read_memo();
        if !memo.populated {
            PipelineState::ReferenceSet
        } else if memo.epoch == epoch {
            PipelineState::Ready
        } else {
            PipelineState::Stale
        }
    }

    /// Scale every indicator of every registered non-reference scenario.
    ///
    /// Entries already computed against the current reference are reused
    /// as-is; only new scenarios (or everything, after a reference change)
    /// are computed.
    pub fn run(&self) -> ScalingResult<ScaledResults> {
        loop {
            let snapshot = self.store.snapshot();
            let reference = snapshot.reference.clone().ok_or(ScalingError::NoReference)?;
            let epoch = snapshot.epoch;

            let span = info_span!("run", session = %self.session_id, epoch);
            let _guard = span.enter();

            let (jobs, reused) = {
                let mut memo = self.write_memo();
                if memo.epoch > epoch {
                    continue;
                }
                memo.sync(epoch);
                Self::pending_jobs(&memo, &snapshot.others)
            };

            let outputs = self.execute(&jobs, &reference);
            let computed: usize = outputs.iter().map(|o| o.values.len()).sum();

            let Some(results) = self.commit(epoch, &reference, outputs, &snapshot.others) else {
                debug!("Reference moved during run; retrying");
                continue;
            };

            info!(
                scenarios = snapshot.others.len(),
                computed,
                reused,
                "Scaling run complete against '{}'",
                reference.id()
            );
            self.events().publish(PipelineEvent::RunCompleted {
                epoch,
                computed,
                reused,
            });
            return Ok(results);
        }
    }

    /// Scaled values for one (scenario, indicator), computing them if needed.
    pub fn get_scaled_values(
        &self,
        scenario_id: &str,
        indicator: &str,
    ) -> ScalingResult<Arc<[ScaledValue]>> {
        let key = ResultKey::new(scenario_id, indicator);
        loop {
            let (reference, epoch) = self.store.reference_with_epoch()?;
            let scenario = self.lookup(scenario_id)?;
            if scenario.indicator(indicator).is_none() {
                return Err(ScalingError::UnknownIndicator {
                    scenario: scenario_id.to_string(),
                    indicator: indicator.to_string(),
                });
            }

            let alignment = {
                let memo = self.read_memo();
                if memo.epoch == epoch {
                    if let Some(values) = memo.values.get(&key) {
                        debug!("Cache hit for {}", key);
                        return Ok(values.clone());
                    }
                    memo.alignments.get(scenario_id).cloned()
                } else {
                    None
                }
            };

            let job = Job {
                scenario,
                alignment,
                indicators: vec![indicator.to_string()],
            };
            let output = self.compute(&job, &reference);
            if self.commit(epoch, &reference, vec![output], &[]).is_none() {
                continue;
            }

            let memo = self.read_memo();
            if let Some(values) = memo.values.get(&key) {
                return Ok(values.clone());
            }
        }
    }

    /// Alignment of one scenario against the current reference
    pub fn get_coverage_report(&self, scenario_id: &str) -> ScalingResult<Arc<AlignmentResult>> {
        loop {
            let (reference, epoch) = self.store.reference_with_epoch()?;
            let scenario = self.lookup(scenario_id)?;

            {
                let memo = self.read_memo();
                if memo.epoch == epoch {
                    if let Some(alignment) = memo.alignments.get(scenario_id) {
                        return Ok(alignment.clone());
                    }
                }
            }

            let job = Job {
                scenario,
                alignment: None,
                indicators: Vec::new(),
            };
            let output = self.compute(&job, &reference);
            let alignment = output.alignment.clone();
            if self.commit(epoch, &reference, vec![output], &[]).is_some() {
                return Ok(alignment);
            }
        }
    }

    /// Cached values only. `None` means "not computed yet" for the current
    /// reference, as opposed to computed-but-degenerate entries.
    pub fn cached_values(&self, scenario_id: &str, indicator: &str) -> Option<Arc<[ScaledValue]>> {
        let epoch = self.store.epoch();
        let memo = self.read_memo();
        if memo.epoch != epoch {
            return None;
        }
        memo.values.get(&ResultKey::new(scenario_id, indicator)).cloned()
    }

    /// Summaries of every cached result for the current reference
    pub fn summaries(&self) -> BTreeMap<ResultKey, ScaledSummary> {
        let epoch = self.store.epoch();
        let memo = self.read_memo();
        if memo.epoch != epoch {
            return BTreeMap::new();
        }
        memo.values
            .iter()
            .map(|(k, v)| (k.clone(), ScaledSummary::from_values(v)))
            .collect()
    }

    fn lookup(&self, scenario_id: &str) -> ScalingResult<Arc<Scenario>> {
        if self.store.is_reference(scenario_id) {
            return Err(ScalingError::ScenarioIsReference(scenario_id.to_string()));
        }
        self.store
            .get(scenario_id)
            .ok_or_else(|| ScalingError::UnknownScenario(scenario_id.to_string()))
    }

    fn pending_jobs(memo: &Memo, others: &[Arc<Scenario>]) -> (Vec<Job>, usize) {
        let mut jobs = Vec::new();
        let mut reused = 0;

        for scenario in others {
            let alignment = memo.alignments.get(scenario.id()).cloned();
            let mut indicators = Vec::new();
            for name in scenario.indicator_names() {
                if memo.values.contains_key(&ResultKey::new(scenario.id(), name)) {
                    reused += 1;
                } else {
                    indicators.push(name.to_string());
                }
            }

            if alignment.is_none() || !indicators.is_empty() {
                jobs.push(Job {
                    scenario: scenario.clone(),
                    alignment,
                    indicators,
                });
            }
        }
        (jobs, reused)
    }

    fn execute(&self, jobs: &[Job], reference: &Scenario) -> Vec<JobOutput> {
        if self.parallel {
            jobs.par_iter().map(|job| self.compute(job, reference)).collect()
        } else {
            jobs.iter().map(|job| self.compute(job, reference)).collect()
        }
    }

    fn compute(&self, job: &Job, reference: &Scenario) -> JobOutput {
        let (alignment, fresh_alignment) = match &job.alignment {
            Some(cached) => (cached.clone(), false),
            None => (Arc::new(self.aligner.align(&job.scenario, reference)), true),
        };

        let values: Vec<(String, Arc<[ScaledValue]>)> = job
            .indicators
            .iter()
            .map(|name| {
                let scaled = self.engine.scale(&job.scenario, reference, &alignment, name);
                (name.clone(), Arc::from(scaled))
            })
            .collect();

        JobOutput {
            scenario_id: job.scenario.id().to_string(),
            alignment,
            fresh_alignment,
            values,
        }
    }

    /// Store outputs computed against `epoch`. Returns `None` when a newer
    /// reference has already been cached, meaning the outputs are stale.
    /// Otherwise returns the cached results for `scenarios`.
    fn commit(
        &self,
        epoch: u64,
        reference: &Scenario,
        outputs: Vec<JobOutput>,
        scenarios: &[Arc<Scenario>],
    ) -> Option<ScaledResults> {
        let mut gaps = Vec::new();
        let results = {
            let mut memo = self.write_memo();
            if memo.epoch > epoch {
                return None;
            }
            memo.sync(epoch);
            memo.populated = true;

            for output in outputs {
                if output.fresh_alignment && !output.alignment.has_overlap() {
                    gaps.push(PipelineEvent::CoverageGap {
                        scenario_id: output.scenario_id.clone(),
                        only_in_candidate: output.alignment.only_in_candidate.len(),
                        only_in_reference: output.alignment.only_in_reference.len(),
                    });
                }
                memo.alignments
                    .entry(output.scenario_id.clone())
                    .or_insert(output.alignment);
                for (indicator, values) in output.values {
                    memo.values
                        .entry(ResultKey::new(output.scenario_id.as_str(), indicator))
                        .or_insert(values);
                }
            }

            let mut results = ScaledResults::new(epoch, reference.id());
            for scenario in scenarios {
                results.push_scenario(scenario.id());
                for name in scenario.indicator_names() {
                    let key = ResultKey::new(scenario.id(), name);
                    if let Some(values) = memo.values.get(&key) {
                        results.insert(key, values.clone());
                    }
                }
            }
            results
        };

        for gap in gaps {
            self.events().publish(gap);
        }
        Some(results)
    }

    fn read_memo(&self) -> std::sync::RwLockReadGuard<'_, Memo> {
        self.memo.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_memo(&self) -> std::sync::RwLockWriteGuard<'_, Memo> {
        self.memo.write().unwrap_or_else(PoisonError::into_inner)
    }
}
