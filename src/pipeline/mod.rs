//! Pipeline Module
//!
//! Drives alignment and scaling for every registered scenario and keeps the
//! results memoized until the reference changes.

pub mod event_bus;
pub mod orchestrator;

pub use event_bus::{EventBus, PipelineEvent};
pub use orchestrator::Pipeline;

use serde::Serialize;
use std::collections::{btree_map, BTreeMap};
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

use crate::scaling::ScaledValue;

/// Lifecycle of a pipeline. There is no terminal state.
///
/// `Uninitialized -> ReferenceSet -> Ready -> Stale -> ReferenceSet`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// No reference yet; scenarios may be queued
    Uninitialized,
    /// A reference is set and nothing has been computed against it
    ReferenceSet,
    /// Results exist for the current reference; more are computed on demand
    Ready,
    /// Results exist but were computed against a replaced reference
    Stale,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Uninitialized => write!(f, "uninitialized"),
            PipelineState::ReferenceSet => write!(f, "reference_set"),
            PipelineState::Ready => write!(f, "ready"),
            PipelineState::Stale => write!(f, "stale"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ResultKey {
    pub scenario_id: String,
    pub indicator: String,
}

impl ResultKey {
    pub fn new(scenario_id: impl Into<String>, indicator: impl Into<String>) -> Self {
        Self {
            scenario_id: scenario_id.into(),
            indicator: indicator.into(),
        }
    }
}

impl fmt::Display for ResultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scenario_id, self.indicator)
    }
}

/// Output of `Pipeline::run`, keyed by (scenario id, indicator name).
///
/// Carries the reference epoch and id it was computed against, so a
/// consumer can tell when the store has moved on since.
#[derive(Debug, Clone)]
pub struct ScaledResults {
    epoch: u64,
    reference_id: String,
    scenario_ids: Vec<String>,
    entries: BTreeMap<ResultKey, Arc<[ScaledValue]>>,
}

impl ScaledResults {
    pub(crate) fn new(epoch: u64, reference_id: impl Into<String>) -> Self {
        Self {
            epoch,
            reference_id: reference_id.into(),
            scenario_ids: Vec::new(),
            entries: BTreeMap::new(),
        }
    }

    pub(crate) fn push_scenario(&mut self, scenario_id: impl Into<String>) {
        self.scenario_ids.push(scenario_id.into());
    }

    pub(crate) fn insert(&mut self, key: ResultKey, values: Arc<[ScaledValue]>) {
        self.entries.insert(key, values);
    }

    /// Reference epoch the values were computed against
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn reference_id(&self) -> &str {
        &self.reference_id
    }

    /// Scenarios covered by the run, in registration order
    pub fn scenario_ids(&self) -> &[String] {
        &self.scenario_ids
    }

    pub fn get(&self, key: &ResultKey) -> Option<&Arc<[ScaledValue]>> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &ResultKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, ResultKey, Arc<[ScaledValue]>> {
        self.entries.iter()
    }

    pub fn keys(&self) -> btree_map::Keys<'_, ResultKey, Arc<[ScaledValue]>> {
        self.entries.keys()
    }

    pub fn values(&self) -> btree_map::Values<'_, ResultKey, Arc<[ScaledValue]>> {
        self.entries.values()
    }
}

impl Index<&ResultKey> for ScaledResults {
    type Output = Arc<[ScaledValue]>;

    fn index(&self, key: &ResultKey) -> &Self::Output {
        &self.entries[key]
    }
}

impl<'a> IntoIterator for &'a ScaledResults {
    type Item = (&'a ResultKey, &'a Arc<[ScaledValue]>);
    type IntoIter = btree_map::Iter<'a, ResultKey, Arc<[ScaledValue]>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
