//! Scenario Store
//!
//! Holds the one reference scenario and the append-only list of other
//! scenarios. Writers are serialized behind a single lock; a scenario is
//! wrapped in its `Arc` before the lock is taken, so readers only ever see
//! fully built scenarios.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

use super::Scenario;
use crate::error::{ScalingError, ScalingResult};
use crate::pipeline::{EventBus, PipelineEvent};

#[derive(Default)]
struct StoreInner {
    reference: Option<Arc<Scenario>>,
    others: Vec<Arc<Scenario>>,
    positions: HashMap<String, usize>,
    /// Bumped every time the reference changes
    epoch: u64,
}

impl StoreInner {
    fn is_reference(&self, id: &str) -> bool {
        self.reference.as_ref().is_some_and(|r| r.id() == id)
    }
}

/// A consistent view of the store taken under one read lock
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    pub reference: Option<Arc<Scenario>>,
    pub others: Vec<Arc<Scenario>>,
    pub epoch: u64,
}

pub struct ScenarioStore {
    inner: RwLock<StoreInner>,
    events: Arc<EventBus>,
}

impl ScenarioStore {
    pub fn new() -> Self {
        Self::with_events(Arc::new(EventBus::new()))
    }

    pub fn with_events(events: Arc<EventBus>) -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            events,
        }
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Install the reference scenario.
    ///
    /// Fails if a reference already exists; swapping one out has to go
    /// through `replace_reference`.
    pub fn set_reference(&self, scenario: impl Into<Arc<Scenario>>) -> ScalingResult<Arc<Scenario>> {
        let scenario = scenario.into();
        {
            let mut inner = self.write();
            if let Some(existing) = &inner.reference {
                return Err(ScalingError::DuplicateReference {
                    existing: existing.id().to_string(),
                });
            }
            if inner.positions.contains_key(scenario.id()) {
                return Err(ScalingError::DuplicateScenarioId(scenario.id().to_string()));
            }
            inner.reference = Some(scenario.clone());
            inner.epoch += 1;
            // Published under the lock so events arrive in epoch order
            self.events.publish(PipelineEvent::ReferenceSet {
                scenario_id: scenario.id().to_string(),
                epoch: inner.epoch,
            });
        }

        info!(
            "Reference scenario '{}' set ({} units, {} indicators)",
            scenario.id(),
            scenario.signature().len(),
            scenario.indicators().len()
        );
        Ok(scenario)
    }

    /// Swap in a new reference, invalidating every scaled value computed
    /// against the old one. Returns the previous reference, which is not
    /// demoted into the other scenarios.
    pub fn replace_reference(
        &self,
        scenario: impl Into<Arc<Scenario>>,
    ) -> ScalingResult<Option<Arc<Scenario>>> {
        let scenario = scenario.into();
        let previous = {
            let mut inner = self.write();
            if inner.positions.contains_key(scenario.id()) {
                return Err(ScalingError::DuplicateScenarioId(scenario.id().to_string()));
            }
            let previous = inner.reference.replace(scenario.clone());
            inner.epoch += 1;
            let epoch = inner.epoch;
            self.events.publish(match &previous {
                Some(old) => PipelineEvent::ReferenceReplaced {
                    previous: old.id().to_string(),
                    current: scenario.id().to_string(),
                    epoch,
                },
                None => PipelineEvent::ReferenceSet {
                    scenario_id: scenario.id().to_string(),
                    epoch,
                },
            });
            previous
        };

        match &previous {
            Some(old) => warn!(
                "Reference replaced: '{}' -> '{}'; scaled results are stale",
                old.id(),
                scenario.id()
            ),
            None => info!("Reference scenario '{}' set", scenario.id()),
        }
        Ok(previous)
    }

    /// Register a non-reference scenario. Allowed before a reference
    /// exists; such scenarios wait until one is set.
    pub fn add_scenario(&self, scenario: impl Into<Arc<Scenario>>) -> ScalingResult<Arc<Scenario>> {
        let scenario = scenario.into();
        let queued = {
            let mut inner = self.write();
            if inner.is_reference(scenario.id()) || inner.positions.contains_key(scenario.id()) {
                return Err(ScalingError::DuplicateScenarioId(scenario.id().to_string()));
            }
            let position = inner.others.len();
            inner.positions.insert(scenario.id().to_string(), position);
            inner.others.push(scenario.clone());
            self.events.publish(PipelineEvent::ScenarioRegistered {
                scenario_id: scenario.id().to_string(),
            });
            inner.reference.is_none()
        };

        if queued {
            info!("Scenario '{}' queued until a reference is set", scenario.id());
        } else {
            info!("Scenario '{}' registered", scenario.id());
        }
        Ok(scenario)
    }

    pub fn reference(&self) -> Option<Arc<Scenario>> {
        self.read().reference.clone()
    }

    pub fn require_reference(&self) -> ScalingResult<Arc<Scenario>> {
        self.reference().ok_or(ScalingError::NoReference)
    }

    /// The reference together with the epoch it belongs to
    pub fn reference_with_epoch(&self) -> ScalingResult<(Arc<Scenario>, u64)> {
        let inner = self.read();
        match &inner.reference {
            Some(reference) => Ok((reference.clone(), inner.epoch)),
            None => Err(ScalingError::NoReference),
        }
    }

    /// Non-reference scenarios in registration order
    pub fn list_others(&self) -> Vec<Arc<Scenario>> {
        self.read().others.clone()
    }

    /// A registered non-reference scenario by id
    pub fn get(&self, id: &str) -> Option<Arc<Scenario>> {
        let inner = self.read();
        inner.positions.get(id).map(|&i| inner.others[i].clone())
    }

    pub fn is_reference(&self, id: &str) -> bool {
        self.read().is_reference(id)
    }

    pub fn epoch(&self) -> u64 {
        self.read().epoch
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let inner = self.read();
        StoreSnapshot {
            reference: inner.reference.clone(),
            others: inner.others.clone(),
            epoch: inner.epoch,
        }
    }

    pub fn len(&self) -> usize {
        let inner = self.read();
        inner.others.len() + usize::from(inner.reference.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ScenarioStore {
    fn default() -> Self {
        Self::new()
    }
}
