//! Scenario types

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

use crate::spatial::{CanonicalizationError, SpatialIndex, SpatialUnit};

/// Indicator readings keyed by spatial unit. May be partial.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct IndicatorSeries {
    values: BTreeMap<SpatialUnit, f64>,
}

impl IndicatorSeries {
    pub fn get(&self, unit: &SpatialUnit) -> Option<f64> {
        self.values.get(unit).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SpatialUnit, f64)> {
        self.values.iter().map(|(u, v)| (u, *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Smallest and largest reading, `None` for an empty series.
    pub fn span(&self) -> Option<(f64, f64)> {
        self.values.values().fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }

    fn insert(&mut self, unit: SpatialUnit, value: f64) -> Option<f64> {
        self.values.insert(unit, value)
    }
}

/// A named dataset of indicator values over a spatial signature.
///
/// Immutable once built. Every unit carrying a reading belongs to the
/// signature; the builder enforces that.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scenario {
    id: String,
    signature: BTreeSet<SpatialUnit>,
    indicators: BTreeMap<String, IndicatorSeries>,
}

impl Scenario {
    pub fn builder<'a>(id: impl Into<String>, index: &'a SpatialIndex) -> ScenarioBuilder<'a> {
        ScenarioBuilder {
            id: id.into(),
            index,
            signature: BTreeSet::new(),
            indicators: BTreeMap::new(),
            rejected: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn signature(&self) -> &BTreeSet<SpatialUnit> {
        &self.signature
    }

    pub fn indicators(&self) -> &BTreeMap<String, IndicatorSeries> {
        &self.indicators
    }

    pub fn indicator(&self, name: &str) -> Option<&IndicatorSeries> {
        self.indicators.get(name)
    }

    pub fn indicator_names(&self) -> impl Iterator<Item = &str> {
        self.indicators.keys().map(String::as_str)
    }

    /// Reading for `indicator` at `unit`, if the scenario reports one.
    pub fn value(&self, indicator: &str, unit: &SpatialUnit) -> Option<f64> {
        self.indicators.get(indicator).and_then(|s| s.get(unit))
    }
}

/// Builds a `Scenario` from raw identifiers, canonicalizing each through
/// the shared index.
///
/// A malformed identifier drops that one unit (and its readings) with a
/// warning; the rest of the scenario is kept.
pub struct ScenarioBuilder<'a> {
    id: String,
    index: &'a SpatialIndex,
    signature: BTreeSet<SpatialUnit>,
    indicators: BTreeMap<String, IndicatorSeries>,
    rejected: Vec<CanonicalizationError>,
}

impl ScenarioBuilder<'_> {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Declare a unit in the signature, with or without readings.
    pub fn unit(mut self, raw: &str) -> Self {
        self.resolve(raw);
        self
    }

    pub fn units<'r>(mut self, raws: impl IntoIterator<Item = &'r str>) -> Self {
        for raw in raws {
            self.resolve(raw);
        }
        self
    }

    /// Record one reading. The unit joins the signature even when the value
    /// itself is unusable.
    pub fn value(mut self, indicator: &str, raw: &str, value: f64) -> Self {
        self.push_value(indicator, raw, value);
        self
    }

    pub fn push_value(&mut self, indicator: &str, raw: &str, value: f64) {
        if let Some(unit) = self.resolve(raw) {
            self.push_resolved(indicator, &unit, value);
        }
    }

    /// Record a reading for a unit already returned by `push_unit`.
    pub fn push_resolved(&mut self, indicator: &str, unit: &SpatialUnit, value: f64) {
        self.signature.insert(unit.clone());

        if !value.is_finite() {
            warn!(
                scenario = %self.id,
                indicator,
                unit = %unit,
                "Skipping non-finite reading {}",
                value
            );
            return;
        }

        let series = self.indicators.entry(indicator.to_string()).or_default();
        if let Some(previous) = series.insert(unit.clone(), value) {
            if previous != value {
                warn!(
                    scenario = %self.id,
                    indicator,
                    unit = %unit,
                    "Conflicting readings {} and {} for one unit, keeping the latter",
                    previous,
                    value
                );
            }
        }
    }

    /// Declare a unit, returning its canonical form unless it was rejected.
    pub fn push_unit(&mut self, raw: &str) -> Option<SpatialUnit> {
        self.resolve(raw)
    }

    /// Identifiers dropped so far because they failed canonicalization
    pub fn rejected(&self) -> &[CanonicalizationError] {
        &self.rejected
    }

    pub fn build(self) -> Scenario {
        if !self.rejected.is_empty() {
            warn!(
                scenario = %self.id,
                "Dropped {} malformed spatial identifiers",
                self.rejected.len()
            );
        }
        Scenario {
            id: self.id,
            signature: self.signature,
            indicators: self.indicators,
        }
    }

    fn resolve(&mut self, raw: &str) -> Option<SpatialUnit> {
        match self.index.canonicalize(raw) {
            Ok(unit) => {
                self.signature.insert(unit.clone());
                Some(unit)
            }
            Err(e) => {
                warn!(scenario = %self.id, "Excluding spatial unit: {}", e);
                self.rejected.push(e);
                None
            }
        }
    }
}
