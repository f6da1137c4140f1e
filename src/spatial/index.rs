use std::collections::{BTreeSet, HashSet};
use std::sync::{PoisonError, RwLock};

use super::{CanonicalRule, CanonicalizationError, SpatialUnit};
use crate::scenario::Scenario;

/// Interning index of every spatial unit seen by the pipeline
pub struct SpatialIndex {
    rule: CanonicalRule,
    units: RwLock<HashSet<SpatialUnit>>,
}

impl SpatialIndex {
    pub fn new(rule: CanonicalRule) -> Self {
        Self {
            rule,
            units: RwLock::new(HashSet::new()),
        }
    }

    pub fn rule(&self) -> CanonicalRule {
        self.rule
    }

    /// Map a raw identifier to its shared canonical unit.
    ///
    /// Deterministic for a given rule: two spellings of the same region
    /// return equal units no matter which scenario introduced them first.
    pub fn canonicalize(&self, raw: &str) -> Result<SpatialUnit, CanonicalizationError> {
        let canonical = self.rule.apply(raw)?;

        {
            let units = self.units.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(unit) = units.get(canonical.as_str()) {
                return Ok(unit.clone());
            }
        }

        let mut units = self.units.write().unwrap_or_else(PoisonError::into_inner);
        // Another writer may have interned it between the two locks.
        if let Some(unit) = units.get(canonical.as_str()) {
            return Ok(unit.clone());
        }
        let unit = SpatialUnit::from_canonical(canonical);
        units.insert(unit.clone());
        Ok(unit)
    }

    /// The canonical spatial signature of a scenario
    pub fn units_of<'a>(&self, scenario: &'a Scenario) -> &'a BTreeSet<SpatialUnit> {
        scenario.signature()
    }

    /// Look up an already-interned unit without registering a new one.
    pub fn lookup(&self, raw: &str) -> Option<SpatialUnit> {
        let canonical = self.rule.apply(raw).ok()?;
        let units = self.units.read().unwrap_or_else(PoisonError::into_inner);
        units.get(canonical.as_str()).cloned()
    }

    pub fn len(&self) -> usize {
        self.units.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new(CanonicalRule::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_interns_spellings_to_one_unit() {
        let index = SpatialIndex::default();
        let a = index.canonicalize("e00042786").unwrap();
        let b = index.canonicalize(" E00042786 ").unwrap();

        assert_eq!(a, b);
        assert_eq!(a.as_str(), "E00042786");
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_canonicalize_is_idempotent() {
        let index = SpatialIndex::default();
        for raw in ["r1", " R2 ", "lsoa:e01008162", "A b-c"] {
            let once = index.canonicalize(raw).unwrap();
            let twice = index.canonicalize(once.as_str()).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_failures_do_not_intern() {
        let index = SpatialIndex::default();
        assert!(index.canonicalize("").is_err());
        assert!(index.canonicalize("bad;id").is_err());
        assert!(index.is_empty());
    }

    #[test]
    fn test_lookup_does_not_register() {
        let index = SpatialIndex::default();
        assert!(index.lookup("R1").is_none());
        index.canonicalize("r1").unwrap();
        assert_eq!(index.lookup(" R1").unwrap().as_str(), "R1");
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_concurrent_interning_converges() {
        let index = Arc::new(SpatialIndex::default());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let index = index.clone();
                std::thread::spawn(move || {
                    let raw = if i % 2 == 0 { "e00042786" } else { "E00042786 " };
                    index.canonicalize(raw).unwrap()
                })
            })
            .collect();

        let units: Vec<SpatialUnit> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(units.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(index.len(), 1);
    }
}
