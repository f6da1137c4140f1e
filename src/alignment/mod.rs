//! Aligner
//!
//! Matches a candidate scenario's spatial units against the reference's.
//! Pure set algebra over canonical signatures; safe to run concurrently for
//! any number of candidates.

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::scenario::Scenario;
use crate::spatial::SpatialUnit;

/// Coverage of one candidate against the reference.
///
/// `common_units` and `only_in_candidate` partition the candidate's
/// signature; `common_units` and `only_in_reference` partition the
/// reference's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlignmentResult {
    pub candidate_id: String,
    pub reference_id: String,
    pub common_units: BTreeSet<SpatialUnit>,
    pub only_in_candidate: BTreeSet<SpatialUnit>,
    pub only_in_reference: BTreeSet<SpatialUnit>,
}

impl AlignmentResult {
    pub fn has_overlap(&self) -> bool {
        !self.common_units.is_empty()
    }

    /// True when both signatures are identical
    pub fn is_complete(&self) -> bool {
        self.only_in_candidate.is_empty() && self.only_in_reference.is_empty()
    }

    /// Share of the candidate's units that the reference also covers
    pub fn candidate_coverage(&self) -> f64 {
        let total = self.common_units.len() + self.only_in_candidate.len();
        if total == 0 {
            return 0.0;
        }
        self.common_units.len() as f64 / total as f64
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Aligner;

impl Aligner {
    pub fn new() -> Self {
        Self
    }

    pub fn align(&self, candidate: &Scenario, reference: &Scenario) -> AlignmentResult {
        let cand = candidate.signature();
        let refs = reference.signature();

        let common_units: BTreeSet<SpatialUnit> = cand.intersection(refs).cloned().collect();
        let only_in_candidate: BTreeSet<SpatialUnit> = cand.difference(refs).cloned().collect();
        let only_in_reference: BTreeSet<SpatialUnit> = refs.difference(cand).cloned().collect();

        if common_units.is_empty() {
            warn!(
                candidate = candidate.id(),
                reference = reference.id(),
                "No spatial units in common; scenario will produce no scaled values"
            );
        } else {
            debug!(
                candidate = candidate.id(),
                common = common_units.len(),
                only_candidate = only_in_candidate.len(),
                only_reference = only_in_reference.len(),
                "Aligned against reference"
            );
        }

        AlignmentResult {
            candidate_id: candidate.id().to_string(),
            reference_id: reference.id().to_string(),
            common_units,
            only_in_candidate,
            only_in_reference,
        }
    }
}
