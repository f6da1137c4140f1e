//! Scaling Engine
//!
//! Scales one candidate indicator against the reference, unit by unit over
//! the aligned common units.

mod rule;
mod value;

pub use rule::{
    Difference, FnRule, MinMax, Normalized, NormalizationRule, PercentChange, Ratio, ReferenceSpan,
    RuleContext, RuleKind,
};
pub use value::{ScaleStatus, ScaledSummary, ScaledValue};

use std::sync::Arc;
use tracing::{debug, warn};

use crate::alignment::AlignmentResult;
use crate::scenario::Scenario;

pub const DEFAULT_EPSILON: f64 = 1e-12;

#[derive(Clone)]
pub struct ScalingEngine {
    rule: Arc<dyn NormalizationRule>,
    epsilon: f64,
}

impl ScalingEngine {
    /// A non-finite `epsilon` falls back to [`DEFAULT_EPSILON`].
    pub fn new(rule: Arc<dyn NormalizationRule>, epsilon: f64) -> Self {
        let epsilon = if epsilon.is_finite() {
            epsilon.abs()
        } else {
            warn!(epsilon, "Non-finite epsilon; using {}", DEFAULT_EPSILON);
            DEFAULT_EPSILON
        };
        Self { rule, epsilon }
    }

    pub fn rule_name(&self) -> &str {
        self.rule.name()
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Scale `indicator` for every common unit, in unit order.
    ///
    /// A missing raw reading wins over a missing reference reading. A
    /// reference within epsilon of zero is degenerate under every rule, and
    /// so is any rule output that is not finite.
    pub fn scale(
        &self,
        candidate: &Scenario,
        reference: &Scenario,
        alignment: &AlignmentResult,
        indicator: &str,
    ) -> Vec<ScaledValue> {
        let raw_series = candidate.indicator(indicator);
        let ref_series = reference.indicator(indicator);
        let ctx = RuleContext {
            span: ref_series
                .and_then(|s| s.span())
                .map(|(min, max)| ReferenceSpan { min, max }),
            epsilon: self.epsilon,
        };

        let values: Vec<ScaledValue> = alignment
            .common_units
            .iter()
            .map(|unit| {
                let raw_value = raw_series.and_then(|s| s.get(unit));
                let reference_value = ref_series.and_then(|s| s.get(unit));
                let outcome = self.normalize(raw_value, reference_value, &ctx);

                ScaledValue {
                    scenario_id: candidate.id().to_string(),
                    indicator: indicator.to_string(),
                    unit: unit.clone(),
                    raw_value,
                    reference_value,
                    scaled_value: outcome.value,
                    status: outcome.status,
                }
            })
            .collect();

        debug!(
            scenario = candidate.id(),
            indicator,
            rule = self.rule.name(),
            units = values.len(),
            "Scaled indicator"
        );
        values
    }

    fn normalize(&self, raw: Option<f64>, reference: Option<f64>, ctx: &RuleContext) -> Normalized {
        let Some(raw) = raw else {
            return Normalized {
                value: None,
                status: ScaleStatus::MissingRaw,
            };
        };
        let Some(reference) = reference else {
            return Normalized {
                value: None,
                status: ScaleStatus::MissingReference,
            };
        };
        if reference == 0.0 || reference.abs() <= self.epsilon {
            return Normalized::degenerate();
        }

        let out = self.rule.apply(raw, reference, ctx);
        match (out.status, out.value) {
            (ScaleStatus::Ok, Some(v)) if v.is_finite() => out,
            (ScaleStatus::Ok, _) => Normalized::degenerate(),
            (status, _) => Normalized { value: None, status },
        }
    }
}

impl Default for ScalingEngine {
    fn default() -> Self {
        Self::new(RuleKind::Ratio.build(), DEFAULT_EPSILON)
    }
}

impl std::fmt::Debug for ScalingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScalingEngine")
            .field("rule", &self.rule.name())
            .field("epsilon", &self.epsilon)
            .finish()
    }
}
