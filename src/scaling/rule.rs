//! Normalization rules
//!
//! A rule turns one (raw, reference) pair into a scaled value. The rule is
//! chosen once per pipeline and applied to every scenario and indicator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::ScaleStatus;

/// Range of the reference scenario's whole indicator series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceSpan {
    pub min: f64,
    pub max: f64,
}

impl ReferenceSpan {
    pub fn width(&self) -> f64 {
        self.max - self.min
    }
}

/// Inputs shared by every unit of one indicator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleContext {
    pub span: Option<ReferenceSpan>,
    pub epsilon: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalized {
    pub value: Option<f64>,
    pub status: ScaleStatus,
}

impl Normalized {
    pub fn ok(value: f64) -> Self {
        Self {
            value: Some(value),
            status: ScaleStatus::Ok,
        }
    }

    pub fn degenerate() -> Self {
        Self {
            value: None,
            status: ScaleStatus::DegenerateReference,
        }
    }
}

pub trait NormalizationRule: Send + Sync {
    fn name(&self) -> &str;

    fn apply(&self, raw: f64, reference: f64, ctx: &RuleContext) -> Normalized;
}

/// `raw / reference`
#[derive(Debug, Clone, Copy, Default)]
pub struct Ratio;

impl NormalizationRule for Ratio {
    fn name(&self) -> &str {
        "ratio"
    }

    fn apply(&self, raw: f64, reference: f64, ctx: &RuleContext) -> Normalized {
        if reference.abs() <= ctx.epsilon {
            return Normalized::degenerate();
        }
        Normalized::ok(raw / reference)
    }
}

/// `raw - reference`
#[derive(Debug, Clone, Copy, Default)]
pub struct Difference;

impl NormalizationRule for Difference {
    fn name(&self) -> &str {
        "difference"
    }

    fn apply(&self, raw: f64, reference: f64, _ctx: &RuleContext) -> Normalized {
        Normalized::ok(raw - reference)
    }
}

/// `(raw - reference) / reference * 100`
#[derive(Debug, Clone, Copy, Default)]
pub struct PercentChange;

impl NormalizationRule for PercentChange {
    fn name(&self) -> &str {
        "percent_change"
    }

    fn apply(&self, raw: f64, reference: f64, ctx: &RuleContext) -> Normalized {
        if reference.abs() <= ctx.epsilon {
            return Normalized::degenerate();
        }
        Normalized::ok((raw - reference) / reference * 100.0)
    }
}

/// `(raw - min) / (max - min)` over the reference's whole series.
///
/// Values outside the reference range are not clamped, so a candidate
/// exceeding the baseline maximum scores above 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinMax;

impl NormalizationRule for MinMax {
    fn name(&self) -> &str {
        "min_max"
    }

    fn apply(&self, raw: f64, _reference: f64, ctx: &RuleContext) -> Normalized {
        match ctx.span {
            Some(span) if span.width().abs() > ctx.epsilon => {
                Normalized::ok((raw - span.min) / span.width())
            }
            _ => Normalized::degenerate(),
        }
    }
}

/// Adapter for a closure rule
pub struct FnRule<F> {
    name: String,
    f: F,
}

impl<F> FnRule<F>
where
    F: Fn(f64, f64, &RuleContext) -> Normalized + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f }
    }
}

impl<F> NormalizationRule for FnRule<F>
where
    F: Fn(f64, f64, &RuleContext) -> Normalized + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, raw: f64, reference: f64, ctx: &RuleContext) -> Normalized {
        (self.f)(raw, reference, ctx)
    }
}

/// Built-in rules selectable from configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    #[default]
    Ratio,
    Difference,
    PercentChange,
    MinMax,
}

impl RuleKind {
    pub fn build(self) -> Arc<dyn NormalizationRule> {
        match self {
            RuleKind::Ratio => Arc::new(Ratio),
            RuleKind::Difference => Arc::new(Difference),
            RuleKind::PercentChange => Arc::new(PercentChange),
            RuleKind::MinMax => Arc::new(MinMax),
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::Ratio => write!(f, "ratio"),
            RuleKind::Difference => write!(f, "difference"),
            RuleKind::PercentChange => write!(f, "percent_change"),
            RuleKind::MinMax => write!(f, "min_max"),
        }
    }
}
