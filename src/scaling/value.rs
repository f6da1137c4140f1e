//! Scaled value records

use serde::Serialize;
use std::fmt;

use crate::spatial::SpatialUnit;

/// Outcome of scaling one unit. Always set explicitly, never defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScaleStatus {
    Ok,
    MissingRaw,
    MissingReference,
    DegenerateReference,
}

impl ScaleStatus {
    pub fn is_ok(self) -> bool {
        matches!(self, ScaleStatus::Ok)
    }
}

impl fmt::Display for ScaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaleStatus::Ok => write!(f, "OK"),
            ScaleStatus::MissingRaw => write!(f, "MISSING_RAW"),
            ScaleStatus::MissingReference => write!(f, "MISSING_REFERENCE"),
            ScaleStatus::DegenerateReference => write!(f, "DEGENERATE_REFERENCE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScaledValue {
    pub scenario_id: String,
    pub indicator: String,
    pub unit: SpatialUnit,
    pub raw_value: Option<f64>,
    pub reference_value: Option<f64>,
    /// Present only when `status` is `Ok`
    pub scaled_value: Option<f64>,
    pub status: ScaleStatus,
}

/// Per-status counts and the spread of OK values for one result series
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScaledSummary {
    pub ok: usize,
    pub missing_raw: usize,
    pub missing_reference: usize,
    pub degenerate_reference: usize,
    pub min: Option<f64>,
    pub mean: Option<f64>,
    pub max: Option<f64>,
}

impl ScaledSummary {
    pub fn from_values(values: &[ScaledValue]) -> Self {
        let mut summary = Self::default();
        let mut sum = 0.0;

        for v in values {
            match v.status {
                ScaleStatus::Ok => summary.ok += 1,
                ScaleStatus::MissingRaw => summary.missing_raw += 1,
                ScaleStatus::MissingReference => summary.missing_reference += 1,
                ScaleStatus::DegenerateReference => summary.degenerate_reference += 1,
            }
            if let (ScaleStatus::Ok, Some(x)) = (v.status, v.scaled_value) {
                sum += x;
                summary.min = Some(summary.min.map_or(x, |m| m.min(x)));
                summary.max = Some(summary.max.map_or(x, |m| m.max(x)));
            }
        }

        if summary.ok > 0 {
            summary.mean = Some(sum / summary.ok as f64);
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.ok + self.missing_raw + self.missing_reference + self.degenerate_reference
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::SpatialIndex;

    fn value(index: &SpatialIndex, unit: &str, scaled: Option<f64>, status: ScaleStatus) -> ScaledValue {
        ScaledValue {
            scenario_id: "alt".into(),
            indicator: "pop".into(),
            unit: index.canonicalize(unit).unwrap(),
            raw_value: None,
            reference_value: None,
            scaled_value: scaled,
            status,
        }
    }

    #[test]
    fn test_summary_counts_and_spread() {
        let index = SpatialIndex::default();
        let values = vec![
            value(&index, "R1", Some(1.5), ScaleStatus::Ok),
            value(&index, "R2", Some(0.5), ScaleStatus::Ok),
            value(&index, "R3", None, ScaleStatus::MissingRaw),
            value(&index, "R4", None, ScaleStatus::DegenerateReference),
        ];

        let summary = ScaledSummary::from_values(&values);
        assert_eq!(summary.ok, 2);
        assert_eq!(summary.missing_raw, 1);
        assert_eq!(summary.degenerate_reference, 1);
        assert_eq!(summary.total(), 4);
        assert_eq!(summary.min, Some(0.5));
        assert_eq!(summary.max, Some(1.5));
        assert_eq!(summary.mean, Some(1.0));
    }

    #[test]
    fn test_summary_without_ok_values() {
        let index = SpatialIndex::default();
        let values = vec![value(&index, "R1", None, ScaleStatus::MissingReference)];
        let summary = ScaledSummary::from_values(&values);
        assert_eq!(summary.mean, None);
        assert_eq!(summary.min, None);
    }

    #[test]
    fn test_status_serializes_screaming() {
        let json = serde_json::to_string(&ScaleStatus::DegenerateReference).unwrap();
        assert_eq!(json, "\"DEGENERATE_REFERENCE\"");
        assert_eq!(ScaleStatus::MissingRaw.to_string(), "MISSING_RAW");
    }
}
