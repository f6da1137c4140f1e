//! Pipeline setup errors
//!
//! These are configuration errors: fatal to the call that raised them and
//! always returned to the caller. Data-quality problems never show up here,
//! they are recorded as a `ScaleStatus` on the affected value instead.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScalingError {
    #[error("no reference scenario has been set")]
    NoReference,

    #[error("reference scenario is already set to '{existing}'; use replace_reference to swap it")]
    DuplicateReference { existing: String },

    #[error("scenario id '{0}' is already registered")]
    DuplicateScenarioId(String),

    #[error("unknown scenario '{0}'")]
    UnknownScenario(String),

    #[error("scenario '{scenario}' has no indicator '{indicator}'")]
    UnknownIndicator { scenario: String, indicator: String },

    #[error("scenario '{0}' is the reference and is not scaled against itself")]
    ScenarioIsReference(String),

    #[error("results were computed against reference '{reference}' (epoch {computed}); the store is at epoch {current}")]
    StaleResults {
        reference: String,
        computed: u64,
        current: u64,
    },
}

pub type ScalingResult<T> = std::result::Result<T, ScalingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offender() {
        let err = ScalingError::DuplicateScenarioId("alt".into());
        assert_eq!(err.to_string(), "scenario id 'alt' is already registered");

        let err = ScalingError::UnknownIndicator {
            scenario: "alt".into(),
            indicator: "pop".into(),
        };
        assert!(err.to_string().contains("'pop'"));
    }

    #[test]
    fn test_converts_into_anyhow() {
        fn fails() -> anyhow::Result<()> {
            let result: ScalingResult<()> = Err(ScalingError::NoReference);
            result?;
            Ok(())
        }
        let err = fails().unwrap_err();
        assert_eq!(err.downcast_ref::<ScalingError>(), Some(&ScalingError::NoReference));
    }
}
