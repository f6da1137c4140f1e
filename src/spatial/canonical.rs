//! Canonical spelling of raw spatial identifiers
//!
//! Scenario files spell the same region in different ways (`"e00042786"`,
//! `" E00042786 "`, `"E000 42786"`). Every spelling must fold onto one key
//! or the aligner reports spurious coverage gaps.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Characters allowed in a canonical identifier besides ASCII alphanumerics.
const SEPARATORS: &[char] = &['-', '_', '.', ':', '/'];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CanonicalizationError {
    #[error("spatial identifier {raw:?} is empty after trimming")]
    Empty { raw: String },

    #[error("spatial identifier {raw:?} contains invalid character {ch:?}")]
    InvalidCharacter { raw: String, ch: char },
}

/// Case folding applied to identifiers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseFold {
    #[default]
    Upper,
    Lower,
    Preserve,
}

/// The fixed rule mapping raw identifiers to canonical ones.
///
/// Applying the rule to its own output is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanonicalRule {
    pub case: CaseFold,
    /// Drop interior whitespace entirely. When false, interior runs of
    /// whitespace collapse to a single space.
    pub strip_whitespace: bool,
}

impl Default for CanonicalRule {
    fn default() -> Self {
        Self {
            case: CaseFold::Upper,
            strip_whitespace: true,
        }
    }
}

impl CanonicalRule {
    pub fn apply(&self, raw: &str) -> Result<String, CanonicalizationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CanonicalizationError::Empty { raw: raw.to_string() });
        }

        let mut out = String::with_capacity(trimmed.len());
        let mut in_gap = false;
        for ch in trimmed.chars() {
            if ch.is_whitespace() {
                in_gap = true;
                continue;
            }
            if in_gap && !self.strip_whitespace {
                out.push(' ');
            }
            in_gap = false;

            if !(ch.is_ascii_alphanumeric() || SEPARATORS.contains(&ch)) {
                return Err(CanonicalizationError::InvalidCharacter {
                    raw: raw.to_string(),
                    ch,
                });
            }
            out.push(match self.case {
                CaseFold::Upper => ch.to_ascii_uppercase(),
                CaseFold::Lower => ch.to_ascii_lowercase(),
                CaseFold::Preserve => ch,
            });
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "E00042786",
        "e00042786",
        "  E00042786\t",
        "E000 42786",
        "e000   42786 ",
        "R1",
        "lsoa:E01008162",
        "h3/8a194ad32a5ffff",
        "Tyne-and_Wear.01",
    ];

    #[test]
    fn test_spellings_fold_together() {
        let rule = CanonicalRule::default();
        let canon: Vec<String> = SAMPLES[..5].iter().map(|s| rule.apply(s).unwrap()).collect();
        assert!(canon.iter().all(|c| c == "E00042786"));
    }

    #[test]
    fn test_idempotent_for_every_rule() {
        let rules = [
            CanonicalRule::default(),
            CanonicalRule { case: CaseFold::Lower, strip_whitespace: true },
            CanonicalRule { case: CaseFold::Preserve, strip_whitespace: false },
            CanonicalRule { case: CaseFold::Upper, strip_whitespace: false },
        ];
        for rule in rules {
            for raw in SAMPLES {
                let once = rule.apply(raw).unwrap();
                assert_eq!(rule.apply(&once).unwrap(), once, "rule {:?} on {:?}", rule, raw);
            }
        }
    }

    #[test]
    fn test_interior_whitespace_collapses_when_kept() {
        let rule = CanonicalRule { case: CaseFold::Preserve, strip_whitespace: false };
        assert_eq!(rule.apply(" North   Tyneside ").unwrap(), "North Tyneside");
    }

    #[test]
    fn test_malformed_identifiers() {
        let rule = CanonicalRule::default();
        assert!(matches!(rule.apply("   "), Err(CanonicalizationError::Empty { .. })));
        assert!(matches!(
            rule.apply("E0004#2786"),
            Err(CanonicalizationError::InvalidCharacter { ch: '#', .. })
        ));
        assert!(matches!(
            rule.apply("Gateshead\u{0}"),
            Err(CanonicalizationError::InvalidCharacter { .. })
        ));
        assert!(rule.apply("Zürich").is_err());
    }

    #[test]
    fn test_deserializes_partial_rule() {
        let rule: CanonicalRule = serde_yaml::from_str("case: lower").unwrap();
        assert_eq!(rule.case, CaseFold::Lower);
        assert!(rule.strip_whitespace);
    }
}
