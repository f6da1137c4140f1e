//! Spatial Unit Index
//!
//! Canonicalizes raw region identifiers and interns them so every scenario
//! that mentions a region shares one `SpatialUnit` handle.

mod canonical;
mod index;

pub use canonical::{CanonicalRule, CanonicalizationError, CaseFold};
pub use index::SpatialIndex;

use serde::{Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// A canonical spatial identifier (region code, grid cell id, ...).
///
/// Only `SpatialIndex` creates these, so every value already went through
/// the canonical rule. Cloning is a reference-count bump.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpatialUnit(Arc<str>);

impl SpatialUnit {
    pub(crate) fn from_canonical(canonical: impl Into<Arc<str>>) -> Self {
        Self(canonical.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SpatialUnit {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpatialUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for SpatialUnit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}
