use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DocError, Result};

/// An opaque revision identifier: `"<generation>-<digest>"`.
///
/// `generation` is a 1-based integer that increments once per edit along a
/// branch; `digest` is any collision-resistant token distinguishing sibling
/// revisions at the same generation. This type only enforces the former —
/// the digest is treated as an opaque string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RevId {
    pub generation: u64,
    pub digest: String,
}

impl RevId {
    pub fn new(generation: u64, digest: impl Into<String>) -> Self {
        Self {
            generation,
            digest: digest.into(),
        }
    }

    /// Parse a `"<generation>-<digest>"` string (spec.md §4.1, I2).
    pub fn parse(s: &str) -> Result<Self> {
        let (gen_str, digest) = s
            .split_once('-')
            .ok_or_else(|| DocError::BadRequest(format!("malformed revID: {s}")))?;
        let generation: u64 = gen_str
            .parse()
            .map_err(|_| DocError::BadRequest(format!("malformed revID: {s}")))?;
        if generation == 0 {
            return Err(DocError::BadRequest(format!(
                "revID generation must be >= 1: {s}"
            )));
        }
        if digest.is_empty() {
            return Err(DocError::BadRequest(format!("malformed revID: {s}")));
        }
        Ok(RevId {
            generation,
            digest: digest.to_string(),
        })
    }

    /// Compute the successor of `prev` (or generation 1 if `prev` is `None`).
    ///
    /// The digest is a random UUID (32 lowercase hex characters, dashes
    /// stripped) rather than a canonical hash of the body — this matches the
    /// "source behavior" spec.md §9 explicitly sanctions, and means replaying
    /// the same body against two independent stores yields two different
    /// revIDs. Callers that need deterministic IDs (e.g. `forceInsert`
    /// splicing a remote chain) construct a `RevId` directly instead of
    /// calling this.
    pub fn next(prev: Option<&RevId>) -> Self {
        let generation = prev.map(|p| p.generation).unwrap_or(0) + 1;
        let digest = Uuid::new_v4().simple().to_string();
        RevId { generation, digest }
    }
}

impl fmt::Display for RevId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.generation, self.digest)
    }
}

impl FromStr for RevId {
    type Err = DocError;

    fn from_str(s: &str) -> Result<Self> {
        RevId::parse(s)
    }
}
