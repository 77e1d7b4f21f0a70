//! Verdict model

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Wire value meaning "no verdict known". Never persisted; the store and
/// cache only ever hold levels >= 0.
pub const RISK_UNKNOWN: i32 = -1;

/// A risk classification bound to a content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct VerdictRecord {
    pub hash: String,
    pub risk_level: i32,
}

/// Resolution outcome for a single hash.
///
/// `Unknown` is a first-class variant rather than a sentinel integer, so an
/// absent verdict cannot accidentally reach the store or cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashVerdict {
    Known(VerdictRecord),
    Unknown { hash: String },
}

impl HashVerdict {
    pub fn hash(&self) -> &str {
        match self {
            HashVerdict::Known(record) => &record.hash,
            HashVerdict::Unknown { hash } => hash,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, HashVerdict::Unknown { .. })
    }

    /// Flatten to the wire record; `Unknown` maps to [`RISK_UNKNOWN`].
    pub fn into_record(self) -> VerdictRecord {
        match self {
            HashVerdict::Known(record) => record,
            HashVerdict::Unknown { hash } => VerdictRecord {
                hash,
                risk_level: RISK_UNKNOWN,
            },
        }
    }
}

/// Verdict pair resolved for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventVerdicts {
    pub file: HashVerdict,
    pub process: HashVerdict,
}

/// Wire response for event resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsResponse {
    pub file: VerdictRecord,
    pub process: VerdictRecord,
}

impl From<EventVerdicts> for EventsResponse {
    fn from(verdicts: EventVerdicts) -> Self {
        Self {
            file: verdicts.file.into_record(),
            process: verdicts.process.into_record(),
        }
    }
}
