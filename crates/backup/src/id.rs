//! Snapshot identifiers
//!
//! An identifier is derived from the snapshot's creation instant:
//!
//! ```text
//! backup-YYYY-MM-DDTHH-mm-ss-sssZ
//! backup-2024-01-01T00-00-00-000Z
//! ```
//!
//! Colons and the fractional-second dot of an RFC 3339 timestamp are
//! replaced with hyphens so the identifier is a valid directory name on
//! every platform. Identifiers sort lexicographically in creation order.
//!
//! An identifier is also a directory name under the backups root, so
//! parsing is strict: anything that is not exactly this shape is refused
//! before it can be joined onto a path.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Fixed identifier prefix
pub const SNAPSHOT_ID_PREFIX: &str = "backup-";

/// `d` marks an ASCII digit, anything else must match literally
const TIMESTAMP_TEMPLATE: &[u8] = b"dddd-dd-ddTdd-dd-dd-dddZ";

const SNAPSHOT_ID_LEN: usize = SNAPSHOT_ID_PREFIX.len() + TIMESTAMP_TEMPLATE.len();

/// Identifier rejected by [`SnapshotId::parse`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid snapshot identifier {id:?}: {reason}")]
pub struct InvalidSnapshotId {
    /// The rejected input
    pub id: String,
    /// What was wrong with it
    pub reason: &'static str,
}

/// Validated snapshot identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SnapshotId(String);

impl SnapshotId {
    /// Identifier for a snapshot created at `at` (millisecond precision)
    pub fn from_timestamp(at: DateTime<Utc>) -> Self {
        SnapshotId(format!(
            "{}{}",
            SNAPSHOT_ID_PREFIX,
            at.format("%Y-%m-%dT%H-%M-%S-%3fZ")
        ))
    }

    /// Identifier one millisecond after this one.
    ///
    /// Used to step past a directory that already exists when two
    /// snapshots are requested within the same millisecond.
    pub fn next(&self) -> Self {
        Self::from_timestamp(self.timestamp() + Duration::milliseconds(1))
    }

    /// Parse and validate an identifier
    pub fn parse(id: &str) -> Result<Self, InvalidSnapshotId> {
        let reject = |reason| InvalidSnapshotId {
            id: id.to_string(),
            reason,
        };

        if id.contains("..") || id.contains('/') || id.contains('\\') {
            return Err(reject("contains a path separator or parent reference"));
        }
        if id.len() != SNAPSHOT_ID_LEN {
            return Err(reject("wrong length"));
        }
        let stamp = id
            .strip_prefix(SNAPSHOT_ID_PREFIX)
            .ok_or_else(|| reject("missing backup- prefix"))?;

        let well_formed = stamp
            .bytes()
            .zip(TIMESTAMP_TEMPLATE)
            .all(|(c, &t)| if t == b'd' { c.is_ascii_digit() } else { c == t });
        if !well_formed {
            return Err(reject("timestamp does not match YYYY-MM-DDTHH-mm-ss-sssZ"));
        }

        decode_timestamp(stamp).ok_or_else(|| reject("timestamp is not a valid date"))?;
        Ok(SnapshotId(id.to_string()))
    }

    /// Creation instant encoded in the identifier
    pub fn timestamp(&self) -> DateTime<Utc> {
        // Only validated identifiers are ever constructed.
        decode_timestamp(&self.0[SNAPSHOT_ID_PREFIX.len()..]).unwrap_or_default()
    }

    /// Identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Decode a template-conforming timestamp (`2024-01-01T00-00-00-000Z`)
fn decode_timestamp(stamp: &str) -> Option<DateTime<Utc>> {
    let num = |range: std::ops::Range<usize>| stamp.get(range)?.parse::<u32>().ok();

    let year = num(0..4)? as i32;
    let date = NaiveDate::from_ymd_opt(year, num(5..7)?, num(8..10)?)?;
    let time = date.and_hms_milli_opt(num(11..13)?, num(14..16)?, num(17..19)?, num(20..23)?)?;
    Some(time.and_utc())
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SnapshotId {
    type Err = InvalidSnapshotId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SnapshotId {
    type Error = InvalidSnapshotId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SnapshotId> for String {
    fn from(id: SnapshotId) -> Self {
        id.0
    }
}

impl AsRef<str> for SnapshotId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
