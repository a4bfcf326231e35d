use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::geometry::ElementRange;
use crate::id::{ElementId, ModelId};
use crate::store::ElementRow;

/// Bumped whenever the encoded layout changes; decode refuses a
/// mismatch instead of guessing.
pub const CHANGESET_FORMAT_VERSION: u32 = 1;

/// Identity of a finished revision, sequential per database.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct RevisionId(u64);

impl RevisionId {
    #[inline]
    pub fn new(raw: u64) -> Self {
        RevisionId(raw)
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rev-{:06}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// Snapshot of one element row as it appears on one side of a delta.
/// Properties are carried as their JSON wire bytes so the container
/// stays self-contained whatever the live property types were.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowImage {
    #[serde(with = "payload_serde")]
    pub properties: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<ElementRange>,
}

mod payload_serde {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(payload: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(payload).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

impl RowImage {
    pub fn of(row: &ElementRow) -> Result<Self, StoreError> {
        let properties =
            serde_json::to_vec(&row.properties).map_err(|e| StoreError::Codec(e.to_string()))?;
        Ok(RowImage {
            properties,
            range: row.range,
        })
    }

    /// Decode the property bag back to its JSON form.
    pub fn properties(&self) -> Result<serde_json::Value, StoreError> {
        serde_json::from_slice(&self.properties).map_err(|e| StoreError::Codec(e.to_string()))
    }
}

/// One element's delta between the two boundaries a revision brackets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub element: ElementId,
    pub model: ModelId,
    /// Logical class name; ids are connection-scoped and do not travel.
    pub class: String,
    pub op: ChangeOp,
    pub before: Option<RowImage>,
    pub after: Option<RowImage>,
}

/// The on-disk container a finished revision is encoded into: an opaque,
/// versioned delta consumed by synchronization components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSetFile {
    pub format_version: u32,
    pub revision: RevisionId,
    pub parent: Option<RevisionId>,
    pub records: Vec<ChangeRecord>,
}

impl ChangeSetFile {
    pub fn new(revision: RevisionId, parent: Option<RevisionId>, records: Vec<ChangeRecord>) -> Self {
        ChangeSetFile {
            format_version: CHANGESET_FORMAT_VERSION,
            revision,
            parent,
            records,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, StoreError> {
        bitcode::serialize(self).map_err(|e| StoreError::Codec(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StoreError> {
        let decoded: ChangeSetFile =
            bitcode::deserialize(bytes).map_err(|e| StoreError::Codec(e.to_string()))?;
        if decoded.format_version != CHANGESET_FORMAT_VERSION {
            return Err(StoreError::Codec(format!(
                "unsupported changeset format version {}",
                decoded.format_version
            )));
        }
        Ok(decoded)
    }

    pub fn read_from(path: &Path) -> Result<Self, StoreError> {
        let bytes = fs::read(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::decode(&bytes)
    }

    pub fn write_to(&self, path: &Path) -> Result<(), StoreError> {
        let bytes = self.encode()?;
        fs::write(path, bytes).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
