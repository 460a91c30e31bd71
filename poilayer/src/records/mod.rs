//! Internally-owned record sets consumed by the pipeline.
//!
//! The pipeline only reads these sets; creating, editing and approving rows
//! happens elsewhere. [`RecordSource`] is the seam: production code plugs in
//! whatever persistence owns the rows, tests and the CLI use
//! [`InMemoryRecordSource`].

mod memory;

pub use memory::InMemoryRecordSource;

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::region::Region;

/// Errors raised by record accessors.
#[derive(Debug, Error)]
pub enum RecordError {
    /// Failed to read a record file.
    #[error("Failed to read records from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A record file did not contain a JSON array of rows.
    #[error("Failed to parse records from {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The backing store could not be reached.
    #[error("Record source unavailable: {0}")]
    Unavailable(String),
}

/// A hand-curated entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuratedRecord {
    #[serde(deserialize_with = "deserialize_record_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Rows without a coordinate are kept here and dropped at merge time.
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub region: String,
}

/// Lifecycle state of an operator-entered row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatorStatus {
    #[default]
    Active,
    Inactive,
}

impl fmt::Display for OperatorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorStatus::Active => f.write_str("active"),
            OperatorStatus::Inactive => f.write_str("inactive"),
        }
    }
}

impl FromStr for OperatorStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(OperatorStatus::Active),
            "inactive" => Ok(OperatorStatus::Inactive),
            other => Err(format!("unknown operator status '{}'", other)),
        }
    }
}

/// An operator-entered entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorRecord {
    #[serde(deserialize_with = "deserialize_record_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub status: OperatorStatus,
}

/// An approved user submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityRecord {
    #[serde(deserialize_with = "deserialize_record_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub memo: String,
}

/// Accepts a row id written as a JSON string or number.
///
/// Database-backed rows carry numeric ids; file rows usually carry strings.
fn deserialize_record_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(id) => id,
        RawId::Number(id) => id.to_string(),
    })
}

/// Read access to the internal record sets.
///
/// Accessors may return rows outside the requested region; the aggregator
/// filters every set against the region before merging.
pub trait RecordSource: Send + Sync {
    /// Lists curated rows relevant to `region`.
    fn list_curated_records(
        &self,
        region: &Region,
    ) -> impl Future<Output = Result<Vec<CuratedRecord>, RecordError>> + Send;

    /// Lists operator rows with the given status.
    fn list_operator_records(
        &self,
        status: OperatorStatus,
    ) -> impl Future<Output = Result<Vec<OperatorRecord>, RecordError>> + Send;

    /// Lists community rows that passed moderation.
    fn list_approved_community_records(
        &self,
    ) -> impl Future<Output = Result<Vec<CommunityRecord>, RecordError>> + Send;
}
