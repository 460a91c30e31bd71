//! In-memory record source.
//!
//! Rows live behind `parking_lot` locks so they can be swapped at runtime
//! (for example after an operator edit) while readers take cheap snapshots.
//! Rows can also be loaded from JSON array files.

use std::path::Path;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::{
    CommunityRecord, CuratedRecord, OperatorRecord, OperatorStatus, RecordError, RecordSource,
};
use crate::region::Region;

/// Record source holding every row in memory.
#[derive(Debug, Default)]
pub struct InMemoryRecordSource {
    curated: RwLock<Vec<CuratedRecord>>,
    operator: RwLock<Vec<OperatorRecord>>,
    community: RwLock<Vec<CommunityRecord>>,
}

impl InMemoryRecordSource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source pre-populated with rows.
    pub fn with_records(
        curated: Vec<CuratedRecord>,
        operator: Vec<OperatorRecord>,
        community: Vec<CommunityRecord>,
    ) -> Self {
        Self {
            curated: RwLock::new(curated),
            operator: RwLock::new(operator),
            community: RwLock::new(community),
        }
    }

    /// Loads rows from optional JSON array files.
    ///
    /// A missing path leaves that set empty. A configured path that cannot
    /// be read, or that does not hold a JSON array, is an error. Rows that
    /// do not fit the record shape are logged and skipped.
    pub async fn from_files(
        curated: Option<&Path>,
        operator: Option<&Path>,
        community: Option<&Path>,
    ) -> Result<Self, RecordError> {
        let source = Self::with_records(
            load_rows(curated).await?,
            load_rows(operator).await?,
            load_rows(community).await?,
        );
        debug!(
            curated = source.curated.read().len(),
            operator = source.operator.read().len(),
            community = source.community.read().len(),
            "Loaded record files"
        );
        Ok(source)
    }

    pub fn replace_curated(&self, rows: Vec<CuratedRecord>) {
        *self.curated.write() = rows;
    }

    pub fn replace_operator(&self, rows: Vec<OperatorRecord>) {
        *self.operator.write() = rows;
    }

    pub fn replace_community(&self, rows: Vec<CommunityRecord>) {
        *self.community.write() = rows;
    }
}

impl RecordSource for InMemoryRecordSource {
    async fn list_curated_records(
        &self,
        _region: &Region,
    ) -> Result<Vec<CuratedRecord>, RecordError> {
        Ok(self.curated.read().clone())
    }

    async fn list_operator_records(
        &self,
        status: OperatorStatus,
    ) -> Result<Vec<OperatorRecord>, RecordError> {
        Ok(self
            .operator
            .read()
            .iter()
            .filter(|row| row.status == status)
            .cloned()
            .collect())
    }

    async fn list_approved_community_records(&self) -> Result<Vec<CommunityRecord>, RecordError> {
        Ok(self.community.read().clone())
    }
}

/// Reads a JSON array of rows, skipping rows that do not fit `T`.
///
/// A file that is not a JSON array at all is an error.
async fn load_rows<T: DeserializeOwned>(path: Option<&Path>) -> Result<Vec<T>, RecordError> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let path_str = path.display().to_string();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| RecordError::Io {
            path: path_str.clone(),
            source,
        })?;
    let values: Vec<Value> = serde_json::from_str(&text).map_err(|source| RecordError::Parse {
        path: path_str.clone(),
        source,
    })?;

    let total = values.len();
    let rows: Vec<T> = values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value(value) {
            Ok(row) => Some(row),
            Err(e) => {
                warn!(path = %path_str, index, error = %e, "Skipping malformed record row");
                None
            }
        })
        .collect();

    if rows.len() < total {
        warn!(
            path = %path_str,
            loaded = rows.len(),
            skipped = total - rows.len(),
            "Some record rows were skipped"
        );
    }
    Ok(rows)
}
