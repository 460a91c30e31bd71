//! Common point-feature shape shared by every source.
//!
//! Every source (the upstream geodata service and the three internal record
//! sets) is adapted into an [`Element`]. Elements are immutable once built;
//! the adapters in this module are the only way to create one, so each
//! element's [`SourceKind`] is fixed by the constructor that produced it.
//!
//! # Serialized Shape
//!
//! ```text
//! { "type": "node", "id": "curated-7", "lat": 37.5, "lon": 127.0,
//!   "tags": { "name": "...", "source": "curated", "region": "...", "entry:type": "curated" } }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::region::Point;
use crate::records::{CommunityRecord, CuratedRecord, OperatorRecord};

/// Tag holding the display name.
pub const TAG_NAME: &str = "name";
/// Tag naming the source an element came from.
pub const TAG_SOURCE: &str = "source";
/// Tag holding the curated/operator region label.
pub const TAG_REGION: &str = "region";
/// Tag holding operator/community notes.
pub const TAG_MEMO: &str = "memo";
/// Tag repeating the source kind for map styling.
pub const TAG_ENTRY_TYPE: &str = "entry:type";

/// Origin of an element.
///
/// Declaration order is merge precedence: earlier kinds win duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Upstream,
    Curated,
    Operator,
    Community,
}

impl SourceKind {
    /// All kinds in merge precedence order.
    pub const PRECEDENCE: [SourceKind; 4] = [
        SourceKind::Upstream,
        SourceKind::Curated,
        SourceKind::Operator,
        SourceKind::Community,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Upstream => "upstream",
            SourceKind::Curated => "curated",
            SourceKind::Operator => "operator",
            SourceKind::Community => "community",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geometry type reported by the upstream service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Node,
    Way,
    Relation,
}

impl ElementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Node => "node",
            ElementType::Way => "way",
            ElementType::Relation => "relation",
        }
    }
}

/// Identity of an element: `(source kind, id within that source)`.
///
/// Serialized as a single string. Internal sources are prefixed with their
/// kind (`curated-7`); upstream ids carry their geometry type (`way/42`),
/// so the two forms never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementId {
    source: SourceKind,
    source_id: String,
}

impl ElementId {
    pub fn new(source: SourceKind, source_id: impl Into<String>) -> Self {
        Self {
            source,
            source_id: source_id.into(),
        }
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source {
            SourceKind::Upstream => f.write_str(&self.source_id),
            kind => write!(f, "{}-{}", kind, self.source_id),
        }
    }
}

impl FromStr for ElementId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        for kind in [
            SourceKind::Curated,
            SourceKind::Operator,
            SourceKind::Community,
        ] {
            if let Some(rest) = s
                .strip_prefix(kind.as_str())
                .and_then(|r| r.strip_prefix('-'))
            {
                return Ok(Self::new(kind, rest));
            }
        }
        Ok(Self::new(SourceKind::Upstream, s))
    }
}

impl Serialize for ElementId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ElementId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A point feature from any source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    #[serde(rename = "type")]
    element_type: ElementType,
    id: ElementId,
    lat: f64,
    lon: f64,
    tags: BTreeMap<String, String>,
}

impl Element {
    /// Adapts an upstream feature.
    ///
    /// Upstream tags are kept as-is; `source` and `entry:type` are only
    /// filled in when the feature does not already carry them. Returns
    /// `None` for non-finite coordinates.
    pub fn from_upstream(
        element_type: ElementType,
        upstream_id: u64,
        lat: f64,
        lon: f64,
        mut tags: BTreeMap<String, String>,
    ) -> Option<Self> {
        tags.entry(TAG_SOURCE.to_string())
            .or_insert_with(|| SourceKind::Upstream.to_string());
        tags.entry(TAG_ENTRY_TYPE.to_string())
            .or_insert_with(|| SourceKind::Upstream.to_string());
        Self::build(
            element_type,
            ElementId::new(
                SourceKind::Upstream,
                format!("{}/{}", element_type.as_str(), upstream_id),
            ),
            lat,
            lon,
            tags,
        )
    }

    /// Adapts a curated record.
    ///
    /// Returns `None` when either coordinate is missing or non-finite.
    pub fn from_curated(record: &CuratedRecord) -> Option<Self> {
        let mut tags = internal_tags(SourceKind::Curated, &record.name);
        insert_region(&mut tags, &record.region);
        Self::internal(SourceKind::Curated, &record.id, record.lat?, record.lon?, tags)
    }

    /// Adapts an operator-entered record.
    pub fn from_operator(record: &OperatorRecord) -> Option<Self> {
        let mut tags = internal_tags(SourceKind::Operator, &record.name);
        insert_region(&mut tags, &record.region);
        tags.insert(TAG_MEMO.to_string(), record.memo.clone());
        Self::internal(SourceKind::Operator, &record.id, record.lat?, record.lon?, tags)
    }

    /// Adapts an approved community submission.
    pub fn from_community(record: &CommunityRecord) -> Option<Self> {
        let mut tags = internal_tags(SourceKind::Community, &record.name);
        tags.insert(TAG_MEMO.to_string(), record.memo.clone());
        Self::internal(SourceKind::Community, &record.id, record.lat?, record.lon?, tags)
    }

    fn internal(
        source: SourceKind,
        id: &str,
        lat: f64,
        lon: f64,
        tags: BTreeMap<String, String>,
    ) -> Option<Self> {
        Self::build(
            ElementType::Node,
            ElementId::new(source, id),
            lat,
            lon,
            tags,
        )
    }

    fn build(
        element_type: ElementType,
        id: ElementId,
        lat: f64,
        lon: f64,
        tags: BTreeMap<String, String>,
    ) -> Option<Self> {
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        Some(Self {
            element_type,
            id,
            lat,
            lon,
            tags,
        })
    }

    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    pub fn id(&self) -> &ElementId {
        &self.id
    }

    pub fn source(&self) -> SourceKind {
        self.id.source()
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    pub fn point(&self) -> Point {
        Point::new(self.lat, self.lon)
    }

    /// Display name, empty when the feature has none.
    pub fn name(&self) -> &str {
        self.tag(TAG_NAME).unwrap_or("")
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }
}

fn internal_tags(source: SourceKind, name: &str) -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();
    tags.insert(TAG_NAME.to_string(), name.to_string());
    tags.insert(TAG_SOURCE.to_string(), source.to_string());
    tags.insert(TAG_ENTRY_TYPE.to_string(), source.to_string());
    tags
}

/// The region label is optional; an empty label adds no tag.
fn insert_region(tags: &mut BTreeMap<String, String>, region: &str) {
    if !region.is_empty() {
        tags.insert(TAG_REGION.to_string(), region.to_string());
    }
}
