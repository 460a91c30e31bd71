//! Upstream query builder.
//!
//! Produces Overpass QL requests for a [`Region`]. Two templates exist: one
//! scoped to an explicit bounding box and one scoped to a whole country
//! area (used when no region is supplied).
//!
//! # Feature Selectors
//!
//! Both templates share the same selector list. Each selector is an
//! element type plus an Overpass filter expression; the scope (bbox or
//! area) is spliced in per template.

use std::fmt;

use crate::region::{BoundingBox, Region};

/// Default ISO 3166-1 code of the territory queried without a region.
pub const DEFAULT_TERRITORY: &str = "KR";

/// Server-side timeout requested for bounding-box queries (seconds).
pub const BBOX_QUERY_TIMEOUT_SECS: u32 = 50;

/// Server-side timeout requested for territory queries (seconds).
pub const TERRITORY_QUERY_TIMEOUT_SECS: u32 = 120;

/// Selectors for cherry-blossom points of interest.
///
/// Each entry is `(element type, filter expression)`.
pub const DEFAULT_SELECTORS: &[(&str, &str)] = &[
    ("node", r#"[natural=tree][genus~"prunus|cerasus",i]"#),
    (
        "node",
        r#"[natural=tree][species~"prunus|serrulata|yedoensis|jamasakura|subhirtella",i]"#,
    ),
    ("node", r#"[natural=tree]["species:ko"~"벚",i]"#),
    ("node", r#"[natural=tree][name~"벚|cherry",i]"#),
    ("node", r#"[tourism=attraction][name~"벚꽃|cherry",i]"#),
    ("node", r#"[leisure=park][name~"벚|cherry",i]"#),
    ("way", r#"[leisure=park][name~"벚|cherry",i]"#),
    ("way", r#"[highway][name~"벚꽃|벚나무|cherry",i]"#),
    ("way", r#"[landuse=orchard][trees~"cherry|벚",i]"#),
    ("relation", r#"[leisure=park][name~"벚|cherry",i]"#),
    ("relation", r#"[route][name~"벚꽃|cherry",i]"#),
    ("relation", r#"[tourism=attraction][name~"벚꽃|cherry",i]"#),
];

/// An opaque request body for the upstream service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamQuery(String);

impl UpstreamQuery {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UpstreamQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builds upstream queries from regions.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    territory: String,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_TERRITORY)
    }
}

impl QueryBuilder {
    /// Creates a builder emitting [`DEFAULT_SELECTORS`].
    ///
    /// # Arguments
    ///
    /// * `territory` - ISO 3166-1 code of the country used for territory queries
    pub fn new(territory: impl Into<String>) -> Self {
        Self {
            territory: territory.into(),
        }
    }

    pub fn territory(&self) -> &str {
        &self.territory
    }

    /// Builds the query for `region`.
    pub fn build(&self, region: &Region) -> UpstreamQuery {
        match region {
            Region::Bounded(bbox) => self.build_bbox(bbox),
            Region::Territory => self.build_territory(),
        }
    }

    fn build_bbox(&self, bbox: &BoundingBox) -> UpstreamQuery {
        // Overpass bbox order is south,west,north,east.
        let scope = format!(
            "({},{},{},{})",
            bbox.min_lat(),
            bbox.min_lon(),
            bbox.max_lat(),
            bbox.max_lon()
        );
        let body: String = DEFAULT_SELECTORS
            .iter()
            .map(|(kind, filter)| format!("  {}{}{};\n", kind, filter, scope))
            .collect();
        UpstreamQuery(format!(
            "[out:json][timeout:{}];\n(\n{});\nout center tags;",
            BBOX_QUERY_TIMEOUT_SECS, body
        ))
    }

    fn build_territory(&self) -> UpstreamQuery {
        let body: String = DEFAULT_SELECTORS
            .iter()
            .map(|(kind, filter)| format!("  {}(area.territory){};\n", kind, filter))
            .collect();
        UpstreamQuery(format!(
            "[out:json][timeout:{}];\narea[\"ISO3166-1\"=\"{}\"][admin_level=2]->.territory;\n(\n{});\nout center tags;",
            TERRITORY_QUERY_TIMEOUT_SECS, self.territory, body
        ))
    }
}
