//! Multi-source merge and deduplication.
//!
//! Converts each internal record set to [`Element`]s, keeps those inside the
//! query region, and merges them with the raw upstream elements. Duplicates
//! are resolved by a fixed source precedence:
//!
//! ```text
//! upstream → curated → operator → community
//! ```
//!
//! Elements are visited in that order and each dedup key keeps the slot of
//! the first element seen for it, so output order is first-seen order. The
//! slot's content is the first internal record for the key when there is
//! one: curated and operator data are never shadowed by an upstream
//! duplicate, and among internal sources the earlier one wins.
//!
//! # Dedup Key
//!
//! `round(lat, 4) ":" round(lon, 4) ":" normalize(name)`, where `normalize`
//! lowercases, trims and collapses internal whitespace. Four decimal places
//! is roughly 11 m of latitude.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tracing::trace;

use crate::element::{Element, SourceKind};
use crate::records::{CommunityRecord, CuratedRecord, OperatorRecord};
use crate::region::{format_rounded, is_inside, Region};

/// Decimal places used for dedup coordinates.
pub const DEDUP_PRECISION: u8 = 4;

/// Per-source element counts for one merge.
///
/// Internal sources are counted after the region filter and before dedup;
/// `upstream` is the raw element count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceCounts {
    pub upstream: usize,
    pub curated: usize,
    pub operator: usize,
    pub community: usize,
}

/// Result of [`aggregate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    pub elements: Vec<Element>,
    pub counts: SourceCounts,
}

/// Merges raw upstream elements with the three internal record sets.
///
/// Raw elements are assumed to be scoped by the upstream query and are not
/// re-filtered; record rows outside `region` are dropped before the merge.
pub fn aggregate(
    region: &Region,
    raw: &[Element],
    curated: &[CuratedRecord],
    operator: &[OperatorRecord],
    community: &[CommunityRecord],
) -> Aggregation {
    let curated = adapt_within(region, curated, Element::from_curated);
    let operator = adapt_within(region, operator, Element::from_operator);
    let community = adapt_within(region, community, Element::from_community);

    let counts = SourceCounts {
        upstream: raw.len(),
        curated: curated.len(),
        operator: operator.len(),
        community: community.len(),
    };

    let elements = dedupe(
        raw.iter()
            .chain(curated.iter())
            .chain(operator.iter())
            .chain(community.iter()),
    );

    trace!(
        upstream = counts.upstream,
        curated = counts.curated,
        operator = counts.operator,
        community = counts.community,
        total = elements.len(),
        "Merged sources"
    );

    Aggregation { elements, counts }
}

fn adapt_within<R>(
    region: &Region,
    rows: &[R],
    adapt: impl Fn(&R) -> Option<Element>,
) -> Vec<Element> {
    rows.iter()
        .filter_map(adapt)
        .filter(|element| is_inside(element.point(), region))
        .collect()
}

/// Deduplicates elements given in precedence order.
///
/// Each key keeps the position of its first occurrence. An upstream element
/// in that position is replaced by the first internal duplicate; otherwise
/// later duplicates are discarded. Coordinates are always present here: the
/// adapters drop rows without them.
pub fn dedupe<'a>(elements: impl IntoIterator<Item = &'a Element>) -> Vec<Element> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut merged: Vec<Element> = Vec::new();

    for element in elements {
        match slots.entry(dedup_key(element)) {
            Entry::Vacant(slot) => {
                slot.insert(merged.len());
                merged.push(element.clone());
            }
            Entry::Occupied(slot) => {
                let kept = &mut merged[*slot.get()];
                if kept.source() == SourceKind::Upstream && element.source() != SourceKind::Upstream {
                    *kept = element.clone();
                }
            }
        }
    }
    merged
}

/// Builds the dedup key of an element.
pub fn dedup_key(element: &Element) -> String {
    format!(
        "{}:{}:{}",
        format_rounded(element.lat(), DEDUP_PRECISION),
        format_rounded(element.lon(), DEDUP_PRECISION),
        normalize_name(element.name())
    )
}

/// Lowercases and collapses whitespace runs to single spaces.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
