//! Bounding-region codec.
//!
//! Parses query regions, derives canonical cache keys, and answers point
//! containment questions.
//!
//! # Cache Keys
//!
//! Each bound is rounded to a fixed number of decimal digits and the four
//! values are joined as `minLon,minLat,maxLon,maxLat`. Regions whose bounds
//! round to the same digits share a key, which buckets nearby viewports into
//! a bounded number of cache entries. The territory sentinel always maps to
//! [`TERRITORY_CACHE_KEY`].
//!
//! ```
//! use poilayer::region::{parse_region, region_to_cache_key};
//!
//! let region = parse_region("127.001,37.004,127.1,37.1").unwrap();
//! assert_eq!(region_to_cache_key(&region, 2).as_str(), "127.00,37.00,127.10,37.10");
//! ```

mod types;

pub use types::{
    BoundingBox, CacheKey, Point, Region, RegionError, DEFAULT_KEY_PRECISION,
    MAX_KEY_PRECISION, MIN_KEY_PRECISION, TERRITORY_CACHE_KEY,
};

/// Parses a `minLon,minLat,maxLon,maxLat` string into a bounded region.
///
/// # Errors
///
/// Fails unless the input holds exactly four finite numbers with
/// `min < max` on both axes.
pub fn parse_region(raw: &str) -> Result<Region, RegionError> {
    let parts: Vec<&str> = raw.split(',').collect();
    if parts.len() != 4 {
        return Err(RegionError::WrongArity(parts.len()));
    }

    let mut bounds = [0.0_f64; 4];
    for (slot, part) in bounds.iter_mut().zip(&parts) {
        let trimmed = part.trim();
        let value: f64 = trimmed
            .parse()
            .map_err(|_| RegionError::NotANumber(trimmed.to_string()))?;
        if !value.is_finite() {
            return Err(RegionError::NotFinite(trimmed.to_string()));
        }
        *slot = value;
    }

    let [min_lon, min_lat, max_lon, max_lat] = bounds;
    BoundingBox::new(min_lon, min_lat, max_lon, max_lat).map(Region::Bounded)
}

/// Resolves an optional region query.
///
/// A missing or blank query selects the whole territory; anything else must
/// parse as a bounding box.
pub fn parse_region_query(raw: Option<&str>) -> Result<Region, RegionError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(Region::Territory),
        Some(value) => parse_region(value),
    }
}

/// Derives the cache key of a region.
///
/// `precision` is clamped to `0..=6` digits.
pub fn region_to_cache_key(region: &Region, precision: u8) -> CacheKey {
    let bbox = match region {
        Region::Bounded(bbox) => bbox,
        Region::Territory => return CacheKey::territory(),
    };

    let digits = precision.clamp(MIN_KEY_PRECISION, MAX_KEY_PRECISION);
    let key = [bbox.min_lon(), bbox.min_lat(), bbox.max_lon(), bbox.max_lat()]
        .iter()
        .map(|value| format_rounded(*value, digits))
        .collect::<Vec<_>>()
        .join(",");
    CacheKey::from_rounded(key)
}

/// Returns true if `point` lies inside `region`.
///
/// The territory sentinel contains every point.
pub fn is_inside(point: Point, region: &Region) -> bool {
    match region {
        Region::Bounded(bbox) => bbox.contains(point),
        Region::Territory => true,
    }
}

/// Rounds half away from zero to `digits` decimal places.
pub(crate) fn round_to(value: f64, digits: u8) -> f64 {
    let factor = 10_f64.powi(i32::from(digits));
    let rounded = (value * factor).round() / factor;
    // Collapse -0.0 so "-0.00" never appears in keys.
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Rounds and formats with exactly `digits` decimal places.
pub(crate) fn format_rounded(value: f64, digits: u8) -> String {
    format!("{:.*}", usize::from(digits), round_to(value, digits))
}
