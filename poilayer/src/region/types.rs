//! Region types and errors.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum number of decimal digits used when rounding cache keys.
pub const MIN_KEY_PRECISION: u8 = 0;

/// Maximum number of decimal digits used when rounding cache keys.
pub const MAX_KEY_PRECISION: u8 = 6;

/// Default number of decimal digits used when rounding cache keys.
pub const DEFAULT_KEY_PRECISION: u8 = 2;

/// Cache key used for the whole supported territory.
pub const TERRITORY_CACHE_KEY: &str = "territory";

/// Errors raised while parsing or validating a query region.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegionError {
    /// The input did not contain exactly four comma-separated values.
    #[error("invalid region: expected 4 comma-separated values, got {0}")]
    WrongArity(usize),

    /// A bound could not be parsed as a number.
    #[error("invalid region: '{0}' is not a number")]
    NotANumber(String),

    /// A bound parsed to NaN or infinity.
    #[error("invalid region: '{0}' is not a finite number")]
    NotFinite(String),

    /// Longitude bounds are equal or inverted.
    #[error("invalid region range: min longitude {min} must be below max longitude {max}")]
    InvertedLongitude { min: f64, max: f64 },

    /// Latitude bounds are equal or inverted.
    #[error("invalid region range: min latitude {min} must be below max latitude {max}")]
    InvertedLatitude { min: f64, max: f64 },
}

/// Axis-aligned geographic bounding box.
///
/// Bounds are finite and strictly ordered on both axes. The only way to
/// obtain one is [`BoundingBox::new`], which enforces that.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    min_lon: f64,
    min_lat: f64,
    max_lon: f64,
    max_lat: f64,
}

impl BoundingBox {
    /// Creates a validated bounding box.
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Result<Self, RegionError> {
        for value in [min_lon, min_lat, max_lon, max_lat] {
            if !value.is_finite() {
                return Err(RegionError::NotFinite(value.to_string()));
            }
        }
        if min_lon >= max_lon {
            return Err(RegionError::InvertedLongitude {
                min: min_lon,
                max: max_lon,
            });
        }
        if min_lat >= max_lat {
            return Err(RegionError::InvertedLatitude {
                min: min_lat,
                max: max_lat,
            });
        }
        Ok(Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        })
    }

    pub fn min_lon(&self) -> f64 {
        self.min_lon
    }

    pub fn min_lat(&self) -> f64 {
        self.min_lat
    }

    pub fn max_lon(&self) -> f64 {
        self.max_lon
    }

    pub fn max_lat(&self) -> f64 {
        self.max_lat
    }

    /// Inclusive containment check.
    pub fn contains(&self, point: Point) -> bool {
        point.lon >= self.min_lon
            && point.lon <= self.max_lon
            && point.lat >= self.min_lat
            && point.lat <= self.max_lat
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}

/// Geographic query scope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Region {
    /// An explicit bounding box.
    Bounded(BoundingBox),
    /// The whole supported territory.
    Territory,
}

impl Region {
    /// Returns the bounding box, or `None` for the territory sentinel.
    pub fn bbox(&self) -> Option<&BoundingBox> {
        match self {
            Region::Bounded(bbox) => Some(bbox),
            Region::Territory => None,
        }
    }

    pub fn is_territory(&self) -> bool {
        matches!(self, Region::Territory)
    }
}

impl From<BoundingBox> for Region {
    fn from(bbox: BoundingBox) -> Self {
        Region::Bounded(bbox)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::Bounded(bbox) => bbox.fmt(f),
            Region::Territory => f.write_str(TERRITORY_CACHE_KEY),
        }
    }
}

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub lat: f64,
    pub lon: f64,
}

impl Point {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Canonical cache identity of a region at a given rounding precision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key shared by every whole-territory query.
    pub fn territory() -> Self {
        Self(TERRITORY_CACHE_KEY.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn from_rounded(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
