//! Overpass API response parsing.
//!
//! The interpreter answers `out center tags` queries with a JSON document:
//!
//! ```text
//! { "elements": [
//!     { "type": "node", "id": 1, "lat": 37.5, "lon": 127.0, "tags": { ... } },
//!     { "type": "way",  "id": 2, "center": { "lat": 37.6, "lon": 127.1 }, "tags": { ... } }
//! ] }
//! ```
//!
//! Nodes carry their position directly; ways and relations carry a computed
//! `center`. Features with neither are dropped.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::debug;

use super::types::ProviderError;
use crate::element::{Element, ElementType};

/// Public Overpass interpreter endpoints, tried in order.
pub const DEFAULT_OVERPASS_ENDPOINTS: &[&str] = &[
    "https://overpass-api.de/api/interpreter",
    "https://overpass.kumi.systems/api/interpreter",
];

/// Form field carrying the query text.
pub const QUERY_FIELD: &str = "data";

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    #[serde(rename = "type")]
    element_type: ElementType,
    id: u64,
    lat: Option<f64>,
    lon: Option<f64>,
    center: Option<OverpassCenter>,
    #[serde(default)]
    tags: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OverpassCenter {
    lat: f64,
    lon: f64,
}

impl OverpassElement {
    fn position(&self) -> Option<(f64, f64)> {
        match (self.lat, self.lon, &self.center) {
            (Some(lat), Some(lon), _) => Some((lat, lon)),
            (_, _, Some(center)) => Some((center.lat, center.lon)),
            _ => None,
        }
    }

    fn into_element(self) -> Option<Element> {
        let (lat, lon) = self.position()?;
        let tags = self
            .tags
            .into_iter()
            .map(|(key, value)| match value {
                serde_json::Value::String(s) => (key, s),
                other => (key, other.to_string()),
            })
            .collect();
        Element::from_upstream(self.element_type, self.id, lat, lon, tags)
    }
}

/// Parses an interpreter response body into elements.
///
/// # Errors
///
/// Returns [`ProviderError::InvalidResponse`] if the body is not a JSON
/// object of the expected shape.
pub fn parse_response(body: &[u8]) -> Result<Vec<Element>, ProviderError> {
    let response: OverpassResponse = serde_json::from_slice(body)
        .map_err(|e| ProviderError::InvalidResponse(format!("Malformed Overpass JSON: {}", e)))?;

    let received = response.elements.len();
    let elements: Vec<Element> = response
        .elements
        .into_iter()
        .filter_map(OverpassElement::into_element)
        .collect();

    if elements.len() < received {
        debug!(
            received = received,
            kept = elements.len(),
            "Dropped upstream features without coordinates"
        );
    }
    Ok(elements)
}
