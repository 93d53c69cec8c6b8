//! Geocode response handling.
//!
//! The response is decoded into a loose schema: every field we read is
//! optional and tolerates a wrong JSON type, and each entry of `results` is
//! decoded on its own, so only the candidate we end up selecting can make the
//! response malformed.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use crate::error::ResolutionError;
use crate::model::Stable;

/// Marks a candidate geocoded to the exact building.
pub const EXACT_MATCH: &str = "ROOFTOP";

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub address: String,
    pub lat: f64,
    pub lng: f64,
}

impl Resolution {
    /// The geocoded address replaces the portal one; the portal has typos.
    pub fn apply(self, stable: Stable) -> Stable {
        Stable {
            address: self.address,
            lat: Some(self.lat),
            lng: Some(self.lng),
            ..stable
        }
    }
}

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default, deserialize_with = "lenient")]
    results: Option<Vec<serde_json::Value>>,
    #[serde(default, deserialize_with = "lenient")]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default, deserialize_with = "lenient")]
    formatted_address: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(default, deserialize_with = "lenient")]
    location: Option<Location>,
    #[serde(default, deserialize_with = "lenient")]
    location_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Location {
    #[serde(default, deserialize_with = "lenient")]
    lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    lng: Option<f64>,
}

/// Absent and mistyped both become `None`.
fn lenient<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(d)?;
    Ok(serde_json::from_value(value).ok())
}

impl Candidate {
    fn location_type(&self) -> Option<&str> {
        self.geometry.as_ref()?.location_type.as_deref()
    }

    fn into_resolution(self) -> Result<Resolution, ResolutionError> {
        let address = self
            .formatted_address
            .ok_or(ResolutionError::MalformedResponse { field: "formatted_address" })?;
        let location = self
            .geometry
            .ok_or(ResolutionError::MalformedResponse { field: "geometry" })?
            .location
            .ok_or(ResolutionError::MalformedResponse { field: "geometry.location" })?;
        let lat = location
            .lat
            .ok_or(ResolutionError::MalformedResponse { field: "geometry.location.lat" })?;
        let lng = location
            .lng
            .ok_or(ResolutionError::MalformedResponse { field: "geometry.location.lng" })?;
        Ok(Resolution { address, lat, lng })
    }
}

/// Pick one candidate out of a geocode response.
///
/// The first `ROOFTOP` candidate in document order wins; without one, the
/// first candidate is taken as is.
pub fn resolve(body: &[u8]) -> Result<Resolution, ResolutionError> {
    let response: Response = serde_json::from_slice(body)?;
    let results = response
        .results
        .ok_or(ResolutionError::MalformedResponse { field: "results" })?;

    if results.is_empty() {
        return Err(ResolutionError::NoResults {
            status: response.status.unwrap_or_else(|| "missing".to_string()),
        });
    }

    // An entry that is not a candidate object at all is `None`.
    let mut candidates: Vec<Option<Candidate>> = results
        .into_iter()
        .map(|entry| serde_json::from_value(entry).ok())
        .collect();

    let idx = candidates
        .iter()
        .position(|c| c.as_ref().and_then(Candidate::location_type) == Some(EXACT_MATCH))
        .unwrap_or(0);
    candidates
        .swap_remove(idx)
        .ok_or(ResolutionError::MalformedResponse { field: "results[0]" })?
        .into_resolution()
}
