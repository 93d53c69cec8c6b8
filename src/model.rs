use serde::{Deserialize, Serialize};

/// One stable from the portal directory.
///
/// A record is resolved iff `name` is non-empty. Failed IDs travel as
/// `Stable::unresolved(id)` so the sink only ever checks `name`.
/// Coordinates stay `None` until the geocode phase resolves the address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stable {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Address", default)]
    pub address: String,
    #[serde(rename = "Phone", default)]
    pub phone: String,
    #[serde(rename = "Website", default)]
    pub website: String,
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Lat", default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(rename = "Lng", default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
}

impl Stable {
    pub fn unresolved(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn is_resolved(&self) -> bool {
        !self.name.is_empty()
    }
}
