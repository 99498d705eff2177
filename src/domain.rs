use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One station exactly as received from upstream; keys vary by producer.
pub type RawStationRecord = Value;

/// A resolved `(lng, lat)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lng: f64,
    pub lat: f64,
}

impl Coordinates {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }
}

/// Canonical station record consumed by the map UI.
///
/// `coords` mirrors `latitude`/`longitude` in `[lng, lat]` order and is only
/// present when both are known. Use [`NormalizedStation::set_coordinates`]
/// rather than writing the fields directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedStation {
    #[serde(default)]
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coords: Option<[f64; 2]>,
}

impl NormalizedStation {
    pub fn new(id: Value, name: Option<String>, address: Option<String>) -> Self {
        Self {
            id,
            name,
            address,
            latitude: None,
            longitude: None,
            coords: None,
        }
    }

    pub fn set_coordinates(&mut self, coordinates: Option<Coordinates>) {
        match coordinates {
            Some(c) => {
                self.latitude = Some(c.lat);
                self.longitude = Some(c.lng);
                self.coords = Some([c.lng, c.lat]);
            }
            None => {
                self.latitude = None;
                self.longitude = None;
                self.coords = None;
            }
        }
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some(Coordinates::new(lng, lat)),
            _ => None,
        }
    }

    pub fn has_coordinates(&self) -> bool {
        self.coordinates().is_some()
    }

    /// Trimmed address, if one is present and non-empty.
    pub fn lookup_address(&self) -> Option<&str> {
        self.address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
    }

    /// Re-derives `coords` from `latitude`/`longitude`, e.g. after reading a
    /// file written by another tool.
    pub fn repair_coords(&mut self) {
        self.coords = self.coordinates().map(|c| [c.lng, c.lat]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coords_follow_lat_lng() {
        let mut station = NormalizedStation::new(json!(7), Some("Depot".into()), None);
        assert!(station.coords.is_none());

        station.set_coordinates(Some(Coordinates::new(106.7, 10.8)));
        assert_eq!(station.coords, Some([106.7, 10.8]));
        assert_eq!(station.latitude, Some(10.8));
        assert_eq!(station.longitude, Some(106.7));

        station.set_coordinates(None);
        assert!(station.coords.is_none());
        assert!(station.latitude.is_none());
    }

    #[test]
    fn test_serialized_shape_omits_absent_fields() {
        let station = NormalizedStation::new(json!("S-1"), None, None);
        let value = serde_json::to_value(&station).unwrap();
        assert_eq!(value, json!({"id": "S-1", "latitude": null, "longitude": null}));
    }

    #[test]
    fn test_repair_coords_drops_stale_pair() {
        let mut station: NormalizedStation =
            serde_json::from_value(json!({"id": 1, "latitude": 10.0, "coords": [1.0, 2.0]})).unwrap();
        station.repair_coords();
        assert!(station.coords.is_none());
        assert_eq!(station.latitude, Some(10.0));
    }
}
