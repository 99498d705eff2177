use serde_json::Value;

use crate::constants::{ADDRESS_FIELDS, ID_FIELDS, LATITUDE_FIELDS, LONGITUDE_FIELDS, NAME_FIELDS};
use crate::domain::{Coordinates, NormalizedStation, RawStationRecord};

/// What the driver should do about a freshly normalized station's location.
#[derive(Debug, Clone, PartialEq)]
pub enum GeocodePlan {
    /// Coordinates came with the record.
    Resolved,
    /// Coordinates missing; look up this (trimmed) address.
    Lookup(String),
    /// Coordinates missing and no lookup is possible.
    Skip(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoAddress,
    NoCredential,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NoAddress => write!(f, "no address to geocode"),
            SkipReason::NoCredential => write!(f, "no geocoding token configured"),
        }
    }
}

/// First value among `candidates` that is present and not `null`.
pub fn first_defined<'a>(raw: &'a Value, candidates: &[&str]) -> Option<&'a Value> {
    let object = raw.as_object()?;
    candidates
        .iter()
        .filter_map(|key| object.get(*key))
        .find(|value| !value.is_null())
}

fn as_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Maps one upstream record onto the canonical station shape.
pub fn normalize(raw: &RawStationRecord) -> NormalizedStation {
    let id = first_defined(raw, ID_FIELDS).cloned().unwrap_or(Value::Null);
    let name = first_defined(raw, NAME_FIELDS).and_then(as_text);
    let address = first_defined(raw, ADDRESS_FIELDS).and_then(as_text);

    let mut station = NormalizedStation::new(id, name, address);

    let latitude = first_defined(raw, LATITUDE_FIELDS).and_then(as_number);
    let longitude = first_defined(raw, LONGITUDE_FIELDS).and_then(as_number);
    if let (Some(lat), Some(lng)) = (latitude, longitude) {
        station.set_coordinates(Some(Coordinates::new(lng, lat)));
    }
    station
}

pub fn plan_geocoding(station: &NormalizedStation, has_credential: bool) -> GeocodePlan {
    if station.has_coordinates() {
        return GeocodePlan::Resolved;
    }
    match station.lookup_address() {
        None => GeocodePlan::Skip(SkipReason::NoAddress),
        Some(_) if !has_credential => GeocodePlan::Skip(SkipReason::NoCredential),
        Some(address) => GeocodePlan::Lookup(address.to_string()),
    }
}
