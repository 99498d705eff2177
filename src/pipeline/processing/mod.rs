// Pipeline processing: normalization, geocoding, and bounded-parallel enrichment

pub mod normalize;
pub mod geocode;
pub mod enrich;

pub use enrich::{map_with_concurrency, GeocodeSummary, StationEnricher};
pub use geocode::{CachingGeocoder, GeocodeCache, MapboxGeocoder};
pub use normalize::{normalize, plan_geocoding, GeocodePlan, SkipReason};
