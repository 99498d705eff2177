//! Environment variable names and defaults shared by the CLI and the pipeline.
//! Each setting lists its preferred variable first, then accepted fallbacks.

pub const SOURCE_ENV_VARS: &[&str] = &["STATIONS_SOURCE", "STATIONS_API_URL"];
pub const TOKEN_ENV_VARS: &[&str] = &["MAPBOX_TOKEN", "VITE_MAPBOX_TOKEN"];
pub const OUTPUT_ENV_VARS: &[&str] = &["STATIONS_OUTPUT"];

pub const DEFAULT_OUTPUT_PATH: &str = "data/stations.json";
pub const BACKUP_DIR_NAME: &str = "backups";

pub const DEFAULT_GEOCODER_BASE_URL: &str = "https://api.mapbox.com/geocoding/v5/mapbox.places";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 300;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

pub const DEFAULT_RECORD_DELAY_MS: u64 = 150;
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Header that makes ngrok-style tunnels skip their browser interstitial.
pub const TUNNEL_WARNING_HEADER: (&str, &str) = ("ngrok-skip-browser-warning", "true");

// Candidate keys per station attribute, in resolution order.
pub const ID_FIELDS: &[&str] = &["Station_ID", "id", "ID", "stationId", "station_id"];
pub const NAME_FIELDS: &[&str] = &["Name", "name", "Station_Name", "stationName", "station_name"];
pub const ADDRESS_FIELDS: &[&str] = &["Address", "address", "Location", "location", "Station_Address"];
pub const LATITUDE_FIELDS: &[&str] = &["Latitude", "latitude", "lat", "Lat"];
pub const LONGITUDE_FIELDS: &[&str] = &["Longitude", "longitude", "lng", "lon", "Lng", "Long"];
