use thiserror::Error;

/// Process exit codes reported by the `station-geocoder` binary.
pub mod exit_code {
    pub const SUCCESS: u8 = 0;
    pub const FAILURE: u8 = 1;
    pub const MISSING_CONFIG: u8 = 2;
    pub const INPUT_FETCH: u8 = 3;
    pub const INPUT_SHAPE: u8 = 4;
}

#[derive(Error, Debug)]
pub enum StationError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("Failed to fetch input from {source_ref}: {message}")]
    InputFetch { source_ref: String, message: String },

    #[error("Failed to parse input from {source_ref}: {error}")]
    InputParse {
        source_ref: String,
        #[source]
        error: serde_json::Error,
    },

    #[error("Input is not an array of station records (got {found})")]
    InputShape { found: String },

    #[error("Failed to write output {path}: {error}")]
    OutputWrite {
        path: String,
        #[source]
        error: std::io::Error,
    },

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StationError {
    pub fn exit_code(&self) -> u8 {
        match self {
            StationError::MissingConfig(_) | StationError::Config(_) | StationError::Toml(_) => {
                exit_code::MISSING_CONFIG
            }
            StationError::InputFetch { .. } | StationError::InputParse { .. } => {
                exit_code::INPUT_FETCH
            }
            StationError::InputShape { .. } => exit_code::INPUT_SHAPE,
            StationError::HttpClient(_)
            | StationError::OutputWrite { .. }
            | StationError::Json(_)
            | StationError::Io(_) => exit_code::FAILURE,
        }
    }
}

/// Failure of a single geocoding lookup after its retry budget is spent.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeocodeError {
    #[error("geocoding request failed: {0}")]
    Transport(String),

    #[error("geocoding service responded with status {0}")]
    Status(u16),

    #[error("geocoding response could not be decoded: {0}")]
    Decode(String),

    #[error("invalid geocoding request: {0}")]
    Request(String),
}

pub type Result<T> = std::result::Result<T, StationError>;
