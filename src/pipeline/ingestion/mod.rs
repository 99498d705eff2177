use serde_json::Value;
use std::path::PathBuf;
use tracing::{info, instrument};

use crate::app::ports::HttpClientPort;
use crate::constants::TUNNEL_WARNING_HEADER;
use crate::domain::RawStationRecord;
use crate::error::{Result, StationError};

/// Where the raw station list comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum InputSource {
    Url(String),
    File(PathBuf),
}

impl InputSource {
    pub fn parse(location: &str) -> Self {
        let location = location.trim();
        let lower = location.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            InputSource::Url(location.to_string())
        } else {
            InputSource::File(PathBuf::from(location))
        }
    }

    pub fn describe(&self) -> String {
        match self {
            InputSource::Url(url) => url.clone(),
            InputSource::File(path) => path.display().to_string(),
        }
    }
}

impl std::fmt::Display for InputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Fetches and parses the raw payload. Shape is not checked here.
#[instrument(skip(source, http), fields(source = %source))]
pub async fn fetch_payload(
    source: &InputSource,
    http: &dyn HttpClientPort,
    skip_tunnel_warning: bool,
) -> Result<Value> {
    let bytes = match source {
        InputSource::Url(url) => {
            let headers: &[(&str, &str)] = if skip_tunnel_warning {
                &[TUNNEL_WARNING_HEADER]
            } else {
                &[]
            };
            let resp = http.get(url, headers).await.map_err(|message| StationError::InputFetch {
                source_ref: url.clone(),
                message,
            })?;
            if !resp.is_success() {
                return Err(StationError::InputFetch {
                    source_ref: url.clone(),
                    message: format!("HTTP status {}", resp.status),
                });
            }
            resp.bytes
        }
        InputSource::File(path) => tokio::fs::read(path).await.map_err(|e| StationError::InputFetch {
            source_ref: path.display().to_string(),
            message: e.to_string(),
        })?,
    };

    info!("Fetched {} bytes of station data", bytes.len());
    serde_json::from_slice(&bytes).map_err(|error| StationError::InputParse {
        source_ref: source.describe(),
        error,
    })
}

/// Accepts a bare array or a `{ "data": [...] }` envelope.
pub fn extract_records(payload: Value) -> Result<Vec<RawStationRecord>> {
    match payload {
        Value::Array(records) => Ok(records),
        Value::Object(mut envelope) => match envelope.remove("data") {
            Some(Value::Array(records)) => Ok(records),
            Some(other) => Err(StationError::InputShape {
                found: format!("object with non-array data ({})", json_kind(&other)),
            }),
            None => Err(StationError::InputShape {
                found: "object without a data array".to_string(),
            }),
        },
        other => Err(StationError::InputShape {
            found: json_kind(&other).to_string(),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
