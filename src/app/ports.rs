use async_trait::async_trait;

use crate::domain::Coordinates;
use crate::error::GeocodeError;

#[async_trait]
pub trait HttpClientPort: Send + Sync {
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpGetResult, String>;
}

#[derive(Clone, Debug)]
pub struct HttpGetResult {
    pub status: u16,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl HttpGetResult {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Forward geocoding: address in, `(lng, lat)` out.
///
/// `Ok(None)` means the service answered but had no match, which callers
/// treat differently from an `Err`.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>, GeocodeError>;
}

/// Pacing policy applied between units of work.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn wait(&self);
}
