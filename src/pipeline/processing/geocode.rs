use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tracing::{debug, instrument, warn};

use crate::app::ports::{Geocoder, HttpClientPort};
use crate::config::GeocoderSettings;
use crate::domain::Coordinates;
use crate::error::GeocodeError;

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    center: Option<Vec<f64>>,
}

/// Mapbox-style forward geocoder with bounded exponential backoff.
///
/// Holds no cache; wrap it in a [`CachingGeocoder`] to deduplicate lookups.
pub struct MapboxGeocoder {
    http: Arc<dyn HttpClientPort>,
    access_token: String,
    settings: GeocoderSettings,
}

impl MapboxGeocoder {
    pub fn new(http: Arc<dyn HttpClientPort>, access_token: impl Into<String>, settings: GeocoderSettings) -> Self {
        Self {
            http,
            access_token: access_token.into(),
            settings,
        }
    }

    /// Request URL for an address. Contains the access token, so never log it.
    pub fn request_url(&self, address: &str) -> Result<reqwest::Url, GeocodeError> {
        let mut url = reqwest::Url::parse(&self.settings.base_url)
            .map_err(|e| GeocodeError::Request(format!("bad base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| GeocodeError::Request("base url cannot carry a path".into()))?
            .pop_if_empty()
            .push(&format!("{address}.json"));
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", "1");
            if let Some(country) = &self.settings.country {
                query.append_pair("country", country);
            }
            if let Some(language) = &self.settings.language {
                query.append_pair("language", language);
            }
            query.append_pair("access_token", &self.access_token);
        }
        Ok(url)
    }

    /// Delay slept after failed attempt `attempt` (1-based).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.settings.base_delay_ms.saturating_mul(factor as u64))
    }

    async fn attempt(&self, url: &str) -> Result<Option<Coordinates>, GeocodeError> {
        let resp = self.http.get(url, &[]).await.map_err(GeocodeError::Transport)?;
        if !resp.is_success() {
            return Err(GeocodeError::Status(resp.status));
        }
        let body: FeatureCollection =
            serde_json::from_slice(&resp.bytes).map_err(|e| GeocodeError::Decode(e.to_string()))?;

        Ok(body
            .features
            .into_iter()
            .next()
            .and_then(|feature| feature.center)
            .and_then(|center| match center.as_slice() {
                [lng, lat, ..] => Some(Coordinates::new(*lng, *lat)),
                _ => None,
            }))
    }
}

#[async_trait]
impl Geocoder for MapboxGeocoder {
    #[instrument(skip(self))]
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>, GeocodeError> {
        let address = address.trim();
        if address.is_empty() {
            return Ok(None);
        }
        let url = self.request_url(address)?;
        let max_attempts = self.settings.max_attempts.max(1);

        let mut attempt = 1;
        loop {
            counter!("station_geocode_requests_total").increment(1);
            let started = Instant::now();
            let result = self.attempt(url.as_str()).await;
            histogram!("station_geocode_request_duration_seconds").record(started.elapsed().as_secs_f64());

            match result {
                Ok(found) => return Ok(found),
                Err(e) if attempt >= max_attempts => {
                    counter!("station_geocode_failures_total").increment(1);
                    warn!("Giving up on '{}' after {} attempts: {}", address, attempt, e);
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.backoff_delay(attempt);
                    counter!("station_geocode_retries_total").increment(1);
                    debug!(
                        "Attempt {}/{} for '{}' failed ({}), retrying in {:?}",
                        attempt, max_attempts, address, e, delay
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}

/// Address to geocode outcome map, scoped to one pipeline instance.
///
/// Each address owns a once-cell, so concurrent misses on the same address
/// wait for the first lookup instead of issuing their own. Entries are
/// write-once; failures leave the cell empty.
#[derive(Debug, Default)]
pub struct GeocodeCache {
    entries: Mutex<HashMap<String, Arc<OnceCell<Option<Coordinates>>>>>,
}

impl GeocodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, address: &str) -> Option<Option<Coordinates>> {
        self.lock().get(address.trim()).and_then(|cell| cell.get().copied())
    }

    /// Stores `value` unless the address already has an entry, and returns
    /// whichever value is retained.
    pub fn insert(&self, address: &str, value: Option<Coordinates>) -> Option<Coordinates> {
        let cell = self.slot(address);
        let _ = cell.set(value);
        cell.get().copied().unwrap_or(value)
    }

    /// Number of addresses with a stored outcome.
    pub fn len(&self) -> usize {
        self.lock().values().filter(|cell| cell.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, address: &str) -> Arc<OnceCell<Option<Coordinates>>> {
        self.lock().entry(address.trim().to_string()).or_default().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<OnceCell<Option<Coordinates>>>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Deduplicates lookups through a shared [`GeocodeCache`], including lookups
/// that are still in flight.
pub struct CachingGeocoder {
    inner: Arc<dyn Geocoder>,
    cache: Arc<GeocodeCache>,
}

impl CachingGeocoder {
    pub fn new(inner: Arc<dyn Geocoder>, cache: Arc<GeocodeCache>) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &Arc<GeocodeCache> {
        &self.cache
    }
}

#[async_trait]
impl Geocoder for CachingGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>, GeocodeError> {
        let key = address.trim();
        if key.is_empty() {
            return Ok(None);
        }
        let cell = self.cache.slot(key);
        if let Some(hit) = cell.get() {
            counter!("station_geocode_cache_hits_total").increment(1);
            debug!("Cache hit for '{}'", key);
            return Ok(*hit);
        }
        // The std lock is released inside `slot`; only the cell is held here.
        let found = cell.get_or_try_init(|| self.inner.geocode(key)).await?;
        Ok(*found)
    }
}
