use metrics::{counter, histogram};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::app::ports::{Geocoder, HttpClientPort, Pacer};
use crate::config::Config;
use crate::constants::DEFAULT_RECORD_DELAY_MS;
use crate::domain::{NormalizedStation, RawStationRecord};
use crate::error::{Result, StationError};
use crate::infra::http_client::ReqwestHttp;
use crate::infra::rate_limiter_adapter::{FixedDelayPacer, TokenBucketPacer};
use crate::infra::station_output_adapter::StationFileOutput;
use crate::pipeline::ingestion::{extract_records, fetch_payload, InputSource};
use crate::pipeline::processing::enrich::GeocodeSummary;
use crate::pipeline::processing::geocode::{CachingGeocoder, GeocodeCache, MapboxGeocoder};
use crate::pipeline::processing::normalize::{normalize, plan_geocoding, GeocodePlan};
use crate::rate_limiter::RateLimiter;

/// Result of a complete pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub summary: GeocodeSummary,
    pub output_file: String,
    pub backup_file: Option<String>,
    pub dry_run: bool,
}

/// Sequential fetch, normalize, geocode, back up, write.
///
/// Owns its geocode cache, so repeated runs on one instance reuse earlier
/// lookups and separate instances never share state. The installed geocoder
/// is put behind whichever cache the pipeline holds when it runs.
pub struct Pipeline {
    http: Arc<dyn HttpClientPort>,
    geocoder: Option<Arc<dyn Geocoder>>,
    cache: Arc<GeocodeCache>,
    pacer: Arc<dyn Pacer>,
    output: StationFileOutput,
    skip_tunnel_warning: bool,
}

impl Pipeline {
    /// Pipeline with no geocoder, a fresh cache and the default fixed delay
    /// between records.
    pub fn new(http: Arc<dyn HttpClientPort>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            http,
            geocoder: None,
            cache: Arc::new(GeocodeCache::new()),
            pacer: Arc::new(FixedDelayPacer(Duration::from_millis(DEFAULT_RECORD_DELAY_MS))),
            output: StationFileOutput::new(output_path),
            skip_tunnel_warning: true,
        }
    }

    /// Builds the production pipeline: reqwest transport, Mapbox geocoder when
    /// a token is configured, and the configured pacing policy.
    pub fn from_config(config: &Config) -> Result<Self> {
        let http: Arc<dyn HttpClientPort> = Arc::new(
            ReqwestHttp::new(Duration::from_secs(config.geocoder.timeout_seconds)).map_err(StationError::HttpClient)?,
        );

        let pacer: Arc<dyn Pacer> = match config.pipeline.requests_per_minute {
            0 => Arc::new(FixedDelayPacer(Duration::from_millis(config.pipeline.record_delay_ms))),
            rpm => Arc::new(TokenBucketPacer(RateLimiter::per_minute(rpm))),
        };

        let mut pipeline = Pipeline::new(http.clone(), config.output_path())
            .with_pacer(pacer)
            .with_tunnel_warning_bypass(config.pipeline.skip_tunnel_warning);

        match geocoder_from_config(config, http) {
            Some(geocoder) => pipeline = pipeline.with_geocoder(geocoder),
            None => warn!("No geocoding token configured; stations without coordinates will keep null coordinates"),
        }
        Ok(pipeline)
    }

    pub fn with_geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn with_cache(mut self, cache: Arc<GeocodeCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn with_tunnel_warning_bypass(mut self, enabled: bool) -> Self {
        self.skip_tunnel_warning = enabled;
        self
    }

    pub fn cache(&self) -> &Arc<GeocodeCache> {
        &self.cache
    }

    pub fn output(&self) -> &StationFileOutput {
        &self.output
    }

    /// Run the complete pipeline against `source`.
    #[instrument(skip(self, source), fields(source = %source))]
    pub async fn run(&self, source: &InputSource, dry_run: bool) -> Result<PipelineResult> {
        let started = Instant::now();
        counter!("station_pipeline_runs_total").increment(1);

        info!("📡 Fetching stations from {}", source);
        let payload = fetch_payload(source, self.http.as_ref(), self.skip_tunnel_warning).await?;
        let records = extract_records(payload)?;
        info!("✅ Received {} station records", records.len());

        let (stations, summary) = self.process_records(&records).await;

        let output_file = self.output.path().display().to_string();
        let backup_file = if dry_run {
            info!("Dry run: leaving {} untouched", output_file);
            None
        } else {
            let backup = self.output.backup_existing();
            self.output.write(&stations)?;
            backup.map(|p| p.display().to_string())
        };

        histogram!("station_pipeline_duration_seconds").record(started.elapsed().as_secs_f64());
        info!(
            "🏁 Done: {} stations ({} had coordinates, {} geocoded, {} not found, {} failed, {} skipped)",
            summary.total, summary.already_located, summary.geocoded, summary.not_found, summary.failed, summary.skipped
        );

        Ok(PipelineResult {
            summary,
            output_file,
            backup_file,
            dry_run,
        })
    }

    /// Normalizes and geocodes records one at a time, pacing after each.
    /// Lookup failures are logged and leave that station's coordinates null.
    pub async fn process_records(&self, records: &[RawStationRecord]) -> (Vec<NormalizedStation>, GeocodeSummary) {
        let mut stations = Vec::with_capacity(records.len());
        let mut summary = GeocodeSummary {
            total: records.len(),
            ..GeocodeSummary::default()
        };

        let geocoder = self
            .geocoder
            .as_ref()
            .map(|inner| CachingGeocoder::new(inner.clone(), self.cache.clone()));

        for (i, raw) in records.iter().enumerate() {
            let mut station = normalize(raw);

            match (plan_geocoding(&station, geocoder.is_some()), &geocoder) {
                (GeocodePlan::Resolved, _) => {
                    debug!("Station {} already has coordinates", station.id);
                    summary.already_located += 1;
                }
                (GeocodePlan::Lookup(address), Some(geocoder)) => match geocoder.geocode(&address).await {
                    Ok(Some(coordinates)) => {
                        station.set_coordinates(Some(coordinates));
                        info!("📍 Station {} geocoded to {:?}", station.id, station.coords);
                        summary.geocoded += 1;
                    }
                    Ok(None) => {
                        warn!("No coordinates found for station {} ('{}')", station.id, address);
                        summary.not_found += 1;
                    }
                    Err(e) => {
                        warn!("Geocoding failed for station {} ('{}'): {}", station.id, address, e);
                        summary.failed += 1;
                    }
                },
                (GeocodePlan::Skip(reason), _) => {
                    warn!("Station {} has no coordinates: {}", station.id, reason);
                    summary.skipped += 1;
                }
                (GeocodePlan::Lookup(_), None) => {
                    summary.skipped += 1;
                }
            }

            counter!("station_records_processed_total").increment(1);
            if (i + 1) % 10 == 0 {
                debug!("Processed {}/{} stations", i + 1, records.len());
            }
            stations.push(station);
            self.pacer.wait().await;
        }

        (stations, summary)
    }
}

/// Mapbox geocoder for `config`, or `None` when no token is configured.
pub fn geocoder_from_config(config: &Config, http: Arc<dyn HttpClientPort>) -> Option<Arc<dyn Geocoder>> {
    config
        .token()
        .map(|token| Arc::new(MapboxGeocoder::new(http, token, config.geocoder.clone())) as Arc<dyn Geocoder>)
}
