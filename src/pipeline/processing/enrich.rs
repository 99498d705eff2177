use futures::{stream, StreamExt};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::app::ports::Geocoder;
use crate::domain::{Coordinates, NormalizedStation};

/// Applies `f` to every item with at most `concurrency` calls in flight.
///
/// Workers pull the next item as soon as any in-flight call finishes. The
/// returned vector is index-aligned with `items`; an `Err` only occupies its
/// own slot. A concurrency of 0 is treated as 1.
pub async fn map_with_concurrency<T, R, E, F, Fut>(items: Vec<T>, concurrency: usize, f: F) -> Vec<Result<R, E>>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    let mut slots: Vec<Option<Result<R, E>>> = (0..items.len()).map(|_| None).collect();

    let mut completed = stream::iter(items.into_iter().enumerate())
        .map(|(index, item)| {
            let call = f(item);
            async move { (index, call.await) }
        })
        .buffer_unordered(concurrency.max(1));

    while let Some((index, result)) = completed.next().await {
        slots[index] = Some(result);
    }

    slots.into_iter().flatten().collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Lookup {
    NotNeeded,
    Found(Coordinates),
    NotFound,
}

/// Per-record location outcomes from one pass over a station list.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct GeocodeSummary {
    pub total: usize,
    pub already_located: usize,
    pub geocoded: usize,
    pub not_found: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Fills in missing coordinates on already-normalized stations using a
/// bounded worker pool.
pub struct StationEnricher {
    geocoder: Arc<dyn Geocoder>,
    concurrency: usize,
}

impl StationEnricher {
    pub fn new(geocoder: Arc<dyn Geocoder>, concurrency: usize) -> Self {
        Self { geocoder, concurrency }
    }

    #[instrument(skip(self, stations), fields(stations = stations.len(), concurrency = self.concurrency))]
    pub async fn enrich(&self, mut stations: Vec<NormalizedStation>) -> (Vec<NormalizedStation>, GeocodeSummary) {
        let lookups: Vec<Option<String>> = stations
            .iter()
            .map(|s| {
                if s.has_coordinates() {
                    None
                } else {
                    s.lookup_address().map(str::to_string)
                }
            })
            .collect();

        let geocoder = self.geocoder.clone();
        let results = map_with_concurrency(lookups, self.concurrency, move |address| {
            let geocoder = geocoder.clone();
            async move {
                match address {
                    None => Ok(Lookup::NotNeeded),
                    Some(address) => geocoder.geocode(&address).await.map(|found| match found {
                        Some(c) => Lookup::Found(c),
                        None => Lookup::NotFound,
                    }),
                }
            }
        })
        .await;

        let mut summary = GeocodeSummary {
            total: stations.len(),
            ..GeocodeSummary::default()
        };

        for (station, result) in stations.iter_mut().zip(results) {
            match result {
                Ok(Lookup::NotNeeded) if station.has_coordinates() => summary.already_located += 1,
                Ok(Lookup::NotNeeded) => summary.skipped += 1,
                Ok(Lookup::Found(c)) => {
                    station.set_coordinates(Some(c));
                    summary.geocoded += 1;
                }
                Ok(Lookup::NotFound) => {
                    warn!("No coordinates found for station {}", station.id);
                    summary.not_found += 1;
                }
                Err(e) => {
                    warn!("Geocoding failed for station {}: {}", station.id, e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Enriched {} stations: {} geocoded, {} not found, {} failed",
            summary.total, summary.geocoded, summary.not_found, summary.failed
        );
        (stations, summary)
    }
}
