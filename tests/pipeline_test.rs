use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use station_geocoder::app::ports::{Geocoder, HttpClientPort, HttpGetResult, Pacer};
use station_geocoder::domain::Coordinates;
use station_geocoder::error::{exit_code, GeocodeError, StationError};
use station_geocoder::pipeline::processing::GeocodeCache;
use station_geocoder::pipeline::{InputSource, Pipeline};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::tempdir;

/// Serves one JSON body for every GET.
struct StubHttp {
    body: Value,
}

#[async_trait]
impl HttpClientPort for StubHttp {
    async fn get(&self, _url: &str, _headers: &[(&str, &str)]) -> std::result::Result<HttpGetResult, String> {
        Ok(HttpGetResult {
            status: 200,
            bytes: serde_json::to_vec(&self.body).map_err(|e| e.to_string())?,
            content_type: "application/json".into(),
        })
    }
}

/// Answers from a fixed address book and records every lookup.
#[derive(Default)]
struct FakeGeocoder {
    book: HashMap<String, Result<Option<Coordinates>, GeocodeError>>,
    calls: Mutex<Vec<String>>,
}

impl FakeGeocoder {
    fn with(entries: Vec<(&str, Result<Option<Coordinates>, GeocodeError>)>) -> Arc<Self> {
        Arc::new(Self {
            book: entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn geocode(&self, address: &str) -> std::result::Result<Option<Coordinates>, GeocodeError> {
        self.calls.lock().unwrap().push(address.to_string());
        self.book.get(address).cloned().unwrap_or(Ok(None))
    }
}

#[derive(Default)]
struct CountingPacer {
    waits: AtomicUsize,
}

#[async_trait]
impl Pacer for CountingPacer {
    async fn wait(&self) {
        self.waits.fetch_add(1, Ordering::SeqCst);
    }
}

fn url_source() -> InputSource {
    InputSource::Url("https://stations.test/api/stations".into())
}

fn read_json(path: &std::path::Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_station_with_coordinates_is_written_without_geocoding() -> Result<()> {
    let dir = tempdir()?;
    let output = dir.path().join("stations.json");
    let geocoder = FakeGeocoder::with(vec![]);
    let pipeline = Pipeline::new(
        Arc::new(StubHttp {
            body: json!([{"Station_ID": 1, "Name": "A", "Latitude": 10.0, "Longitude": 106.0}]),
        }),
        &output,
    )
    .with_geocoder(geocoder.clone());

    let result = pipeline.run(&url_source(), false).await?;

    assert_eq!(
        read_json(&output),
        json!([{"id": 1, "name": "A", "latitude": 10.0, "longitude": 106.0, "coords": [106.0, 10.0]}])
    );
    assert!(geocoder.calls().is_empty());
    assert_eq!(result.summary.already_located, 1);
    assert!(result.backup_file.is_none());
    Ok(())
}

#[tokio::test]
async fn test_envelope_payload_is_accepted() -> Result<()> {
    let dir = tempdir()?;
    let output = dir.path().join("stations.json");
    let pipeline = Pipeline::new(
        Arc::new(StubHttp {
            body: json!({"status": "success", "data": [{"id": "a"}, {"id": "b"}]}),
        }),
        &output,
    );

    let result = pipeline.run(&url_source(), false).await?;

    assert_eq!(result.summary.total, 2);
    assert_eq!(
        read_json(&output),
        json!([
            {"id": "a", "latitude": null, "longitude": null},
            {"id": "b", "latitude": null, "longitude": null}
        ])
    );
    Ok(())
}

#[tokio::test]
async fn test_one_bad_address_does_not_abort_the_run() -> Result<()> {
    let dir = tempdir()?;
    let output = dir.path().join("stations.json");
    let geocoder = FakeGeocoder::with(vec![
        ("1 Good St", Ok(Some(Coordinates::new(106.7, 10.8)))),
        ("2 Broken St", Err(GeocodeError::Status(500))),
    ]);
    let pacer = Arc::new(CountingPacer::default());
    let pipeline = Pipeline::new(
        Arc::new(StubHttp {
            body: json!([
                {"id": 1, "Address": "1 Good St"},
                {"id": 2, "Address": "2 Broken St"},
                {"id": 3, "Address": "3 Unknown St"},
                {"id": 4}
            ]),
        }),
        &output,
    )
    .with_geocoder(geocoder.clone())
    .with_pacer(pacer.clone());

    let result = pipeline.run(&url_source(), false).await?;

    let written = read_json(&output);
    assert_eq!(written[0]["coords"], json!([106.7, 10.8]));
    assert_eq!(written[1]["latitude"], Value::Null);
    assert!(written[1].get("coords").is_none());
    assert_eq!(written[2]["longitude"], Value::Null);
    assert_eq!(written[3]["latitude"], Value::Null);

    assert_eq!(result.summary.geocoded, 1);
    assert_eq!(result.summary.failed, 1);
    assert_eq!(result.summary.not_found, 1);
    assert_eq!(result.summary.skipped, 1);
    assert_eq!(geocoder.calls(), vec!["1 Good St", "2 Broken St", "3 Unknown St"]);
    assert_eq!(pacer.waits.load(Ordering::SeqCst), 4);
    Ok(())
}

#[tokio::test]
async fn test_without_credential_records_keep_null_coordinates() -> Result<()> {
    let dir = tempdir()?;
    let output = dir.path().join("stations.json");
    let pipeline = Pipeline::new(
        Arc::new(StubHttp {
            body: json!([{"id": 1, "Name": "Depot", "Address": "1 Good St"}]),
        }),
        &output,
    );

    let result = pipeline.run(&url_source(), false).await?;

    assert_eq!(
        read_json(&output),
        json!([{"id": 1, "name": "Depot", "address": "1 Good St", "latitude": null, "longitude": null}])
    );
    assert_eq!(result.summary.skipped, 1);
    Ok(())
}

#[tokio::test]
async fn test_second_run_with_warm_cache_is_byte_identical() -> Result<()> {
    let dir = tempdir()?;
    let output = dir.path().join("stations.json");
    let geocoder = FakeGeocoder::with(vec![("9 Ly Thuong Kiet", Ok(Some(Coordinates::new(105.85, 21.02))))]);
    let pipeline = Pipeline::new(
        Arc::new(StubHttp {
            body: json!([
                {"id": 1, "address": "9 Ly Thuong Kiet"},
                {"id": 2, "address": " 9 Ly Thuong Kiet "},
                {"id": 3, "lat": 10.1, "lng": 106.1}
            ]),
        }),
        &output,
    )
    .with_geocoder(geocoder.clone());

    pipeline.run(&url_source(), false).await?;
    let first = std::fs::read(&output)?;
    let second_result = pipeline.run(&url_source(), false).await?;
    let second = std::fs::read(&output)?;

    assert_eq!(first, second);
    assert_eq!(geocoder.calls().len(), 1);
    assert_eq!(pipeline.cache().len(), 1);

    let backup = second_result.backup_file.expect("first output should be backed up");
    assert!(backup.contains("backups"));
    assert_eq!(std::fs::read(&backup)?, first);
    Ok(())
}

#[tokio::test]
async fn test_separate_pipelines_do_not_share_cache() -> Result<()> {
    let dir = tempdir()?;
    let body = json!([{"id": 1, "address": "1 Good St"}]);
    let geocoder = FakeGeocoder::with(vec![("1 Good St", Ok(Some(Coordinates::new(1.0, 2.0))))]);

    for name in ["a.json", "b.json"] {
        let pipeline = Pipeline::new(Arc::new(StubHttp { body: body.clone() }), dir.path().join(name))
            .with_geocoder(geocoder.clone());
        pipeline.run(&url_source(), false).await?;
    }

    assert_eq!(geocoder.calls().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_dry_run_leaves_output_untouched() -> Result<()> {
    let dir = tempdir()?;
    let output = dir.path().join("stations.json");
    std::fs::write(&output, "[]\n")?;
    let pipeline = Pipeline::new(Arc::new(StubHttp { body: json!([{"id": 1}]) }), &output);

    let result = pipeline.run(&url_source(), true).await?;

    assert!(result.dry_run);
    assert_eq!(std::fs::read_to_string(&output)?, "[]\n");
    assert!(!dir.path().join("backups").exists());
    Ok(())
}

#[tokio::test]
async fn test_non_array_payload_is_shape_error() {
    let dir = tempdir().unwrap();
    let pipeline = Pipeline::new(
        Arc::new(StubHttp {
            body: json!({"status": "error", "message": "maintenance"}),
        }),
        dir.path().join("stations.json"),
    );

    let err = pipeline.run(&url_source(), false).await.unwrap_err();

    assert!(matches!(err, StationError::InputShape { .. }));
    assert_eq!(err.exit_code(), exit_code::INPUT_SHAPE);
    assert!(!dir.path().join("stations.json").exists());
}

#[tokio::test]
async fn test_local_file_source() -> Result<()> {
    let dir = tempdir()?;
    let input = dir.path().join("raw.json");
    std::fs::write(&input, r#"[{"ID": "x", "Latitude": "10.5", "Longitude": "106.5"}]"#)?;
    let output = dir.path().join("out/stations.json");
    let pipeline = Pipeline::new(Arc::new(StubHttp { body: Value::Null }), &output);

    pipeline.run(&InputSource::File(input), false).await?;

    assert_eq!(
        read_json(&output),
        json!([{"id": "x", "latitude": 10.5, "longitude": 106.5, "coords": [106.5, 10.5]}])
    );
    Ok(())
}

#[tokio::test]
async fn test_injected_cache_is_used_regardless_of_builder_order() -> Result<()> {
    let dir = tempdir()?;
    let geocoder = FakeGeocoder::with(vec![("x", Ok(Some(Coordinates::new(1.0, 2.0))))]);
    let injected = Arc::new(GeocodeCache::new());
    let pipeline = Pipeline::new(
        Arc::new(StubHttp {
            body: json!([{"id": 1, "address": "x"}]),
        }),
        dir.path().join("stations.json"),
    )
    .with_geocoder(geocoder.clone())
    .with_cache(injected.clone());

    pipeline.run(&url_source(), false).await?;

    assert_eq!(injected.len(), 1);
    assert_eq!(injected.get("x"), Some(Some(Coordinates::new(1.0, 2.0))));
    assert!(Arc::ptr_eq(pipeline.cache(), &injected));
    Ok(())
}

#[tokio::test]
async fn test_default_pacing_waits_between_records() -> Result<()> {
    let dir = tempdir()?;
    let pipeline = Pipeline::new(
        Arc::new(StubHttp {
            body: json!([{"id": 1}, {"id": 2}]),
        }),
        dir.path().join("stations.json"),
    );

    let started = Instant::now();
    pipeline.run(&url_source(), true).await?;

    assert!(started.elapsed() >= Duration::from_millis(300));
    Ok(())
}
