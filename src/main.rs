use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use station_geocoder::config::Config;
use station_geocoder::error::{exit_code, StationError};
use station_geocoder::infra::http_client::ReqwestHttp;
use station_geocoder::infra::station_output_adapter::StationFileOutput;
use station_geocoder::logging;
use station_geocoder::pipeline::processing::{CachingGeocoder, GeocodeCache, GeocodeSummary, StationEnricher};
use station_geocoder::pipeline::runner::geocoder_from_config;
use station_geocoder::pipeline::Pipeline;

#[derive(Parser)]
#[command(name = "station-geocoder")]
#[command(about = "Normalize and geocode battery-swap station lists for the map")]
#[command(version)]
struct Cli {
    /// Optional TOML file with geocoder and pipeline settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch raw stations, normalize, geocode sequentially and write the output file
    Update {
        /// Station source URL or local path (overrides STATIONS_SOURCE)
        #[arg(long)]
        source: Option<String>,
        /// Output file (overrides STATIONS_OUTPUT)
        #[arg(long)]
        output: Option<String>,
        /// Run everything except the backup and write steps
        #[arg(long)]
        dry_run: bool,
    },
    /// Fill in missing coordinates of an existing station file with a worker pool
    Enrich {
        /// Normalized station file to read
        #[arg(long)]
        input: PathBuf,
        /// Where to write the result; defaults to rewriting the input
        #[arg(long)]
        output: Option<PathBuf>,
        /// Maximum geocoding requests in flight
        #[arg(long)]
        concurrency: Option<usize>,
    },
}

fn print_summary(summary: &GeocodeSummary) {
    println!("   Total stations: {}", summary.total);
    println!("   Had coordinates: {}", summary.already_located);
    println!("   Geocoded: {}", summary.geocoded);
    println!("   Not found: {}", summary.not_found);
    println!("   Failed: {}", summary.failed);
    println!("   Skipped: {}", summary.skipped);
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Update { source, output, dry_run } => {
            if let Some(source) = source {
                config.source = Some(source);
            }
            if let Some(output) = output {
                config.pipeline.output = output;
            }
            let source = config.input_source()?;
            let pipeline = Pipeline::from_config(&config)?;

            println!("🔄 Updating stations from {}...", source);
            let result = pipeline.run(&source, dry_run).await?;

            println!("\n📊 Station update results:");
            print_summary(&result.summary);
            if result.dry_run {
                println!("   Output file: {} (dry run, not written)", result.output_file);
            } else {
                println!("   Output file: {}", result.output_file);
            }
            if let Some(backup) = &result.backup_file {
                println!("   Backup: {}", backup);
            }
        }
        Commands::Enrich { input, output, concurrency } => {
            if let Some(concurrency) = concurrency {
                config.pipeline.concurrency = concurrency;
            }

            let stations = StationFileOutput::new(&input)
                .read()
                .with_context(|| format!("reading stations from {}", input.display()))?;

            let http = Arc::new(
                ReqwestHttp::new(Duration::from_secs(config.geocoder.timeout_seconds)).map_err(StationError::HttpClient)?,
            );
            let Some(geocoder) = geocoder_from_config(&config, http) else {
                warn!("No geocoding token configured; nothing to enrich");
                return Ok(());
            };
            let geocoder = Arc::new(CachingGeocoder::new(geocoder, Arc::new(GeocodeCache::new())));

            println!("🔧 Enriching {} stations with {} workers...", stations.len(), config.pipeline.concurrency);
            let enricher = StationEnricher::new(geocoder, config.pipeline.concurrency);
            let (stations, summary) = enricher.enrich(stations).await;

            let destination = StationFileOutput::new(output.unwrap_or(input));
            let backup = destination.backup_existing();
            destination.write(&stations)?;

            println!("\n📊 Enrichment results:");
            print_summary(&summary);
            println!("   Output file: {}", destination.path().display());
            if let Some(backup) = backup {
                println!("   Backup: {}", backup.display());
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let _log_guard = logging::init_logging();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => {
            info!("Finished");
            ExitCode::from(exit_code::SUCCESS)
        }
        Err(e) => {
            let code = e
                .downcast_ref::<StationError>()
                .map(StationError::exit_code)
                .unwrap_or(exit_code::FAILURE);
            error!("Run failed: {:#}", e);
            println!("❌ {:#}", e);
            ExitCode::from(code)
        }
    }
}
