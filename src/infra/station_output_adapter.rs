use crate::constants::BACKUP_DIR_NAME;
use crate::domain::NormalizedStation;
use crate::error::{Result, StationError};
use chrono::{DateTime, SecondsFormat, Utc};
use std::io::{BufWriter, ErrorKind, Write};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File-based station output.
/// Writes the station list as one pretty-printed JSON array, keeping a
/// timestamped copy of whatever was there before.
pub struct StationFileOutput {
    path: PathBuf,
}

impl StationFileOutput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.path
            .parent()
            .unwrap_or(Path::new("."))
            .join(BACKUP_DIR_NAME)
    }

    pub fn backup_path_at(&self, now: DateTime<Utc>) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("stations");
        let stamp = now
            .to_rfc3339_opts(SecondsFormat::Millis, true)
            .replace(':', "-");
        self.backup_dir().join(format!("{stem}-{stamp}.json"))
    }

    /// Copies the current output aside. Best effort: a missing file yields
    /// `None` silently, any other failure is logged and yields `None`.
    pub fn backup_existing(&self) -> Option<PathBuf> {
        self.backup_existing_at(Utc::now())
    }

    pub fn backup_existing_at(&self, now: DateTime<Utc>) -> Option<PathBuf> {
        let backup_path = self.backup_path_at(now);
        let result = fs::metadata(&self.path)
            .and_then(|_| fs::create_dir_all(self.backup_dir()))
            .and_then(|_| fs::copy(&self.path, &backup_path));

        match result {
            Ok(_) => {
                info!("Backed up {} to {}", self.path.display(), backup_path.display());
                Some(backup_path)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No existing output at {}, skipping backup", self.path.display());
                None
            }
            Err(e) => {
                warn!("Could not back up {}: {}", self.path.display(), e);
                None
            }
        }
    }

    pub fn write(&self, stations: &[NormalizedStation]) -> Result<()> {
        let to_write_error = |error: std::io::Error| StationError::OutputWrite {
            path: self.path.display().to_string(),
            error,
        };

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(to_write_error)?;
        }

        let mut writer = BufWriter::new(File::create(&self.path).map_err(to_write_error)?);
        serde_json::to_writer_pretty(&mut writer, stations)?;
        writeln!(writer).map_err(to_write_error)?;
        writer.flush().map_err(to_write_error)?;

        info!("Wrote {} stations to {}", stations.len(), self.path.display());
        Ok(())
    }

    pub fn read(&self) -> Result<Vec<NormalizedStation>> {
        let content = fs::read_to_string(&self.path).map_err(|e| StationError::InputFetch {
            source_ref: self.path.display().to_string(),
            message: e.to_string(),
        })?;
        let mut stations: Vec<NormalizedStation> =
            serde_json::from_str(&content).map_err(|error| StationError::InputParse {
                source_ref: self.path.display().to_string(),
                error,
            })?;
        for station in &mut stations {
            station.repair_coords();
        }
        Ok(stations)
    }
}
