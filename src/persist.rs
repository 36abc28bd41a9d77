//! Result persistence: one JSON artifact per document plus a master log.
//!
//! Two artifacts per processed document:
//!
//! * an **individual file** `invoice_{timestamp}_{id}.json` holding
//!   `{metadata, extraction_data}`;
//! * an append-only **master file** `all_results.json`, a JSON array of
//!   every document ever processed, read-modify-rewritten on each append.
//!
//! The master file is treated as hostile input on read: a corrupt file
//! resets to an empty list and a bare object is wrapped into a list, so one
//! bad write can never brick future appends. All writes are atomic
//! (temp file + rename) to avoid half-written artifacts.
//!
//! Persistence is secondary to extraction: every failure here is a
//! [`PersistError`] the caller reports and moves past, never a reason to
//! drop the computed result.

use crate::error::PersistError;
use crate::schema::ExtractionData;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the append-only master log inside the results directory.
pub const MASTER_FILE: &str = "all_results.json";

/// Metadata attached to an individual result artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub timestamp: String,
    pub processing_date: String,
    pub unique_id: String,
    pub filename: String,
    pub file_id: String,
}

/// The persisted (and streamed-back) wrapper around an extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredResult {
    pub metadata: ResultMetadata,
    pub extraction_data: ExtractionData,
}

/// One entry of the master log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterEntry {
    pub id: String,
    pub timestamp: String,
    pub processing_date: String,
    pub source_filename: String,
    pub extraction_data: ExtractionData,
}

fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Wrap an extraction in its persistence metadata.
///
/// Built before any file I/O so a failing disk cannot withhold the payload
/// the caller is owed.
pub fn wrap_result(extraction_data: ExtractionData, source_filename: &str) -> StoredResult {
    let now = Local::now();
    let compact = now.format("%Y%m%d_%H%M%S").to_string();
    let unique_id = short_id();
    StoredResult {
        metadata: ResultMetadata {
            timestamp: now.to_rfc3339(),
            processing_date: now.format("%Y-%m-%d %H:%M:%S").to_string(),
            unique_id: unique_id.clone(),
            filename: source_filename.to_string(),
            file_id: format!("{compact}_{unique_id}"),
        },
        extraction_data,
    }
}

async fn ensure_dir(dir: &Path) -> Result<(), PersistError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| PersistError::DirCreateFailed {
            path: dir.to_path_buf(),
            source: e,
        })
}

async fn write_atomic(path: &Path, contents: &str) -> Result<(), PersistError> {
    let tmp = path.with_extension("json.tmp");
    let io_err = |e| PersistError::WriteFailed {
        path: path.to_path_buf(),
        source: e,
    };
    tokio::fs::write(&tmp, contents).await.map_err(io_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err)?;
    Ok(())
}

/// Write the individual result artifact; returns its path.
pub async fn save_individual(
    stored: &StoredResult,
    results_dir: &Path,
) -> Result<PathBuf, PersistError> {
    ensure_dir(results_dir).await?;

    let path = results_dir.join(format!("invoice_{}.json", stored.metadata.file_id));
    let body = serde_json::to_string_pretty(stored)?;
    write_atomic(&path, &body).await?;

    info!("Saved individual result: {}", path.display());
    Ok(path)
}

/// Append an entry to the master log; returns its path and the new total
/// document count.
pub async fn append_master(
    extraction_data: &ExtractionData,
    source_filename: &str,
    results_dir: &Path,
) -> Result<(PathBuf, usize), PersistError> {
    ensure_dir(results_dir).await?;
    let path = results_dir.join(MASTER_FILE);

    let mut entries = match tokio::fs::read_to_string(&path).await {
        Ok(text) => match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(serde_json::Value::Array(entries)) => entries,
            Ok(single) => vec![single],
            Err(e) => {
                debug!("Master file unreadable ({}); starting a fresh list", e);
                Vec::new()
            }
        },
        Err(_) => Vec::new(),
    };

    let now = Local::now();
    let entry = MasterEntry {
        id: format!("{}_{}", now.format("%Y%m%d_%H%M%S"), short_id()),
        timestamp: now.to_rfc3339(),
        processing_date: now.format("%Y-%m-%d %H:%M:%S").to_string(),
        source_filename: source_filename.to_string(),
        extraction_data: extraction_data.clone(),
    };
    entries.push(serde_json::to_value(&entry)?);

    let total = entries.len();
    let body = serde_json::to_string_pretty(&entries)?;
    write_atomic(&path, &body)
        .await
        .map_err(|e| match e {
            PersistError::WriteFailed { path, source } => {
                PersistError::MasterRewriteFailed { path, source }
            }
            other => other,
        })?;

    info!("Master log now holds {} document(s)", total);
    Ok((path, total))
}
