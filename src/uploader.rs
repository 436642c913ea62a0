//! Document ingestion queue.
//!
//! Files are queued as `Pending`, then processed through `Uploading` to
//! `Success` or `Error`. A file fails when its extension is not a supported
//! document type or it is empty.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["pdf", "docx", "txt", "csv"];

/// Progress increment reported while a file uploads.
const PROGRESS_STEP: u8 = 10;

/// Finished entries kept for display; older ones are pruned after processing.
pub const DEFAULT_FINISHED_RETENTION: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Success,
    Error,
}

/// A file offered for ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IncomingFile {
    pub name: String,
    /// Size in bytes
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadEntry {
    pub id: Uuid,
    pub name: String,
    pub size: u64,
    pub status: UploadStatus,
    /// 0..=100
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct DocumentUploader {
    entries: Vec<UploadEntry>,
    finished_retention: usize,
}

impl Default for DocumentUploader {
    fn default() -> Self {
        Self::with_retention(DEFAULT_FINISHED_RETENTION)
    }
}

impl UploadEntry {
    pub fn is_finished(&self) -> bool {
        matches!(self.status, UploadStatus::Success | UploadStatus::Error)
    }
}

impl DocumentUploader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `finished_retention` finished entries.
    pub fn with_retention(finished_retention: usize) -> Self {
        Self {
            entries: Vec::new(),
            finished_retention,
        }
    }

    /// Queue files as pending. A file already queued under the same name and
    /// size is skipped. Returns the ids of newly queued files.
    pub fn enqueue<I>(&mut self, files: I) -> Vec<Uuid>
    where
        I: IntoIterator<Item = IncomingFile>,
    {
        let mut queued = Vec::new();
        for file in files {
            let duplicate = self
                .entries
                .iter()
                .any(|e| e.name == file.name && e.size == file.size);
            if duplicate {
                debug!("Skipping already queued file {}", file.name);
                continue;
            }
            let entry = UploadEntry {
                id: Uuid::new_v4(),
                name: file.name,
                size: file.size,
                status: UploadStatus::Pending,
                progress: 0,
                error: None,
            };
            queued.push(entry.id);
            self.entries.push(entry);
        }
        queued
    }

    /// Process every pending file. Files already processed are left alone.
    pub async fn process_pending(&mut self) -> &[UploadEntry] {
        for entry in self.entries.iter_mut().filter(|e| e.status == UploadStatus::Pending) {
            entry.status = UploadStatus::Uploading;
            while entry.progress < 100 {
                entry.progress = entry.progress.saturating_add(PROGRESS_STEP).min(100);
                tokio::task::yield_now().await;
            }

            match validate(&entry.name, entry.size) {
                Ok(()) => {
                    entry.status = UploadStatus::Success;
                    info!("Ingested {} ({} bytes)", entry.name, entry.size);
                }
                Err(reason) => {
                    warn!("Rejected {}: {}", entry.name, reason);
                    entry.status = UploadStatus::Error;
                    entry.error = Some(reason);
                }
            }
        }
        self.prune_finished();
        &self.entries
    }

    /// Drop the oldest finished entries beyond the retention limit.
    fn prune_finished(&mut self) {
        let finished = self.entries.iter().filter(|e| e.is_finished()).count();
        let mut excess = finished.saturating_sub(self.finished_retention);
        if excess == 0 {
            return;
        }
        debug!("Pruning {} finished uploads", excess);
        self.entries.retain(|e| {
            if excess > 0 && e.is_finished() {
                excess -= 1;
                false
            } else {
                true
            }
        });
    }

    pub fn entries(&self) -> &[UploadEntry] {
        &self.entries
    }

    pub fn get(&self, id: Uuid) -> Option<&UploadEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn has_pending(&self) -> bool {
        self.entries.iter().any(|e| e.status == UploadStatus::Pending)
    }

    /// Successful files as a percentage of all queued files.
    pub fn overall_progress(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        let done = self
            .entries
            .iter()
            .filter(|e| e.status == UploadStatus::Success)
            .count();
        done as f64 / self.entries.len() as f64 * 100.0
    }
}

fn validate(name: &str, size: u64) -> std::result::Result<(), String> {
    let extension = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension {
        Some(ext) if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) => {}
        Some(ext) => return Err(format!("unsupported file type .{}", ext)),
        None => return Err("file has no extension".to_string()),
    }
    if size == 0 {
        return Err("file is empty".to_string());
    }
    Ok(())
}
