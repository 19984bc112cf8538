//! Per-video processing status, kept in memory for the life of the process.
//!
//! Extraction jobs write here; callers poll it. Nothing is persisted, so a
//! restart forgets every entry.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::tasks::{JobError, TaskUpdate};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ProcessingStatus {
    /// Coarse progress, 0-100. Stays 0 when the frame count is unknown.
    Processing { progress: u8 },
    Completed { frames: usize },
    Error { message: String },
}

impl ProcessingStatus {
    pub fn is_processing(&self) -> bool {
        matches!(self, ProcessingStatus::Processing { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProcessingStatus::Processing { .. } => "processing",
            ProcessingStatus::Completed { .. } => "completed",
            ProcessingStatus::Error { .. } => "error",
        }
    }
}

#[derive(Debug, Default)]
pub struct StatusRegistry {
    entries: Mutex<HashMap<i64, ProcessingStatus>>,
}

impl StatusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave a half-written entry.
    fn entries(&self) -> MutexGuard<'_, HashMap<i64, ProcessingStatus>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, video_id: i64) -> Option<ProcessingStatus> {
        self.entries().get(&video_id).cloned()
    }

    pub fn set(&self, video_id: i64, status: ProcessingStatus) {
        self.entries().insert(video_id, status);
    }

    pub fn clear(&self, video_id: i64) -> Option<ProcessingStatus> {
        self.entries().remove(&video_id)
    }

    /// Mark a video as processing, refusing if an extraction is already in flight.
    pub fn begin(&self, video_id: i64) -> Result<(), JobError> {
        let mut entries = self.entries();
        if entries.get(&video_id).is_some_and(ProcessingStatus::is_processing) {
            return Err(JobError::AlreadyRunning(video_id));
        }
        entries.insert(video_id, ProcessingStatus::Processing { progress: 0 });
        Ok(())
    }

    /// Fold a job update into the video's status.
    pub fn apply(&self, video_id: i64, update: &TaskUpdate) {
        let status = match update {
            TaskUpdate::Started { .. } => ProcessingStatus::Processing { progress: 0 },
            TaskUpdate::Progress(progress) => ProcessingStatus::Processing {
                progress: progress.percent(),
            },
            TaskUpdate::Completed { frames_extracted } => ProcessingStatus::Completed {
                frames: *frames_extracted,
            },
            TaskUpdate::Cancelled => ProcessingStatus::Error {
                message: "extraction cancelled".to_string(),
            },
            TaskUpdate::Failed { error } => ProcessingStatus::Error {
                message: error.clone(),
            },
        };
        self.set(video_id, status);
    }
}
