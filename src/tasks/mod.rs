//! Background extraction jobs.
//!
//! Jobs run off the caller's thread and report through [`TaskUpdate`] messages,
//! which the manager folds into the shared [`StatusRegistry`](crate::status::StatusRegistry).

pub mod manager;

use thiserror::Error;

pub use manager::{ExtractionHandle, ExtractionJobs};

/// Progress information for a job.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskProgress {
    pub current: usize,
    pub total: usize,
    pub current_item: Option<String>,
}

impl TaskProgress {
    pub fn new(current: usize, total: usize) -> Self {
        Self {
            current,
            total,
            current_item: None,
        }
    }

    pub fn with_item(mut self, item: impl Into<String>) -> Self {
        self.current_item = Some(item.into());
        self
    }

    /// Progress percentage (0-100). 0 when the total is unknown.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            0
        } else {
            ((self.current as f64 / self.total as f64) * 100.0).min(100.0) as u8
        }
    }
}

/// Messages sent from a running job.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskUpdate {
    /// Job opened its video; `total` is the reported raw frame count, 0 if unknown.
    Started { total: usize },
    Progress(TaskProgress),
    Completed { frames_extracted: usize },
    Cancelled,
    Failed { error: String },
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("extraction already running for video {0}")]
    AlreadyRunning(i64),
    #[error("extraction failed: {0}")]
    Failed(String),
    #[error("extraction task panicked: {0}")]
    Panicked(String),
    #[error("extraction jobs need a running tokio runtime")]
    NoRuntime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        assert_eq!(TaskProgress::new(0, 0).percent(), 0);
        assert_eq!(TaskProgress::new(1, 4).percent(), 25);
        assert_eq!(TaskProgress::new(10, 4).percent(), 100);
    }

    #[test]
    fn test_with_item() {
        let progress = TaskProgress::new(3, 9).with_item("frame.jpg");
        assert_eq!(progress.current_item.as_deref(), Some("frame.jpg"));
        assert_eq!(progress.percent(), 33);
    }
}
