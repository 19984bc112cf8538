//! Launching and supervising extraction jobs.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::{JobError, TaskUpdate};
use crate::db::FrameStore;
use crate::extractor::{ExtractionSummary, FrameExtractor};
use crate::status::StatusRegistry;
use crate::video::VideoSource;

type CancelFlags = Arc<Mutex<HashMap<i64, Arc<AtomicBool>>>>;

fn lock_flags(flags: &CancelFlags) -> MutexGuard<'_, HashMap<i64, Arc<AtomicBool>>> {
    flags.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A running (or finished) extraction job.
///
/// Dropping the handle does not stop the job.
pub struct ExtractionHandle {
    video_id: i64,
    cancel_flag: Arc<AtomicBool>,
    join: JoinHandle<Result<ExtractionSummary, JobError>>,
}

impl ExtractionHandle {
    pub fn video_id(&self) -> i64 {
        self.video_id
    }

    /// Ask the job to stop before its next frame.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the job. The status registry has its final state once this returns.
    pub async fn wait(self) -> Result<ExtractionSummary, JobError> {
        match self.join.await {
            Ok(result) => result,
            Err(e) => Err(JobError::Panicked(e.to_string())),
        }
    }
}

/// Starts extraction jobs and keeps their status current.
pub struct ExtractionJobs {
    store: Arc<dyn FrameStore>,
    source: Arc<dyn VideoSource>,
    status: Arc<StatusRegistry>,
    extractor: FrameExtractor,
    cancel_flags: CancelFlags,
}

impl ExtractionJobs {
    pub fn new(
        store: Arc<dyn FrameStore>,
        source: Arc<dyn VideoSource>,
        status: Arc<StatusRegistry>,
        extractor: FrameExtractor,
    ) -> Self {
        Self {
            store,
            source,
            status,
            extractor,
            cancel_flags: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn status(&self) -> &Arc<StatusRegistry> {
        &self.status
    }

    /// Start extracting `video_path` into `output_dir` without blocking the caller.
    ///
    /// Fails with [`JobError::AlreadyRunning`] while another job for the same video is
    /// in flight, and with [`JobError::NoRuntime`] outside a tokio runtime. Neither
    /// failure touches the video's status.
    pub fn spawn(
        &self,
        video_id: i64,
        video_path: PathBuf,
        output_dir: PathBuf,
    ) -> Result<ExtractionHandle, JobError> {
        let runtime = Handle::try_current().map_err(|_| JobError::NoRuntime)?;
        self.status.begin(video_id)?;

        let cancel_flag = Arc::new(AtomicBool::new(false));
        lock_flags(&self.cancel_flags).insert(video_id, cancel_flag.clone());

        let (tx, mut rx) = mpsc::unbounded_channel::<TaskUpdate>();

        let forwarder = {
            let status = self.status.clone();
            runtime.spawn(async move {
                while let Some(update) = rx.recv().await {
                    status.apply(video_id, &update);
                }
            })
        };

        let work = {
            let store = self.store.clone();
            let source = self.source.clone();
            let extractor = self.extractor.clone();
            let flag = cancel_flag.clone();
            runtime.spawn_blocking(move || {
                extractor.extract_cancellable(
                    source.as_ref(),
                    store.as_ref(),
                    video_id,
                    &video_path,
                    &output_dir,
                    Some(&tx),
                    &flag,
                )
            })
        };

        let status = self.status.clone();
        let flags = self.cancel_flags.clone();
        let join = runtime.spawn(async move {
            let result = work.await;
            // The sender is gone once the blocking task ends, so this drains and stops.
            let _ = forwarder.await;

            let (update, outcome) = match result {
                Ok(Ok(summary)) if summary.cancelled => {
                    warn!(video_id, extracted = summary.frames_extracted, "Extraction cancelled");
                    (TaskUpdate::Cancelled, Ok(summary))
                }
                Ok(Ok(summary)) => {
                    info!(video_id, frames = summary.frames_extracted, "Extraction job finished");
                    (
                        TaskUpdate::Completed {
                            frames_extracted: summary.frames_extracted,
                        },
                        Ok(summary),
                    )
                }
                Ok(Err(e)) => {
                    let message = format!("{:#}", e);
                    error!(video_id, error = %message, "Extraction job failed");
                    (
                        TaskUpdate::Failed { error: message.clone() },
                        Err(JobError::Failed(message)),
                    )
                }
                Err(e) => {
                    let message = e.to_string();
                    error!(video_id, error = %message, "Extraction job panicked");
                    (
                        TaskUpdate::Failed { error: message.clone() },
                        Err(JobError::Panicked(message)),
                    )
                }
            };

            // Drop the flag before leaving `processing`, so a new job's flag is never removed.
            lock_flags(&flags).remove(&video_id);
            status.apply(video_id, &update);
            outcome
        });

        Ok(ExtractionHandle {
            video_id,
            cancel_flag,
            join,
        })
    }

    /// Request cancellation of the job for `video_id`. Returns false if none is running.
    pub fn cancel(&self, video_id: i64) -> bool {
        match lock_flags(&self.cancel_flags).get(&video_id) {
            Some(flag) => {
                flag.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, video_id: i64) -> bool {
        lock_flags(&self.cancel_flags).contains_key(&video_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewVideo, SqliteDb};
    use crate::status::ProcessingStatus;
    use crate::testing::{synthetic_clip, GatedSource};
    use crate::video::MemorySource;
    use tempfile::tempdir;

    fn setup(source: Arc<dyn VideoSource>) -> (ExtractionJobs, Arc<SqliteDb>, i64) {
        let db = Arc::new(SqliteDb::open_in_memory().unwrap());
        db.initialize().unwrap();
        let video_id = db
            .add_video(&NewVideo {
                filename: "clip".to_string(),
                original_name: "clip".to_string(),
                file_path: PathBuf::from("clip"),
                duration: 0.0,
                fps: 30.0,
            })
            .unwrap();
        let jobs = ExtractionJobs::new(
            db.clone(),
            source,
            Arc::new(StatusRegistry::new()),
            FrameExtractor::new(30, 90),
        );
        (jobs, db, video_id)
    }

    #[tokio::test]
    async fn test_job_completes_and_reports_frames() {
        let dir = tempdir().unwrap();
        let source = MemorySource::new();
        source.insert("clip", 30.0, synthetic_clip(300));
        let (jobs, db, id) = setup(Arc::new(source));

        let handle = jobs
            .spawn(id, PathBuf::from("clip"), dir.path().join("video_1"))
            .unwrap();
        assert_eq!(handle.video_id(), id);

        let summary = handle.wait().await.unwrap();
        assert_eq!(summary.frames_extracted, 10);
        assert_eq!(jobs.status().get(id), Some(ProcessingStatus::Completed { frames: 10 }));
        assert_eq!(db.get_video_frames(id).unwrap().len(), 10);
        assert!(!jobs.is_running(id));
    }

    #[tokio::test]
    async fn test_unopenable_video_completes_with_zero_frames() {
        let dir = tempdir().unwrap();
        let (jobs, _db, id) = setup(Arc::new(MemorySource::new()));

        let summary = jobs
            .spawn(id, PathBuf::from("nowhere"), dir.path().to_path_buf())
            .unwrap()
            .wait()
            .await
            .unwrap();

        assert_eq!(summary.frames_extracted, 0);
        assert_eq!(jobs.status().get(id), Some(ProcessingStatus::Completed { frames: 0 }));
    }

    #[tokio::test]
    async fn test_second_start_is_rejected_while_running() {
        let dir = tempdir().unwrap();
        let released = Arc::new(AtomicBool::new(false));
        let (jobs, _db, id) = setup(Arc::new(GatedSource { released: released.clone() }));

        let handle = jobs.spawn(id, PathBuf::from("clip"), dir.path().to_path_buf()).unwrap();
        let second = jobs.spawn(id, PathBuf::from("clip"), dir.path().to_path_buf());
        assert!(matches!(second, Err(JobError::AlreadyRunning(v)) if v == id));

        assert!(jobs.cancel(id));
        released.store(true, Ordering::SeqCst);
        handle.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_stops_job_and_records_error() {
        let dir = tempdir().unwrap();
        let released = Arc::new(AtomicBool::new(false));
        let (jobs, db, id) = setup(Arc::new(GatedSource { released: released.clone() }));

        let handle = jobs.spawn(id, PathBuf::from("clip"), dir.path().to_path_buf()).unwrap();
        assert!(jobs.is_running(id));
        handle.cancel();
        released.store(true, Ordering::SeqCst);

        let summary = handle.wait().await.unwrap();
        assert!(summary.cancelled);
        assert!(summary.frames_extracted <= 1);
        assert_eq!(
            jobs.status().get(id),
            Some(ProcessingStatus::Error { message: "extraction cancelled".to_string() })
        );
        assert_eq!(db.get_video(id).unwrap().unwrap().frames_extracted, summary.frames_extracted);
        assert!(!jobs.cancel(id));
    }

    #[tokio::test]
    async fn test_failure_is_reported_through_status() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"file").unwrap();

        let source = MemorySource::new();
        source.insert("clip", 30.0, synthetic_clip(30));
        let (jobs, _db, id) = setup(Arc::new(source));

        let result = jobs
            .spawn(id, PathBuf::from("clip"), blocker.join("frames"))
            .unwrap()
            .wait()
            .await;

        assert!(matches!(result, Err(JobError::Failed(_))));
        assert!(matches!(jobs.status().get(id), Some(ProcessingStatus::Error { .. })));
    }

    #[test]
    fn test_spawn_outside_runtime_leaves_status_untouched() {
        let dir = tempdir().unwrap();
        let source = MemorySource::new();
        source.insert("clip", 30.0, synthetic_clip(60));
        let (jobs, _db, id) = setup(Arc::new(source));

        let result = jobs.spawn(id, PathBuf::from("clip"), dir.path().to_path_buf());
        assert!(matches!(result, Err(JobError::NoRuntime)));
        assert_eq!(jobs.status().get(id), None);
        assert!(!jobs.is_running(id));

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let summary = runtime.block_on(async {
            jobs.spawn(id, PathBuf::from("clip"), dir.path().to_path_buf())
                .unwrap()
                .wait()
                .await
                .unwrap()
        });
        assert_eq!(summary.frames_extracted, 2);
        assert_eq!(jobs.status().get(id), Some(ProcessingStatus::Completed { frames: 2 }));
    }
}
