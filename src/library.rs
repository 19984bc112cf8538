//! The video library: ingestion, background extraction, search and lookups wired
//! together over one frame store.

use anyhow::{bail, Context, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;
use crate::db::{FrameRecord, FrameStore, NewVideo, SearchRecord, SqliteDb, VideoRecord};
use crate::extractor::FrameExtractor;
use crate::search::{SearchOptions, SearchOutcome, SearchService};
use crate::status::{ProcessingStatus, StatusRegistry};
use crate::tasks::{ExtractionHandle, ExtractionJobs};
use crate::video::{self, AutoSource, StreamInfo, VideoSource};

pub struct Ingested {
    pub video_id: i64,
    pub info: StreamInfo,
    pub job: ExtractionHandle,
}

pub struct Library {
    config: Config,
    store: Arc<dyn FrameStore>,
    source: Arc<dyn VideoSource>,
    jobs: ExtractionJobs,
}

impl Library {
    /// Open the SQLite store named in `config`, decoding through [`AutoSource`].
    pub fn open(config: Config) -> Result<Self> {
        let db = SqliteDb::open(config.db_path())
            .with_context(|| format!("Failed to open database {}", config.db_path().display()))?;
        db.initialize()?;
        let source = AutoSource::new(config.extraction.sequence_fps);
        Ok(Self::with_parts(config, Arc::new(db), Arc::new(source)))
    }

    pub fn with_parts(
        config: Config,
        store: Arc<dyn FrameStore>,
        source: Arc<dyn VideoSource>,
    ) -> Self {
        let jobs = ExtractionJobs::new(
            store.clone(),
            source.clone(),
            Arc::new(StatusRegistry::new()),
            FrameExtractor::from_config(&config.extraction),
        );
        Self {
            config,
            store,
            source,
            jobs,
        }
    }

    /// Stream properties of a video. The error names the decoder's reason, such as a
    /// container format that needs the `ffmpeg` feature.
    pub fn probe(&self, path: &Path) -> Result<StreamInfo> {
        video::probe(self.source.as_ref(), path)
            .with_context(|| format!("could not read video {}", path.display()))
    }

    pub fn frame_at(&self, path: &Path, timestamp: f64) -> Option<RgbImage> {
        video::extract_single_frame(self.source.as_ref(), path, timestamp)
    }

    /// Register a video and start extracting its frames in the background.
    ///
    /// Returns as soon as the job is started; poll [`Library::status`] or await the
    /// returned handle. Must be called within a tokio runtime.
    pub fn ingest_video(&self, path: &Path) -> Result<Ingested> {
        let info = self.probe(path)?;

        let original_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());

        let (filename, stored_path) = self.store_video_file(path, &original_name)?;

        let video_id = self.store.add_video(&NewVideo {
            filename,
            original_name,
            file_path: stored_path.clone(),
            duration: info.duration(),
            fps: info.fps,
        })?;

        let output_dir = self.config.frames_dir_for(video_id);
        let job = self.jobs.spawn(video_id, stored_path, output_dir)?;

        info!(video_id, fps = info.fps, duration = info.duration(), "Video ingested");
        Ok(Ingested { video_id, info, job })
    }

    /// Copy the file into the videos directory under a unique name, if configured.
    /// Image-sequence directories are always used in place.
    fn store_video_file(&self, path: &Path, original_name: &str) -> Result<(String, PathBuf)> {
        if !self.config.storage.copy_videos || path.is_dir() {
            debug!(path = %path.display(), "Using video in place");
            return Ok((original_name.to_string(), path.to_path_buf()));
        }

        let filename = format!("{}_{}", Uuid::new_v4().simple(), original_name);
        let videos_dir = &self.config.storage.videos_dir;
        std::fs::create_dir_all(videos_dir)
            .with_context(|| format!("Failed to create {}", videos_dir.display()))?;

        let dest = videos_dir.join(&filename);
        std::fs::copy(path, &dest)
            .with_context(|| format!("Failed to copy {} to {}", path.display(), dest.display()))?;
        Ok((filename, dest))
    }

    pub fn search(
        &self,
        query_path: &Path,
        video_id: i64,
        options: SearchOptions,
    ) -> Result<SearchOutcome> {
        if self.store.get_video(video_id)?.is_none() {
            bail!("video {} not found", video_id);
        }
        SearchService::new(self.store.as_ref(), &self.config.matching).search(
            query_path,
            video_id,
            options,
        )
    }

    pub fn status(&self, video_id: i64) -> Option<ProcessingStatus> {
        self.jobs.status().get(video_id)
    }

    pub fn cancel_extraction(&self, video_id: i64) -> bool {
        self.jobs.cancel(video_id)
    }

    pub fn video(&self, video_id: i64) -> Result<Option<VideoRecord>> {
        self.store.get_video(video_id)
    }

    pub fn videos(&self) -> Result<Vec<VideoRecord>> {
        self.store.get_all_videos()
    }

    pub fn frames(&self, video_id: i64) -> Result<Vec<FrameRecord>> {
        self.store.get_video_frames(video_id)
    }

    pub fn history(&self, limit: usize) -> Result<Vec<SearchRecord>> {
        self.store.recent_searches(limit)
    }
}
