use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub extraction: ExtractionConfig,

    #[serde(default)]
    pub matching: MatchingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Where ingested video files are copied to.
    #[serde(default = "default_videos_dir")]
    pub videos_dir: PathBuf,

    /// Root directory for extracted frame images (one subdirectory per video).
    #[serde(default = "default_frames_dir")]
    pub frames_dir: PathBuf,

    /// Copy video files into `videos_dir` on ingestion instead of referencing them in place.
    #[serde(default = "default_copy_videos")]
    pub copy_videos: bool,
}

fn default_videos_dir() -> PathBuf {
    data_root().join("videos")
}

fn default_frames_dir() -> PathBuf {
    data_root().join("frames")
}

fn default_copy_videos() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            videos_dir: default_videos_dir(),
            frames_dir: default_frames_dir(),
            copy_videos: default_copy_videos(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Raw frame-index stride. 30 is roughly one frame per second for a 30fps source,
    /// but the stride is applied to frame indices, not to time.
    #[serde(default = "default_stride")]
    pub stride: u64,

    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Frame rate assumed when a directory of images is ingested as a video.
    #[serde(default = "default_sequence_fps")]
    pub sequence_fps: f64,
}

fn default_stride() -> u64 {
    30
}

fn default_jpeg_quality() -> u8 {
    90
}

fn default_sequence_fps() -> f64 {
    30.0
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            stride: default_stride(),
            jpeg_quality: default_jpeg_quality(),
            sequence_fps: default_sequence_fps(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Minimum combined score for exhaustive searches.
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Minimum color score for fast searches (lower to compensate for the coarser metric).
    #[serde(default = "default_fast_threshold")]
    pub fast_threshold: f64,

    #[serde(default = "default_fast_step")]
    pub fast_step: usize,

    #[serde(default = "default_fast_limit")]
    pub fast_limit: usize,

    /// Maximum gap in seconds between matches that still belong to one time range.
    #[serde(default = "default_max_gap")]
    pub max_gap: f64,

    /// Number of top matches kept in a persisted search record.
    #[serde(default = "default_top_matches")]
    pub top_matches: usize,

    /// Worker threads for exhaustive matching (0 = rayon's global pool).
    #[serde(default)]
    pub workers: usize,
}

fn default_threshold() -> f64 {
    0.3
}

fn default_fast_threshold() -> f64 {
    0.2
}

fn default_fast_step() -> usize {
    5
}

fn default_fast_limit() -> usize {
    50
}

fn default_max_gap() -> f64 {
    5.0
}

fn default_top_matches() -> usize {
    10
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            fast_threshold: default_fast_threshold(),
            fast_step: default_fast_step(),
            fast_limit: default_fast_limit(),
            max_gap: default_max_gap(),
            top_matches: default_top_matches(),
            workers: 0,
        }
    }
}

fn data_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("framefinder")
}

fn default_db_path() -> PathBuf {
    data_root().join("framefinder.db")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            storage: StorageConfig::default(),
            extraction: ExtractionConfig::default(),
            matching: MatchingConfig::default(),
        }
    }
}

impl Config {
    /// Load from `FRAMEFINDER_CONFIG` or the default location, writing defaults if absent.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    pub fn db_path(&self) -> &PathBuf {
        &self.db_path
    }

    /// Directory holding the extracted frames of one video.
    pub fn frames_dir_for(&self, video_id: i64) -> PathBuf {
        self.storage.frames_dir.join(format!("video_{}", video_id))
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("framefinder")
    }

    fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("FRAMEFINDER_CONFIG") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }
}
