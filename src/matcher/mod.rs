//! Searching a video's frames for a query image.
//!
//! Two modes share one contract (query image, video id, threshold in; matches
//! sorted by score out):
//!
//! - [`MatchMode::Exhaustive`] scores every stored frame with all three metrics.
//!   Cost is linear in the number of frames; the work is spread over a rayon pool.
//! - [`MatchMode::Fast`] is an approximate mode. It scores every `fast_step`-th
//!   frame in storage order, at most `fast_limit` of them, by color alone. With the
//!   defaults (5 and 50) videos with more than 250 sampled frames are only searched
//!   in their first part, and matches between the sampled frames are missed. Its
//!   template/structural figures are estimates flagged with `approximate`.
//!
//! Frames whose image file is gone are skipped. An unreadable query scores 0.0
//! against everything, which leaves the match list empty for any positive threshold.
//! No deduplication happens here; a static shot yields one match per frame and
//! is collapsed later by range clustering.

use anyhow::Result;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::MatchingConfig;
use crate::db::{FrameRecord, FrameStore};
use crate::ranges::Timestamped;
use crate::similarity::{self, PreparedImage, Scores};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    Exhaustive,
    Fast,
}

impl MatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMode::Exhaustive => "exhaustive",
            MatchMode::Fast => "fast",
        }
    }
}

/// One frame that scored above the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub frame_id: i64,
    pub frame_number: u64,
    pub timestamp: f64,
    /// Combined score used for ranking.
    pub similarity_score: f64,
    pub color_similarity: f64,
    pub template_similarity: f64,
    pub structural_similarity: f64,
    pub frame_path: PathBuf,
    /// Template and structural figures are estimates derived from color, not measurements.
    pub approximate: bool,
}

impl Match {
    fn new(frame: &FrameRecord, score: f64, scores: Scores, approximate: bool) -> Self {
        Self {
            frame_id: frame.id,
            frame_number: frame.frame_number,
            timestamp: frame.timestamp,
            similarity_score: score,
            color_similarity: scores.color,
            template_similarity: scores.template,
            structural_similarity: scores.structural,
            frame_path: frame.frame_path.clone(),
            approximate,
        }
    }
}

impl Timestamped for Match {
    fn timestamp(&self) -> f64 {
        self.timestamp
    }
}

#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    /// Sorted by `similarity_score` descending; ties keep storage order.
    pub matches: Vec<Match>,
    pub corpus_size: usize,
    /// Frames actually scored.
    pub frames_evaluated: usize,
    /// Frames skipped because their image file is missing.
    pub frames_missing: usize,
}

#[derive(Debug, Clone)]
pub struct MatcherSettings {
    pub threshold: f64,
    pub fast_threshold: f64,
    pub fast_step: usize,
    pub fast_limit: usize,
    /// 0 uses rayon's global pool.
    pub workers: usize,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self::from_config(&MatchingConfig::default())
    }
}

impl MatcherSettings {
    pub fn from_config(config: &MatchingConfig) -> Self {
        Self {
            threshold: config.threshold,
            fast_threshold: config.fast_threshold,
            fast_step: config.fast_step.max(1),
            fast_limit: config.fast_limit,
            workers: config.workers,
        }
    }

    pub fn default_threshold(&self, mode: MatchMode) -> f64 {
        match mode {
            MatchMode::Exhaustive => self.threshold,
            MatchMode::Fast => self.fast_threshold,
        }
    }
}

enum Evaluation {
    Missing,
    Scored(Option<Match>),
}

pub struct Matcher<'a> {
    store: &'a dyn FrameStore,
    settings: MatcherSettings,
}

impl<'a> Matcher<'a> {
    pub fn new(store: &'a dyn FrameStore, settings: MatcherSettings) -> Self {
        Self { store, settings }
    }

    /// Match with the mode's configured default threshold.
    pub fn find(&self, query_path: &Path, video_id: i64, mode: MatchMode) -> Result<MatchOutcome> {
        let threshold = self.settings.default_threshold(mode);
        self.find_matches(query_path, video_id, mode, threshold)
    }

    pub fn find_matches(
        &self,
        query_path: &Path,
        video_id: i64,
        mode: MatchMode,
        threshold: f64,
    ) -> Result<MatchOutcome> {
        let frames = self.store.get_video_frames(video_id)?;
        if frames.is_empty() {
            return Ok(MatchOutcome::default());
        }

        let query = PreparedImage::load(query_path);
        if query.is_none() {
            warn!(path = %query_path.display(), "Query image could not be decoded, every frame scores 0");
        }

        let outcome = match mode {
            MatchMode::Exhaustive => self.exhaustive(query.as_ref(), &frames, threshold)?,
            MatchMode::Fast => self.fast(query.as_ref(), &frames, threshold),
        };

        info!(
            video_id,
            mode = mode.as_str(),
            corpus = outcome.corpus_size,
            evaluated = outcome.frames_evaluated,
            missing = outcome.frames_missing,
            matches = outcome.matches.len(),
            "Matching complete"
        );

        Ok(outcome)
    }

    fn exhaustive(
        &self,
        query: Option<&PreparedImage>,
        frames: &[FrameRecord],
        threshold: f64,
    ) -> Result<MatchOutcome> {
        debug!(frames = frames.len(), "Comparing query with every frame");

        let evaluate = |frame: &FrameRecord| -> Evaluation {
            if !frame.frame_path.exists() {
                return Evaluation::Missing;
            }
            let scores = match (query, PreparedImage::load(&frame.frame_path)) {
                (Some(q), Some(candidate)) => q.compare(&candidate),
                _ => Scores::ZERO,
            };
            let combined = scores.combined();
            Evaluation::Scored((combined > threshold).then(|| Match::new(frame, combined, scores, false)))
        };

        // Indexed parallel iterators collect in input order.
        let evaluations: Vec<Evaluation> = if self.settings.workers > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.settings.workers)
                .build()?;
            pool.install(|| frames.par_iter().map(evaluate).collect())
        } else {
            frames.par_iter().map(evaluate).collect()
        };

        Ok(collect_outcome(frames.len(), evaluations))
    }

    fn fast(
        &self,
        query: Option<&PreparedImage>,
        frames: &[FrameRecord],
        threshold: f64,
    ) -> MatchOutcome {
        let sampled: Vec<&FrameRecord> = frames
            .iter()
            .step_by(self.settings.fast_step)
            .take(self.settings.fast_limit)
            .collect();

        debug!(checking = sampled.len(), corpus = frames.len(), "Fast matching on sampled frames");

        let evaluations = sampled
            .into_iter()
            .map(|frame| {
                if !frame.frame_path.exists() {
                    return Evaluation::Missing;
                }
                let color = match (query, similarity::load_histogram(&frame.frame_path)) {
                    (Some(q), Some(candidate)) => q.histogram().correlation(&candidate),
                    _ => 0.0,
                };
                Evaluation::Scored((color > threshold).then(|| {
                    Match::new(frame, color, Scores::estimated_from_color(color), true)
                }))
            })
            .collect();

        collect_outcome(frames.len(), evaluations)
    }
}

fn collect_outcome(corpus_size: usize, evaluations: Vec<Evaluation>) -> MatchOutcome {
    let mut outcome = MatchOutcome {
        corpus_size,
        ..Default::default()
    };

    for evaluation in evaluations {
        match evaluation {
            Evaluation::Missing => outcome.frames_missing += 1,
            Evaluation::Scored(found) => {
                outcome.frames_evaluated += 1;
                outcome.matches.extend(found);
            }
        }
    }

    // Stable: equal scores keep storage order.
    outcome
        .matches
        .sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
    outcome
}
