//! One search: match a query image against a video, cluster the hits into time
//! ranges and record the result in the search log.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::config::MatchingConfig;
use crate::db::FrameStore;
use crate::matcher::{Match, MatchMode, Matcher, MatcherSettings};
use crate::ranges::{cluster_time_ranges, TimeRange};

/// Per-search overrides. `None` falls back to the configured defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchOptions {
    pub mode: MatchMode,
    pub threshold: Option<f64>,
    pub max_gap: Option<f64>,
}

/// Stored (as JSON) and returned for every search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub video_id: i64,
    pub mode: MatchMode,
    pub threshold: f64,
    pub max_gap: f64,
    pub matches_found: usize,
    pub frames_evaluated: usize,
    pub time_ranges: Vec<TimeRange>,
    /// Best matches first, at most `top_matches` of them.
    pub detailed_matches: Vec<Match>,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub search_id: i64,
    pub results: SearchResults,
}

pub struct SearchService<'a> {
    store: &'a dyn FrameStore,
    settings: MatcherSettings,
    max_gap: f64,
    top_matches: usize,
}

impl<'a> SearchService<'a> {
    pub fn new(store: &'a dyn FrameStore, config: &MatchingConfig) -> Self {
        Self {
            store,
            settings: MatcherSettings::from_config(config),
            max_gap: config.max_gap,
            top_matches: config.top_matches,
        }
    }

    pub fn search(
        &self,
        query_path: &Path,
        video_id: i64,
        options: SearchOptions,
    ) -> Result<SearchOutcome> {
        let threshold = options
            .threshold
            .unwrap_or_else(|| self.settings.default_threshold(options.mode));
        let max_gap = options.max_gap.unwrap_or(self.max_gap);

        let matcher = Matcher::new(self.store, self.settings.clone());
        let outcome = matcher.find_matches(query_path, video_id, options.mode, threshold)?;

        // Ranges are built from every match, not just the ones kept for display.
        let time_ranges = cluster_time_ranges(&outcome.matches, max_gap);
        let matches_found = outcome.matches.len();
        let mut detailed_matches = outcome.matches;
        detailed_matches.truncate(self.top_matches);

        let results = SearchResults {
            video_id,
            mode: options.mode,
            threshold,
            max_gap,
            matches_found,
            frames_evaluated: outcome.frames_evaluated,
            time_ranges,
            detailed_matches,
        };

        let json = serde_json::to_string(&results).context("Failed to serialize search results")?;
        let search_id = self.store.save_search_record(query_path, &json)?;

        info!(
            search_id,
            video_id,
            matches = results.matches_found,
            ranges = results.time_ranges.len(),
            "Search recorded"
        );

        Ok(SearchOutcome { search_id, results })
    }
}
