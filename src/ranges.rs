//! Collapsing matched frame timestamps into contiguous time ranges.

use serde::{Deserialize, Serialize};

/// Default gap tolerance in seconds.
pub const DEFAULT_MAX_GAP: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_time: f64,
    pub end_time: f64,
    pub start_formatted: String,
    pub end_formatted: String,
    pub duration: f64,
}

impl TimeRange {
    fn new(start: f64, end: f64) -> Self {
        Self {
            start_time: start,
            end_time: end,
            start_formatted: format_timestamp(start),
            end_formatted: format_timestamp(end),
            duration: end - start,
        }
    }

    pub fn contains(&self, timestamp: f64) -> bool {
        timestamp >= self.start_time && timestamp <= self.end_time
    }
}

/// Anything carrying a position in the video, in seconds.
pub trait Timestamped {
    fn timestamp(&self) -> f64;
}

impl Timestamped for f64 {
    fn timestamp(&self) -> f64 {
        *self
    }
}

/// `mm:ss`, minutes not wrapped at 60.
pub fn format_timestamp(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let minutes = (seconds / 60.0).floor() as u64;
    let secs = (seconds % 60.0).floor() as u64;
    format!("{:02}:{:02}", minutes, secs)
}

/// Merge timestamps into chronological ranges.
///
/// Input order does not matter; timestamps are sorted first. A timestamp within
/// `max_gap` seconds of the current range's end extends it, otherwise it opens a new
/// range. Single-point ranges (duration 0) are kept.
pub fn cluster_time_ranges<T: Timestamped>(matches: &[T], max_gap: f64) -> Vec<TimeRange> {
    let mut timestamps: Vec<f64> = matches
        .iter()
        .map(|m| m.timestamp())
        .filter(|t| t.is_finite())
        .collect();
    timestamps.sort_by(|a, b| a.total_cmp(b));

    let Some((&first, rest)) = timestamps.split_first() else {
        return Vec::new();
    };

    let mut ranges = Vec::new();
    let mut start = first;
    let mut end = first;

    for &timestamp in rest {
        if timestamp - end <= max_gap {
            end = timestamp;
        } else {
            ranges.push(TimeRange::new(start, end));
            start = timestamp;
            end = timestamp;
        }
    }
    ranges.push(TimeRange::new(start, end));

    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(ranges: &[TimeRange]) -> Vec<(f64, f64)> {
        ranges.iter().map(|r| (r.start_time, r.end_time)).collect()
    }

    #[test]
    fn test_gap_splits_ranges() {
        let ranges = cluster_time_ranges(&[1.0, 2.0, 8.0], 5.0);
        assert_eq!(bounds(&ranges), vec![(1.0, 2.0), (8.0, 8.0)]);
        assert_eq!(ranges[0].duration, 1.0);
        assert_eq!(ranges[1].duration, 0.0);
    }

    #[test]
    fn test_empty_input() {
        let ranges = cluster_time_ranges::<f64>(&[], 5.0);
        assert!(ranges.is_empty());
    }

    #[test]
    fn test_unsorted_input_is_sorted_first() {
        // Score order, not time order.
        let ranges = cluster_time_ranges(&[8.0, 1.0, 20.0, 2.0, 9.5], 5.0);
        assert_eq!(bounds(&ranges), vec![(1.0, 2.0), (8.0, 9.5), (20.0, 20.0)]);
    }

    #[test]
    fn test_gap_equal_to_max_merges() {
        let ranges = cluster_time_ranges(&[0.0, 5.0, 10.0], 5.0);
        assert_eq!(bounds(&ranges), vec![(0.0, 10.0)]);
    }

    #[test]
    fn test_ranges_cover_every_timestamp_once() {
        let input = [3.0, 0.0, 14.0, 7.5, 7.0, 30.0, 31.0, 45.5, 12.0];
        for max_gap in [0.0, 1.0, 2.5, 5.0, 100.0] {
            let ranges = cluster_time_ranges(&input, max_gap);

            for pair in ranges.windows(2) {
                assert!(pair[0].end_time < pair[1].start_time);
            }
            for t in input {
                assert_eq!(ranges.iter().filter(|r| r.contains(t)).count(), 1);
            }
        }
    }

    #[test]
    fn test_larger_gap_never_adds_ranges() {
        let input = [0.0, 1.0, 4.0, 9.0, 10.0, 18.0, 40.0];
        let mut previous = usize::MAX;
        for max_gap in [0.0, 0.5, 1.0, 3.0, 5.0, 8.0, 22.0, 50.0] {
            let count = cluster_time_ranges(&input, max_gap).len();
            assert!(count <= previous);
            previous = count;
        }
        assert_eq!(previous, 1);
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "00:00");
        assert_eq!(format_timestamp(65.9), "01:05");
        assert_eq!(format_timestamp(600.0), "10:00");
        assert_eq!(format_timestamp(3725.0), "62:05");
    }
}
