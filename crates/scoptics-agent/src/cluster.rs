//! Grouping tracking rows into continuous frame segments.

use serde::Serialize;

use scoptics_core::types::TrackingRecord;
use scoptics_storage::Record;

/// Default largest frame gap inside one segment.
pub const DEFAULT_MAX_FRAME_GAP: i64 = 10;

/// A run of tracking frames with no gap wider than the configured maximum.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameCluster {
    pub match_id: String,
    pub start_frame: i64,
    pub end_frame: i64,
    pub start_time: f64,
    pub end_time: f64,
    /// Distinct frames in the segment.
    pub frame_count: usize,
}

/// The parts of a row clustering looks at.
struct FramePoint<'a> {
    match_id: &'a str,
    frame: i64,
    time: f64,
}

impl FrameCluster {
    fn open(point: &FramePoint<'_>) -> Self {
        Self {
            match_id: point.match_id.to_string(),
            start_frame: point.frame,
            end_frame: point.frame,
            start_time: point.time,
            end_time: point.time,
            frame_count: 1,
        }
    }

    fn extend(&mut self, point: &FramePoint<'_>) {
        if point.frame != self.end_frame {
            self.frame_count += 1;
        }
        self.end_frame = point.frame;
        self.end_time = self.end_time.max(point.time);
    }
}

/// Group `records` into segments.
///
/// Rows are ordered by match and frame first. A new segment starts when the
/// match changes or the gap to the previous frame exceeds `max_frame_gap`.
/// Several rows on one frame (one per player) count once.
pub fn cluster_frames(records: &[TrackingRecord], max_frame_gap: i64) -> Vec<FrameCluster> {
    let points = records
        .iter()
        .map(|r| FramePoint {
            match_id: &r.match_id,
            frame: r.frame,
            time: r.timestamp,
        })
        .collect();
    cluster_points(points, max_frame_gap)
}

/// Group dynamic query rows that carry integer `frame` and numeric
/// `timestamp` columns.
///
/// Rows without a `match_id` column belong to `match_id`. Rows missing
/// either column are left out; `None` means no row had both.
pub fn cluster_records(
    records: &[Record],
    match_id: &str,
    max_frame_gap: i64,
) -> Option<Vec<FrameCluster>> {
    let points: Vec<FramePoint<'_>> = records
        .iter()
        .filter_map(|r| {
            Some(FramePoint {
                match_id: r.get("match_id").and_then(|v| v.as_str()).unwrap_or(match_id),
                frame: r.get("frame")?.as_i64()?,
                time: r.get("timestamp")?.as_f64()?,
            })
        })
        .collect();
    if points.is_empty() {
        return None;
    }
    Some(cluster_points(points, max_frame_gap))
}

fn cluster_points(mut points: Vec<FramePoint<'_>>, max_frame_gap: i64) -> Vec<FrameCluster> {
    points.sort_by(|a, b| a.match_id.cmp(b.match_id).then(a.frame.cmp(&b.frame)));

    let mut clusters: Vec<FrameCluster> = Vec::new();
    for point in &points {
        match clusters.last_mut() {
            Some(current)
                if current.match_id == point.match_id
                    && point.frame - current.end_frame <= max_frame_gap =>
            {
                current.extend(point);
            }
            _ => clusters.push(FrameCluster::open(point)),
        }
    }
    clusters
}
