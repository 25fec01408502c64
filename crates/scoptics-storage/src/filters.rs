//! Filters accepted by the data store and the shape of a capped fetch.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Inclusive `[start, end]` range.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Window<T> {
    pub start: T,
    pub end: T,
}

impl<T: PartialOrd + Copy> Window<T> {
    pub fn new(start: T, end: T) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, value: T) -> bool {
        self.start <= value && value <= self.end
    }

    fn is_ordered(&self) -> bool {
        self.start <= self.end
    }
}

/// Row order of a tracking fetch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingOrder {
    /// Period, then frame.
    #[default]
    Frame,
    /// Fastest sample first; rows without a speed go last.
    SpeedDesc,
    /// Slowest sample first; rows without a speed go last.
    SpeedAsc,
}

impl TrackingOrder {
    pub fn is_by_speed(&self) -> bool {
        !matches!(self, TrackingOrder::Frame)
    }
}

/// Optional constraints applied to an events or tracking fetch.
///
/// For events, windows match any event overlapping the window and the
/// player filter matches events whose `players_involved` contains the id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryFilters {
    pub frame_window: Option<Window<i64>>,
    /// Match clock seconds.
    pub time_window: Option<Window<f64>>,
    pub period: Option<u8>,
    pub team_id: Option<String>,
    pub player_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub event_types: Vec<String>,
    pub event_id: Option<String>,
    /// Requested row count; never raises the store's cap.
    pub limit: Option<usize>,
    /// Tracking only; an events fetch with a speed order is invalid.
    pub order: TrackingOrder,
}

impl QueryFilters {
    /// Check window ordering and limit.
    pub fn validate(&self) -> Result<(), StoreError> {
        if let Some(w) = &self.frame_window {
            if !w.is_ordered() {
                return Err(StoreError::InvalidFilter(format!(
                    "frame window start {} is after end {}",
                    w.start, w.end
                )));
            }
        }
        if let Some(w) = &self.time_window {
            if w.start.is_nan() || w.end.is_nan() || !w.is_ordered() {
                return Err(StoreError::InvalidFilter(format!(
                    "time window start {} is after end {}",
                    w.start, w.end
                )));
            }
        }
        if self.limit == Some(0) {
            return Err(StoreError::InvalidFilter(
                "limit must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Rows returned by a capped fetch.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Fetched<T> {
    pub rows: Vec<T>,
    /// More rows matched than the store cap allows.
    pub truncated: bool,
}

impl<T> Fetched<T> {
    pub fn empty() -> Self {
        Self {
            rows: Vec::new(),
            truncated: false,
        }
    }
}
