//! Read-only gateway to tracking records, events and match metadata.
//!
//! [`DataStore`] is the seam the agent depends on; [`SqliteStore`] is the
//! production implementation over [`Database`].

use std::sync::Arc;

use rusqlite::types::{Type, ValueRef};
use rusqlite::{Row, Statement, ToSql};
use serde_json::Value;
use tracing::debug;

use scoptics_core::types::{Event, MatchMetadata, TrackingRecord};

use crate::db::Database;
use crate::error::StoreError;
use crate::filters::{Fetched, QueryFilters, TrackingOrder};
use crate::guard;

/// Default row cap for a single fetch.
pub const DEFAULT_MAX_ROWS: usize = 500;

/// One row of a dynamic query, keyed by column name.
pub type Record = serde_json::Map<String, Value>;

/// Read-only access to the match data store.
///
/// Every fetch is scoped to one match; rows from other matches are never
/// returned. Implementations validate inputs and cap result size, setting
/// `truncated` instead of failing when more rows match.
pub trait DataStore: Send + Sync {
    fn fetch_events(&self, match_id: &str, filters: &QueryFilters)
        -> Result<Fetched<Event>, StoreError>;

    fn fetch_tracking(
        &self,
        match_id: &str,
        filters: &QueryFilters,
    ) -> Result<Fetched<TrackingRecord>, StoreError>;

    fn list_matches(&self) -> Result<Vec<MatchMetadata>, StoreError>;

    fn fetch_match(&self, match_id: &str) -> Result<Option<MatchMetadata>, StoreError>;

    /// Run a caller-written read over the match's tracking rows.
    ///
    /// `sql` sees a `tracking` table holding only `match_id`'s rows and may
    /// not reference any other table. The result is capped like a fetch.
    fn run_tracking_query(
        &self,
        match_id: &str,
        sql: &str,
        limit: Option<usize>,
    ) -> Result<Fetched<Record>, StoreError>;
}

/// Validate the arguments shared by both fetches.
pub fn validate_request(match_id: &str, filters: &QueryFilters) -> Result<(), StoreError> {
    if match_id.trim().is_empty() {
        return Err(StoreError::InvalidFilter("match_id must not be empty".to_string()));
    }
    filters.validate()
}

// =============================================================================
// SQL building
// =============================================================================

/// WHERE clauses with numbered placeholders and their bound values.
struct Conditions {
    clauses: Vec<String>,
    params: Vec<Box<dyn ToSql>>,
}

impl Conditions {
    fn for_match(column: &str, match_id: &str) -> Self {
        let mut conditions = Self {
            clauses: Vec::new(),
            params: Vec::new(),
        };
        let p = conditions.bind(match_id.to_string());
        conditions.clauses.push(format!("{} = {}", column, p));
        conditions
    }

    fn bind<V: ToSql + 'static>(&mut self, value: V) -> String {
        self.params.push(Box::new(value));
        format!("?{}", self.params.len())
    }

    fn push(&mut self, clause: String) {
        self.clauses.push(clause);
    }

    fn where_sql(&self) -> String {
        self.clauses.join(" AND ")
    }

    fn param_refs(&self) -> Vec<&dyn ToSql> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }
}

// =============================================================================
// SqliteStore
// =============================================================================

/// SQLite-backed [`DataStore`].
pub struct SqliteStore {
    db: Arc<Database>,
    max_rows: usize,
}

impl SqliteStore {
    pub fn new(db: Arc<Database>, max_rows: usize) -> Self {
        Self {
            db,
            max_rows: max_rows.max(1),
        }
    }

    pub fn max_rows(&self) -> usize {
        self.max_rows
    }

    /// Effective cap for a fetch and whether the caller asked for fewer rows
    /// than the store allows.
    fn cap_for(&self, limit: Option<usize>) -> (usize, bool) {
        match limit {
            Some(limit) if limit < self.max_rows => (limit, true),
            _ => (self.max_rows, false),
        }
    }

    fn capped<T>(mut rows: Vec<T>, cap: usize, caller_bounded: bool) -> Fetched<T> {
        let overflow = rows.len() > cap;
        rows.truncate(cap);
        Fetched {
            rows,
            truncated: overflow && !caller_bounded,
        }
    }
}

impl DataStore for SqliteStore {
    fn fetch_events(
        &self,
        match_id: &str,
        filters: &QueryFilters,
    ) -> Result<Fetched<Event>, StoreError> {
        validate_request(match_id, filters)?;
        if filters.order.is_by_speed() {
            return Err(StoreError::InvalidFilter(
                "events cannot be ordered by speed".to_string(),
            ));
        }
        let (cap, caller_bounded) = self.cap_for(filters.limit);

        let mut cond = Conditions::for_match("e.match_id", match_id);
        if let Some(id) = &filters.event_id {
            let p = cond.bind(id.clone());
            cond.push(format!("e.event_id = {}", p));
        }
        if let Some(w) = filters.frame_window {
            let lo = cond.bind(w.start);
            let hi = cond.bind(w.end);
            cond.push(format!("e.start_frame <= {} AND e.end_frame >= {}", hi, lo));
        }
        if let Some(w) = filters.time_window {
            let lo = cond.bind(w.start);
            let hi = cond.bind(w.end);
            cond.push(format!("e.start_time <= {} AND e.end_time >= {}", hi, lo));
        }
        if let Some(period) = filters.period {
            // Events carry no period; take it from the tracking frame the event starts on.
            let p = cond.bind(period);
            cond.push(format!(
                "EXISTS (SELECT 1 FROM tracking t WHERE t.match_id = e.match_id \
                 AND t.frame = e.start_frame AND t.period = {})",
                p
            ));
        }
        if let Some(team) = &filters.team_id {
            let p = cond.bind(team.clone());
            cond.push(format!("e.team_id = {}", p));
        }
        if let Some(player) = &filters.player_id {
            let p = cond.bind(player.clone());
            cond.push(format!(
                "EXISTS (SELECT 1 FROM json_each(e.players_involved) WHERE json_each.value = {})",
                p
            ));
        }
        if !filters.event_types.is_empty() {
            let placeholders: Vec<String> = filters
                .event_types
                .iter()
                .map(|t| cond.bind(t.clone()))
                .collect();
            cond.push(format!("e.event_type IN ({})", placeholders.join(", ")));
        }

        let sql = format!(
            "SELECT e.event_id, e.match_id, e.event_type, e.start_time, e.end_time,
                    e.start_frame, e.end_frame, e.team_id, e.players_involved, e.metadata_json
             FROM events e
             WHERE {}
             ORDER BY e.start_frame, e.event_id
             LIMIT {}",
            cond.where_sql(),
            cap + 1
        );

        let raw = self.db.query(&sql, &cond.param_refs(), map_event_row)?;
        let rows = raw
            .into_iter()
            .map(RawEvent::decode)
            .collect::<Result<Vec<_>, _>>()?;

        let fetched = Self::capped(rows, cap, caller_bounded);
        debug!(
            match_id = %match_id,
            rows = fetched.rows.len(),
            truncated = fetched.truncated,
            "Fetched events"
        );
        Ok(fetched)
    }

    fn fetch_tracking(
        &self,
        match_id: &str,
        filters: &QueryFilters,
    ) -> Result<Fetched<TrackingRecord>, StoreError> {
        validate_request(match_id, filters)?;
        let (cap, caller_bounded) = self.cap_for(filters.limit);

        let mut cond = Conditions::for_match("match_id", match_id);
        if let Some(w) = filters.frame_window {
            let lo = cond.bind(w.start);
            let hi = cond.bind(w.end);
            cond.push(format!("frame BETWEEN {} AND {}", lo, hi));
        }
        if let Some(w) = filters.time_window {
            let lo = cond.bind(w.start);
            let hi = cond.bind(w.end);
            cond.push(format!("timestamp BETWEEN {} AND {}", lo, hi));
        }
        if let Some(period) = filters.period {
            let p = cond.bind(period);
            cond.push(format!("period = {}", p));
        }
        if let Some(team) = &filters.team_id {
            let p = cond.bind(team.clone());
            cond.push(format!("team_id = {}", p));
        }
        if let Some(player) = &filters.player_id {
            let p = cond.bind(player.clone());
            cond.push(format!("player_id = {}", p));
        }

        let order_by = match filters.order {
            TrackingOrder::Frame => "period, frame, COALESCE(player_id, '')",
            TrackingOrder::SpeedDesc => {
                "speed IS NULL, speed DESC, period, frame, COALESCE(player_id, '')"
            }
            TrackingOrder::SpeedAsc => {
                "speed IS NULL, speed ASC, period, frame, COALESCE(player_id, '')"
            }
        };
        let sql = format!(
            "SELECT match_id, period, frame, timestamp, team_id, player_id,
                    x, y, z, speed, orientation
             FROM tracking
             WHERE {}
             ORDER BY {}
             LIMIT {}",
            cond.where_sql(),
            order_by,
            cap + 1
        );

        let rows = self.db.query(&sql, &cond.param_refs(), map_tracking_row)?;
        let fetched = Self::capped(rows, cap, caller_bounded);
        debug!(
            match_id = %match_id,
            rows = fetched.rows.len(),
            truncated = fetched.truncated,
            "Fetched tracking"
        );
        Ok(fetched)
    }

    fn list_matches(&self) -> Result<Vec<MatchMetadata>, StoreError> {
        let raw = self.db.query(
            "SELECT match_id, competition_name, home_team_name, away_team_name,
                    pitch_length_m, pitch_width_m, extra_json
             FROM match_metadata
             ORDER BY match_id",
            &[],
            map_match_row,
        )?;
        raw.into_iter().map(RawMatch::decode).collect()
    }

    fn fetch_match(&self, match_id: &str) -> Result<Option<MatchMetadata>, StoreError> {
        if match_id.trim().is_empty() {
            return Err(StoreError::InvalidFilter("match_id must not be empty".to_string()));
        }
        let id = match_id.to_string();
        let raw = self.db.query(
            "SELECT match_id, competition_name, home_team_name, away_team_name,
                    pitch_length_m, pitch_width_m, extra_json
             FROM match_metadata
             WHERE match_id = ?1",
            &[&id as &dyn ToSql],
            map_match_row,
        )?;
        raw.into_iter().next().map(RawMatch::decode).transpose()
    }

    fn run_tracking_query(
        &self,
        match_id: &str,
        sql: &str,
        limit: Option<usize>,
    ) -> Result<Fetched<Record>, StoreError> {
        let bounds = QueryFilters {
            limit,
            ..Default::default()
        };
        validate_request(match_id, &bounds)?;
        let body = guard::ensure_tracking_only(sql)?;
        let (cap, caller_bounded) = self.cap_for(limit);

        // The CTE shadows the table, so the caller's query only sees this match.
        let scoped = format!(
            "WITH tracking AS (SELECT * FROM main.tracking WHERE match_id = ?1)
             SELECT * FROM ({}) LIMIT {}",
            body,
            cap + 1
        );
        let id = match_id.to_string();
        let rows = self
            .db
            .query(&scoped, &[&id as &dyn ToSql], map_record_row)?;

        let fetched = Self::capped(rows, cap, caller_bounded);
        debug!(
            match_id = %match_id,
            rows = fetched.rows.len(),
            truncated = fetched.truncated,
            "Ran dynamic tracking query"
        );
        Ok(fetched)
    }
}

// =============================================================================
// Row mapping
// =============================================================================

/// Event row before its JSON columns are decoded.
struct RawEvent {
    event: Event,
    players_json: String,
    metadata_json: Option<String>,
}

impl RawEvent {
    fn decode(self) -> Result<Event, StoreError> {
        let mut event = self.event;
        event.players_involved = serde_json::from_str(&self.players_json).map_err(|e| {
            StoreError::Malformed(format!(
                "event {} players_involved: {}",
                event.event_id, e
            ))
        })?;
        event.metadata = decode_json_column(self.metadata_json.as_deref())
            .map_err(|e| StoreError::Malformed(format!("event {} metadata: {}", event.event_id, e)))?;
        if !event.is_well_formed() {
            return Err(StoreError::Malformed(format!(
                "event {} ends before it starts (frames {} to {})",
                event.event_id, event.start_frame, event.end_frame
            )));
        }
        Ok(event)
    }
}

fn map_event_row(row: &Row<'_>) -> rusqlite::Result<RawEvent> {
    Ok(RawEvent {
        event: Event {
            event_id: row.get(0)?,
            match_id: row.get(1)?,
            event_type: row.get(2)?,
            start_time: row.get(3)?,
            end_time: row.get(4)?,
            start_frame: row.get(5)?,
            end_frame: row.get(6)?,
            team_id: row.get(7)?,
            players_involved: Vec::new(),
            metadata: serde_json::Value::Null,
        },
        players_json: row.get(8)?,
        metadata_json: row.get(9)?,
    })
}

fn map_tracking_row(row: &Row<'_>) -> rusqlite::Result<TrackingRecord> {
    Ok(TrackingRecord {
        match_id: row.get(0)?,
        period: row.get(1)?,
        frame: row.get(2)?,
        timestamp: row.get(3)?,
        team_id: row.get(4)?,
        player_id: row.get(5)?,
        x: row.get(6)?,
        y: row.get(7)?,
        z: row.get(8)?,
        speed: row.get(9)?,
        orientation: row.get(10)?,
    })
}

fn map_record_row(row: &Row<'_>) -> rusqlite::Result<Record> {
    let stmt: &Statement<'_> = row.as_ref();
    let mut record = Record::new();
    for idx in 0..stmt.column_count() {
        let name = stmt.column_name(idx)?.to_string();
        let value = match row.get_ref(idx)? {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::from(i),
            ValueRef::Real(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(_) => return Err(rusqlite::Error::InvalidColumnType(idx, name, Type::Blob)),
        };
        record.insert(name, value);
    }
    Ok(record)
}

struct RawMatch {
    meta: MatchMetadata,
    extra_json: Option<String>,
}

impl RawMatch {
    fn decode(self) -> Result<MatchMetadata, StoreError> {
        let mut meta = self.meta;
        meta.extra = decode_json_column(self.extra_json.as_deref())
            .map_err(|e| StoreError::Malformed(format!("match {} extra: {}", meta.match_id, e)))?;
        Ok(meta)
    }
}

fn map_match_row(row: &Row<'_>) -> rusqlite::Result<RawMatch> {
    Ok(RawMatch {
        meta: MatchMetadata {
            match_id: row.get(0)?,
            competition_name: row.get(1)?,
            home_team_name: row.get(2)?,
            away_team_name: row.get(3)?,
            pitch_length_m: row.get(4)?,
            pitch_width_m: row.get(5)?,
            extra: serde_json::Value::Null,
        },
        extra_json: row.get(6)?,
    })
}

fn decode_json_column(text: Option<&str>) -> Result<serde_json::Value, serde_json::Error> {
    match text {
        None => Ok(serde_json::Value::Null),
        Some(s) if s.trim().is_empty() => Ok(serde_json::Value::Null),
        Some(s) => serde_json::from_str(s),
    }
}
