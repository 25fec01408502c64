//! Store schema and seeding helpers.
//!
//! The agent never writes: these functions act on a raw `Connection`
//! before it is sealed with [`Database::from_connection`](crate::Database::from_connection).
//! They exist to build fixture stores for tests and local demos, and they
//! document the table layout ingestion is expected to produce.

use rusqlite::{params, Connection};

use scoptics_core::types::{Event, MatchMetadata, TrackingRecord};

use crate::error::StoreError;

/// Create the match_metadata, tracking and events tables.
pub fn create_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS match_metadata (
            match_id          TEXT PRIMARY KEY NOT NULL,
            competition_name  TEXT,
            home_team_name    TEXT,
            away_team_name    TEXT,
            pitch_length_m    REAL,
            pitch_width_m     REAL,
            extra_json        TEXT
        );

        CREATE TABLE IF NOT EXISTS tracking (
            match_id     TEXT NOT NULL,
            period       INTEGER NOT NULL,
            frame        INTEGER NOT NULL,
            timestamp    REAL NOT NULL,
            team_id      TEXT,
            player_id    TEXT,
            x            REAL NOT NULL,
            y            REAL NOT NULL,
            z            REAL,
            speed        REAL,
            orientation  REAL
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_tracking_key
            ON tracking(match_id, frame, COALESCE(player_id, ''));
        CREATE INDEX IF NOT EXISTS idx_tracking_match_frame
            ON tracking(match_id, frame);

        CREATE TABLE IF NOT EXISTS events (
            event_id          TEXT PRIMARY KEY NOT NULL,
            match_id          TEXT NOT NULL,
            event_type        TEXT NOT NULL,
            start_time        REAL NOT NULL,
            end_time          REAL NOT NULL,
            start_frame       INTEGER NOT NULL,
            end_frame         INTEGER NOT NULL,
            team_id           TEXT,
            players_involved  TEXT NOT NULL DEFAULT '[]',
            metadata_json     TEXT,
            CHECK (start_frame <= end_frame),
            CHECK (start_time <= end_time)
        );

        CREATE INDEX IF NOT EXISTS idx_events_match_start
            ON events(match_id, start_frame);
        ",
    )
    .map_err(|e| StoreError::Unavailable(format!("Failed to create schema: {}", e)))
}

pub fn insert_match(conn: &Connection, meta: &MatchMetadata) -> Result<(), StoreError> {
    let extra = if meta.extra.is_null() {
        None
    } else {
        Some(meta.extra.to_string())
    };
    conn.execute(
        "INSERT INTO match_metadata
            (match_id, competition_name, home_team_name, away_team_name,
             pitch_length_m, pitch_width_m, extra_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            meta.match_id,
            meta.competition_name,
            meta.home_team_name,
            meta.away_team_name,
            meta.pitch_length_m,
            meta.pitch_width_m,
            extra,
        ],
    )?;
    Ok(())
}

pub fn insert_event(conn: &Connection, event: &Event) -> Result<(), StoreError> {
    let players = serde_json::to_string(&event.players_involved)
        .map_err(|e| StoreError::Malformed(e.to_string()))?;
    let metadata = if event.metadata.is_null() {
        None
    } else {
        Some(event.metadata.to_string())
    };
    conn.execute(
        "INSERT INTO events
            (event_id, match_id, event_type, start_time, end_time,
             start_frame, end_frame, team_id, players_involved, metadata_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            event.event_id,
            event.match_id,
            event.event_type,
            event.start_time,
            event.end_time,
            event.start_frame,
            event.end_frame,
            event.team_id,
            players,
            metadata,
        ],
    )?;
    Ok(())
}

pub fn insert_tracking(conn: &Connection, record: &TrackingRecord) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO tracking
            (match_id, period, frame, timestamp, team_id, player_id,
             x, y, z, speed, orientation)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            record.match_id,
            record.period,
            record.frame,
            record.timestamp,
            record.team_id,
            record.player_id,
            record.x,
            record.y,
            record.z,
            record.speed,
            record.orientation,
        ],
    )?;
    Ok(())
}

// =============================================================================
// Sample values
// =============================================================================

/// A match between "Arsenal" (`team_home`) and "Chelsea" (`team_away`).
pub fn sample_match(match_id: &str) -> MatchMetadata {
    MatchMetadata {
        match_id: match_id.to_string(),
        competition_name: Some("Premier League".to_string()),
        home_team_name: Some("Arsenal".to_string()),
        away_team_name: Some("Chelsea".to_string()),
        pitch_length_m: Some(105.0),
        pitch_width_m: Some(68.0),
        extra: serde_json::json!({
            "home_team_id": "team_home",
            "away_team_id": "team_away",
        }),
    }
}

pub fn sample_event(
    event_id: &str,
    match_id: &str,
    event_type: &str,
    start_frame: i64,
    end_frame: i64,
) -> Event {
    Event {
        event_id: event_id.to_string(),
        match_id: match_id.to_string(),
        event_type: event_type.to_string(),
        start_time: start_frame as f64 / 25.0,
        end_time: end_frame as f64 / 25.0,
        start_frame,
        end_frame,
        team_id: Some("team_home".to_string()),
        players_involved: vec!["p7".to_string(), "p9".to_string()],
        metadata: serde_json::json!({ "source": "fixture" }),
    }
}

/// One tracking sample for `player_id` at `frame`, 25 frames per second.
pub fn sample_tracking(match_id: &str, frame: i64, player_id: &str) -> TrackingRecord {
    TrackingRecord {
        match_id: match_id.to_string(),
        period: if frame < 67_500 { 1 } else { 2 },
        frame,
        timestamp: frame as f64 / 25.0,
        team_id: Some("team_home".to_string()),
        player_id: Some(player_id.to_string()),
        x: 10.0 + frame as f64 * 0.01,
        y: 34.0,
        z: None,
        speed: Some(5.5),
        orientation: Some(90.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        create_schema(&conn).unwrap();
    }

    #[test]
    fn test_reversed_event_span_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        let bad = sample_event("E1", "match_1", "pass", 50, 10);
        assert!(insert_event(&conn, &bad).is_err());
    }

    #[test]
    fn test_duplicate_tracking_key_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        insert_tracking(&conn, &sample_tracking("match_1", 100, "p7")).unwrap();
        assert!(insert_tracking(&conn, &sample_tracking("match_1", 100, "p7")).is_err());
        insert_tracking(&conn, &sample_tracking("match_1", 100, "p9")).unwrap();
    }
}
