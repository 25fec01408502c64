use serde::{Deserialize, Serialize};

// =============================================================================
// Enums
// =============================================================================

/// The two data entities a retrieval can target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Frame-level positional records.
    Tracking,
    /// Derived tactical occurrences.
    Events,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Tracking => "tracking",
            EntityKind::Events => "events",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Store entities
// =============================================================================

/// Immutable per-match descriptor, written once at ingestion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchMetadata {
    pub match_id: String,
    pub competition_name: Option<String>,
    pub home_team_name: Option<String>,
    pub away_team_name: Option<String>,
    pub pitch_length_m: Option<f64>,
    pub pitch_width_m: Option<f64>,
    /// Free-form extension fields.
    #[serde(default)]
    pub extra: serde_json::Value,
}

impl MatchMetadata {
    /// Team names present on the descriptor, home first.
    pub fn team_names(&self) -> Vec<&str> {
        [&self.home_team_name, &self.away_team_name]
            .into_iter()
            .filter_map(|n| n.as_deref())
            .collect()
    }

    /// Short human label, e.g. "Arsenal vs Chelsea (match_42)".
    pub fn label(&self) -> String {
        match (&self.home_team_name, &self.away_team_name) {
            (Some(home), Some(away)) => format!("{} vs {} ({})", home, away, self.match_id),
            _ => self.match_id.clone(),
        }
    }
}

/// One tracking row: a (match, frame[, entity]) position sample.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub match_id: String,
    pub period: u8,
    pub frame: i64,
    /// Match clock in seconds.
    pub timestamp: f64,
    /// `None` together with `player_id == None` denotes the ball.
    pub team_id: Option<String>,
    pub player_id: Option<String>,
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
    pub speed: Option<f64>,
    pub orientation: Option<f64>,
}

/// One detected tactical occurrence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub match_id: String,
    pub event_type: String,
    pub start_time: f64,
    pub end_time: f64,
    pub start_frame: i64,
    pub end_frame: i64,
    pub team_id: Option<String>,
    #[serde(default)]
    pub players_involved: Vec<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Event {
    /// Whether the event's spans are well-ordered.
    pub fn is_well_formed(&self) -> bool {
        self.start_frame <= self.end_frame && self.start_time <= self.end_time
    }

    /// Number of frames spanned, inclusive.
    pub fn frame_span(&self) -> i64 {
        self.end_frame - self.start_frame + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_event() -> Event {
        Event {
            event_id: "E123".to_string(),
            match_id: "match_1".to_string(),
            event_type: "pass".to_string(),
            start_time: 12.0,
            end_time: 13.5,
            start_frame: 300,
            end_frame: 337,
            team_id: Some("team_a".to_string()),
            players_involved: vec!["p7".to_string(), "p9".to_string()],
            metadata: json!({ "outcome": "complete" }),
        }
    }

    #[test]
    fn test_entity_kind_serde() {
        assert_eq!(serde_json::to_string(&EntityKind::Events).unwrap(), "\"events\"");
        let kind: EntityKind = serde_json::from_str("\"tracking\"").unwrap();
        assert_eq!(kind, EntityKind::Tracking);
        assert_eq!(EntityKind::Tracking.to_string(), "tracking");
    }

    #[test]
    fn test_event_spans() {
        let event = sample_event();
        assert!(event.is_well_formed());
        assert_eq!(event.frame_span(), 38);

        let mut reversed = sample_event();
        reversed.end_frame = 10;
        assert!(!reversed.is_well_formed());
    }

    #[test]
    fn test_event_deserialize_defaults() {
        let event: Event = serde_json::from_value(json!({
            "event_id": "E1",
            "match_id": "m",
            "event_type": "shot",
            "start_time": 1.0,
            "end_time": 2.0,
            "start_frame": 25,
            "end_frame": 50,
            "team_id": null
        }))
        .unwrap();
        assert!(event.players_involved.is_empty());
        assert!(event.metadata.is_null());
    }

    #[test]
    fn test_match_label_and_teams() {
        let meta = MatchMetadata {
            match_id: "match_42".to_string(),
            competition_name: Some("League".to_string()),
            home_team_name: Some("Arsenal".to_string()),
            away_team_name: Some("Chelsea".to_string()),
            pitch_length_m: Some(105.0),
            pitch_width_m: Some(68.0),
            extra: serde_json::Value::Null,
        };
        assert_eq!(meta.label(), "Arsenal vs Chelsea (match_42)");
        assert_eq!(meta.team_names(), vec!["Arsenal", "Chelsea"]);

        let bare = MatchMetadata {
            home_team_name: None,
            ..meta
        };
        assert_eq!(bare.label(), "match_42");
        assert_eq!(bare.team_names(), vec!["Chelsea"]);
    }
}
