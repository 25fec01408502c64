//! Response composition.
//!
//! Builds the outbound payload from a reply phrase or fetched rows and
//! appends exactly one turn to the conversation. Summaries are
//! deterministic: the same rows always produce the same text.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use scoptics_core::types::{Event, TrackingRecord};
use scoptics_storage::{Record, StoreErrorKind, TrackingOrder};

use crate::catalog::MatchCatalog;
use crate::context::{ConversationState, Turn, TurnContext};
use crate::error::AgentError;
use crate::executor::{Outcome, RowSet, Rows};

/// Payload returned to the caller for one utterance.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AgentResponse {
    pub conversational_response: String,
    /// Always an array, possibly empty.
    pub data: Vec<serde_json::Value>,
    pub updated_history: ConversationState,
}

// =============================================================================
// ResponseComposer
// =============================================================================

pub struct ResponseComposer {
    catalog: Arc<MatchCatalog>,
    max_history_turns: usize,
}

impl ResponseComposer {
    pub fn new(catalog: Arc<MatchCatalog>, max_history_turns: usize) -> Self {
        Self {
            catalog,
            max_history_turns,
        }
    }

    /// Text-only reply: conversation, clarification or apology.
    pub fn reply(&self, state: &ConversationState, utterance: &str, text: &str) -> AgentResponse {
        self.finish(state, Turn::new(utterance, text), Vec::new())
    }

    /// Reply describing a retrieval outcome.
    pub fn retrieved(
        &self,
        state: &ConversationState,
        utterance: &str,
        mut context: TurnContext,
        outcome: &Outcome,
    ) -> AgentResponse {
        let (text, data) = match outcome {
            Outcome::Skipped => (String::new(), Vec::new()),
            Outcome::EventNotFound { match_id, event_id } => (
                format!(
                    "I couldn't find event {} in {}.",
                    event_id,
                    self.match_label(match_id)
                ),
                Vec::new(),
            ),
            Outcome::Rows(set) => {
                if let Rows::Events(events) = &set.rows {
                    if let [only] = events.as_slice() {
                        context.event_id = Some(only.event_id.clone());
                    }
                }
                let mut text = self.summarize(set, &context);
                if set.truncated {
                    text.push(' ');
                    text.push_str(&truncation_note(set.rows.len()));
                }
                (text, set.rows.to_values())
            }
        };

        let turn = Turn::new(utterance, text)
            .with_data(data.clone())
            .with_context(context);
        self.finish(state, turn, data)
    }

    /// Apologetic reply for a failed retrieval or classification.
    pub fn failure(
        &self,
        state: &ConversationState,
        utterance: &str,
        error: &AgentError,
    ) -> AgentResponse {
        self.reply(state, utterance, &apology(error))
    }

    fn finish(
        &self,
        state: &ConversationState,
        turn: Turn,
        data: Vec<serde_json::Value>,
    ) -> AgentResponse {
        AgentResponse {
            conversational_response: turn.assistant.clone(),
            data,
            updated_history: state.append_capped(turn, self.max_history_turns),
        }
    }

    fn match_label(&self, match_id: &str) -> String {
        self.catalog
            .get(match_id)
            .map(|m| m.label())
            .unwrap_or_else(|| match_id.to_string())
    }

    fn summarize(&self, set: &RowSet, context: &TurnContext) -> String {
        let label = self.match_label(&set.match_id);
        match &set.rows {
            Rows::Events(events) => summarize_events(events, &context.event_types, &label),
            Rows::Tracking(rows) => {
                let prefix = anchor_prefix(set.anchor.as_ref());
                if rows.is_empty() {
                    return format!("{}No tracking data matched in {}.", prefix, label);
                }
                let (first, last) = frame_bounds(rows.iter().map(|r| r.frame));
                let players = rows
                    .iter()
                    .filter_map(|r| r.player_id.as_deref())
                    .collect::<std::collections::BTreeSet<_>>()
                    .len();
                let mut text = format!(
                    "{}Found {} tracking {} in {} covering frames {} to {}{}.",
                    prefix,
                    rows.len(),
                    plural(rows.len(), "row", "rows"),
                    label,
                    first,
                    last,
                    if players > 0 {
                        format!(" for {} {}", players, plural(players, "player", "players"))
                    } else {
                        String::new()
                    }
                );
                if let Some(lead) = speed_lead(set.order, rows) {
                    text.push(' ');
                    text.push_str(&lead);
                }
                text
            }
            Rows::Records(records) => summarize_records(records, &label),
            Rows::Clusters(clusters) => {
                let prefix = anchor_prefix(set.anchor.as_ref());
                if clusters.is_empty() {
                    return format!("{}No tracking data matched in {}.", prefix, label);
                }
                let spans: Vec<String> = clusters
                    .iter()
                    .map(|c| {
                        format!(
                            "frames {} to {} ({} to {})",
                            c.start_frame,
                            c.end_frame,
                            format_clock(c.start_time),
                            format_clock(c.end_time)
                        )
                    })
                    .collect();
                format!(
                    "{}Found {} continuous {} in {}: {}.",
                    prefix,
                    clusters.len(),
                    plural(clusters.len(), "moment", "moments"),
                    label,
                    spans.join(", ")
                )
            }
        }
    }
}

fn summarize_events(events: &[Event], requested: &[String], label: &str) -> String {
    match events {
        [] => {
            if requested.is_empty() {
                format!("No events matched in {}.", label)
            } else {
                format!("No {} events matched in {}.", requested.join("/"), label)
            }
        }
        [event] => format!(
            "Found event {} ({}) in {}, frames {} to {} ({} to {}).",
            event.event_id,
            event.event_type,
            label,
            event.start_frame,
            event.end_frame,
            format_clock(event.start_time),
            format_clock(event.end_time)
        ),
        _ => {
            let mut by_type: BTreeMap<&str, usize> = BTreeMap::new();
            for event in events {
                *by_type.entry(event.event_type.as_str()).or_default() += 1;
            }
            let breakdown: Vec<String> = by_type
                .iter()
                .map(|(kind, count)| format!("{} {}", count, kind))
                .collect();
            let (first, last) = frame_bounds(events.iter().map(|e| e.start_frame));
            format!(
                "Found {} events in {} between frames {} and {}: {}.",
                events.len(),
                label,
                first,
                last,
                breakdown.join(", ")
            )
        }
    }
}

/// Names the top row of a speed-ordered fetch.
fn speed_lead(order: TrackingOrder, rows: &[TrackingRecord]) -> Option<String> {
    let heading = match order {
        TrackingOrder::Frame => return None,
        TrackingOrder::SpeedDesc => "Fastest",
        TrackingOrder::SpeedAsc => "Slowest",
    };
    let top = rows.first()?;
    let speed = top.speed?;
    Some(format!(
        "{}: {} at {:.1} m/s, frame {} ({}).",
        heading,
        top.player_id.as_deref().unwrap_or("the ball"),
        speed,
        top.frame,
        format_clock(top.timestamp)
    ))
}

fn summarize_records(records: &[Record], label: &str) -> String {
    let Some(first) = records.first() else {
        return format!("No tracking rows matched that query in {}.", label);
    };
    let columns: Vec<&str> = first.keys().map(String::as_str).collect();
    format!(
        "Found {} result {} in {} with columns {}.",
        records.len(),
        plural(records.len(), "row", "rows"),
        label,
        columns.join(", ")
    )
}

fn anchor_prefix(anchor: Option<&Event>) -> String {
    match anchor {
        Some(event) => format!(
            "During event {} ({}, frames {} to {}): ",
            event.event_id, event.event_type, event.start_frame, event.end_frame
        ),
        None => String::new(),
    }
}

fn truncation_note(shown: usize) -> String {
    format!(
        "Note: results were truncated to the first {} rows. Narrow the query by team, \
         player or time window to see the rest.",
        shown
    )
}

/// Apology text for a recovered failure.
pub fn apology(error: &AgentError) -> String {
    match error {
        AgentError::RetrievalFailed { kind, message } => match kind {
            StoreErrorKind::InvalidFilter => format!(
                "Sorry, I couldn't run that query: {}. Please check the time or frame range.",
                message
            ),
            StoreErrorKind::PermissionDenied => {
                "Sorry, that request is not permitted. I only have read access to match data."
                    .to_string()
            }
            StoreErrorKind::Timeout => {
                "Sorry, the data store took too long to answer. Please try again or narrow \
                 the query."
                    .to_string()
            }
            StoreErrorKind::Unavailable => {
                "Sorry, the match data is unavailable right now. Please try again shortly."
                    .to_string()
            }
            StoreErrorKind::Malformed => {
                "Sorry, some of the stored data for that query could not be read.".to_string()
            }
        },
        AgentError::PermissionDenied(_) => {
            "Sorry, that request is not permitted. I only have read access to match data."
                .to_string()
        }
        _ => "Sorry, I couldn't process that request right now.".to_string(),
    }
}

fn frame_bounds(frames: impl Iterator<Item = i64>) -> (i64, i64) {
    frames.fold((i64::MAX, i64::MIN), |(lo, hi), f| (lo.min(f), hi.max(f)))
}

/// Match clock as `mm:ss`.
fn format_clock(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

fn plural<'a>(n: usize, one: &'a str, many: &'a str) -> &'a str {
    if n == 1 {
        one
    } else {
        many
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scoptics_core::types::EntityKind;
    use scoptics_storage::fixture::{sample_event, sample_match, sample_tracking};

    use crate::cluster::cluster_frames;

    fn composer() -> ResponseComposer {
        let catalog = Arc::new(MatchCatalog::new(vec![sample_match("match_1")]));
        ResponseComposer::new(catalog, 3)
    }

    fn events_context() -> TurnContext {
        TurnContext {
            match_id: Some("match_1".to_string()),
            entity: Some(EntityKind::Events),
            event_types: Vec::new(),
            event_id: None,
        }
    }

    fn rows(rows: Rows, truncated: bool) -> Outcome {
        Outcome::Rows(RowSet {
            match_id: "match_1".to_string(),
            rows,
            truncated,
            anchor: None,
            order: TrackingOrder::Frame,
        })
    }

    #[test]
    fn test_reply_appends_one_turn() {
        let state = ConversationState::new();
        let out = composer().reply(&state, "hi", "Hello!");
        assert_eq!(out.conversational_response, "Hello!");
        assert!(out.data.is_empty());
        assert_eq!(out.updated_history.len(), 1);
        assert!(state.is_empty());
    }

    #[test]
    fn test_history_is_capped() {
        let c = composer();
        let mut state = ConversationState::new();
        for i in 0..5 {
            state = c.reply(&state, &format!("q{}", i), "a").updated_history;
        }
        assert_eq!(state.len(), 3);
        assert_eq!(state.turns()[0].user, "q2");
    }

    #[test]
    fn test_events_summary_counts_by_type() {
        let events = vec![
            sample_event("E1", "match_1", "shot", 100, 110),
            sample_event("E2", "match_1", "pass", 200, 210),
            sample_event("E3", "match_1", "pass", 300, 310),
        ];
        let out = composer().retrieved(
            &ConversationState::new(),
            "events",
            events_context(),
            &rows(Rows::Events(events), false),
        );
        assert_eq!(
            out.conversational_response,
            "Found 3 events in Arsenal vs Chelsea (match_1) between frames 100 and 300: \
             2 pass, 1 shot."
        );
        assert_eq!(out.data.len(), 3);
        assert_eq!(out.updated_history.turns()[0].data.len(), 3);
    }

    #[test]
    fn test_single_event_is_remembered() {
        let out = composer().retrieved(
            &ConversationState::new(),
            "event E1",
            events_context(),
            &rows(
                Rows::Events(vec![sample_event("E1", "match_1", "shot", 100, 110)]),
                false,
            ),
        );
        assert!(out.conversational_response.starts_with("Found event E1 (shot)"));
        assert_eq!(out.updated_history.last_event_id(), Some("E1"));
    }

    #[test]
    fn test_empty_events_mention_types() {
        let mut context = events_context();
        context.event_types = vec!["shot".to_string()];
        let out = composer().retrieved(
            &ConversationState::new(),
            "shots",
            context,
            &rows(Rows::Events(Vec::new()), false),
        );
        assert_eq!(
            out.conversational_response,
            "No shot events matched in Arsenal vs Chelsea (match_1)."
        );
        assert!(out.data.is_empty());
    }

    #[test]
    fn test_truncation_note() {
        let tracking: Vec<_> = (0..5).map(|f| sample_tracking("match_1", f, "p7")).collect();
        let out = composer().retrieved(
            &ConversationState::new(),
            "tracking",
            events_context(),
            &rows(Rows::Tracking(tracking), true),
        );
        assert_eq!(out.data.len(), 5);
        assert!(out
            .conversational_response
            .contains("truncated to the first 5 rows"));
    }

    #[test]
    fn test_clusters_and_anchor() {
        let tracking: Vec<_> = [100, 101, 102, 150]
            .iter()
            .map(|f| sample_tracking("match_1", *f, "p7"))
            .collect();
        let outcome = Outcome::Rows(RowSet {
            match_id: "match_1".to_string(),
            rows: Rows::Clusters(cluster_frames(&tracking, 10)),
            truncated: false,
            anchor: Some(sample_event("E1", "match_1", "pressure", 100, 150)),
            order: TrackingOrder::Frame,
        });
        let out = composer().retrieved(&ConversationState::new(), "moments", events_context(), &outcome);
        assert!(out
            .conversational_response
            .starts_with("During event E1 (pressure, frames 100 to 150): Found 2 continuous moments"));
        assert_eq!(out.data[0]["frame_count"], 3);
    }

    #[test]
    fn test_fastest_row_is_named() {
        let mut fast = sample_tracking("match_1", 1500, "p9");
        fast.speed = Some(9.31);
        let tracking = vec![fast, sample_tracking("match_1", 100, "p7")];
        let outcome = Outcome::Rows(RowSet {
            match_id: "match_1".to_string(),
            rows: Rows::Tracking(tracking),
            truncated: false,
            anchor: None,
            order: TrackingOrder::SpeedDesc,
        });
        let out = composer().retrieved(&ConversationState::new(), "fastest", events_context(), &outcome);
        assert!(out
            .conversational_response
            .ends_with("Fastest: p9 at 9.3 m/s, frame 1500 (01:00)."));
    }

    #[test]
    fn test_records_summary_lists_columns() {
        let mut record = Record::new();
        record.insert("player_id".to_string(), serde_json::json!("p7"));
        record.insert("top_speed".to_string(), serde_json::json!(8.1));
        let out = composer().retrieved(
            &ConversationState::new(),
            "top speed per player",
            events_context(),
            &rows(Rows::Records(vec![record]), false),
        );
        assert_eq!(
            out.conversational_response,
            "Found 1 result row in Arsenal vs Chelsea (match_1) with columns player_id, top_speed."
        );
        assert_eq!(out.data[0]["top_speed"], 8.1);
    }

    #[test]
    fn test_event_not_found() {
        let outcome = Outcome::EventNotFound {
            match_id: "match_1".to_string(),
            event_id: "E404".to_string(),
        };
        let out = composer().retrieved(&ConversationState::new(), "q", events_context(), &outcome);
        assert_eq!(
            out.conversational_response,
            "I couldn't find event E404 in Arsenal vs Chelsea (match_1)."
        );
        assert!(out.data.is_empty());
    }

    #[test]
    fn test_apology_per_kind() {
        let err = AgentError::RetrievalFailed {
            kind: StoreErrorKind::Timeout,
            message: "busy".to_string(),
        };
        assert!(apology(&err).contains("too long"));
        let out = composer().failure(&ConversationState::new(), "q", &err);
        assert!(out.conversational_response.starts_with("Sorry"));
        assert!(out.data.is_empty());
        assert_eq!(out.updated_history.len(), 1);
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0.0), "00:00");
        assert_eq!(format_clock(754.9), "12:34");
    }
}
