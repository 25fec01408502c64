//! Deterministic rule-based intent classifier.
//!
//! Recognizes conversational cues, event and tracking keywords, match ids,
//! team and player references, halves, frame and minute ranges from raw
//! utterances using a fixed set of regular expressions.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::{Captures, Regex};
use tracing::debug;

use scoptics_core::types::EntityKind;
use scoptics_storage::{QueryFilters, TrackingOrder, Window};

use crate::catalog::MatchCatalog;
use crate::classifier::{
    Classification, ClassifierError, EventRef, IntentClassifier, RetrievalIntent,
};
use crate::context::{FollowUpContext, Turn};

// =============================================================================
// Compiled regex sets (compiled once, reused across calls)
// =============================================================================

struct Cues {
    greeting: Regex,
    thanks: Regex,
    help: Regex,
    clarify_prior: Regex,
    follow_up: Regex,
    generic_event: Regex,
    tracking: Regex,
    cluster: Regex,
    fastest: Regex,
    slowest: Regex,
}

static CUES: LazyLock<Cues> = LazyLock::new(|| Cues {
    greeting: Regex::new(
        r"(?i)^\s*(?:hi|hello|hey|hiya|howdy|good\s+(?:morning|afternoon|evening))\b",
    )
    .unwrap(),
    thanks: Regex::new(r"(?i)\b(?:thanks|thank\s+you|cheers)\b").unwrap(),
    help: Regex::new(r"(?i)\b(?:help|what\s+can\s+you\s+do|how\s+does\s+this\s+work)\b").unwrap(),
    clarify_prior: Regex::new(
        r"(?i)\b(?:what\s+do\s+you\s+mean|explain|elaborate|tell\s+me\s+more|more\s+details|can\s+you\s+clarify)\b",
    )
    .unwrap(),
    follow_up: Regex::new(r"(?i)^\s*(?:and\s+)?(?:what|how)\s+about\s+(.+?)\s*\??\s*$").unwrap(),
    generic_event: Regex::new(r"(?i)\bevents?\b").unwrap(),
    tracking: Regex::new(
        r"(?i)\b(?:positions?|positional|tracking|frames?|coordinates|locations?|located|where\s+(?:was|were|is|are)|speeds?|fastest|slowest|movements?|moving|running|sprint(?:s|ing)?|ball)\b",
    )
    .unwrap(),
    cluster: Regex::new(r"(?i)\b(?:moments?|spells?|sequences?|phases?|stretches|periods\s+of)\b")
        .unwrap(),
    fastest: Regex::new(r"(?i)\b(?:fastest|quickest|top\s+speeds?|highest\s+speeds?|max(?:imum)?\s+speed)\b")
        .unwrap(),
    slowest: Regex::new(r"(?i)\b(?:slowest|lowest\s+speeds?|min(?:imum)?\s+speed)\b").unwrap(),
});

struct References {
    event_id: Regex,
    uuid: Regex,
    previous_event: Regex,
    match_token: Regex,
    team_token: Regex,
    player_token: Regex,
    player_named: Regex,
}

static REFERENCES: LazyLock<References> = LazyLock::new(|| References {
    event_id: Regex::new(r"(?i)\bevent\s+(?:id\s+)?#?([A-Za-z0-9][A-Za-z0-9_-]*)").unwrap(),
    uuid: Regex::new(
        r"(?i)\b[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\b",
    )
    .unwrap(),
    previous_event: Regex::new(r"(?i)\b(?:that|this|the\s+same|the\s+last|previous)\s+event\b")
        .unwrap(),
    match_token: Regex::new(r"(?i)\b(match_[A-Za-z0-9_]+)\b").unwrap(),
    team_token: Regex::new(r"(?i)\b(team_[A-Za-z0-9]+)\b").unwrap(),
    player_token: Regex::new(r"(?i)\b(player_[A-Za-z0-9]+)\b").unwrap(),
    player_named: Regex::new(r"(?i)\bplayer\s+#?([A-Za-z]*\d[A-Za-z0-9_-]*)").unwrap(),
});

struct Windows {
    first_half: Regex,
    second_half: Regex,
    period_n: Regex,
    frame_range: Regex,
    minute_range: Regex,
    between_minutes: Regex,
    first_minutes: Regex,
    top_n: Regex,
    first_n: Regex,
}

static WINDOWS: LazyLock<Windows> = LazyLock::new(|| Windows {
    first_half: Regex::new(r"(?i)\b(?:first|1st)\s+half\b").unwrap(),
    second_half: Regex::new(r"(?i)\b(?:second|2nd)\s+half\b").unwrap(),
    period_n: Regex::new(r"(?i)\bperiod\s+(\d)\b").unwrap(),
    frame_range: Regex::new(r"(?i)\bframes?\s+(\d+)\s*(?:-|to|through|until|and)\s*(\d+)\b")
        .unwrap(),
    minute_range: Regex::new(
        r"(?i)\bminutes?\s+(\d+)\s*(?:-|to|through|until|and)\s*(\d+)\b",
    )
    .unwrap(),
    between_minutes: Regex::new(
        r"(?i)\bbetween\s+(?:the\s+)?(\d+)(?:st|nd|rd|th)?\s*(?:-|and|to)\s*(\d+)(?:st|nd|rd|th)?\s+minutes?\b",
    )
    .unwrap(),
    first_minutes: Regex::new(r"(?i)\bfirst\s+(\d+)\s+minutes?\b").unwrap(),
    top_n: Regex::new(r"(?i)\b(?:top|limit(?:\s+to)?|only)\s+(\d+)\b").unwrap(),
    first_n: Regex::new(r"(?i)\bfirst\s+(\d+)(?:\s+(\w+))?").unwrap(),
});

/// Build a case-insensitive pattern for an event type tag.
///
/// Underscores and spaces are interchangeable and a plural suffix is
/// accepted, so `2v1_final_third` matches "2v1 final third" and `pass`
/// matches "passes".
fn event_type_pattern(tag: &str) -> Option<String> {
    let words: Vec<String> = tag
        .split(|c: char| c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(regex::escape)
        .collect();
    if words.is_empty() {
        return None;
    }
    Some(format!(r"(?i)\b{}(?:s|es)?\b", words.join(r"[\s_-]+")))
}

/// Whether `needle` occurs in `haystack` as a whole word or phrase, ignoring case.
fn contains_phrase(haystack: &str, needle: &str) -> bool {
    let hay = haystack.to_lowercase();
    let needle = needle.to_lowercase();
    if needle.is_empty() {
        return false;
    }
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    hay.match_indices(&needle).any(|(start, _)| {
        let before = hay[..start].chars().next_back();
        let after = hay[start + needle.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

fn capture_i64(caps: &Captures<'_>, idx: usize) -> Option<i64> {
    caps.get(idx).and_then(|m| m.as_str().parse().ok())
}

// =============================================================================
// RuleClassifier
// =============================================================================

/// Rule-based classifier over a configurable set of event type tags.
pub struct RuleClassifier {
    event_types: Vec<(String, Regex)>,
}

impl RuleClassifier {
    /// Create a classifier recognizing the given event type tags.
    pub fn new(event_types: &[String]) -> Self {
        let event_types = event_types
            .iter()
            .filter_map(|tag| {
                let pattern = event_type_pattern(tag)?;
                Regex::new(&pattern).ok().map(|re| (tag.clone(), re))
            })
            .collect();
        Self { event_types }
    }

    /// Classify synchronously; the async trait method delegates here.
    pub fn classify_text(
        &self,
        utterance: &str,
        context: &[Turn],
        catalog: &MatchCatalog,
    ) -> Classification {
        let follow = FollowUpContext::from_turns(context);
        let cues = &*CUES;

        let event_types = self.extract_event_types(utterance);
        let event_ref = extract_event_ref(utterance);
        let event_hit = !event_types.is_empty()
            || event_ref.is_some()
            || cues.generic_event.is_match(utterance);
        let tracking_hit = cues.tracking.is_match(utterance);

        let entity = match (event_hit, tracking_hit) {
            // Tracking bounded by a specific event, typed or not: correlated retrieval.
            (_, true) if event_ref.is_some() => Some(EntityKind::Tracking),
            (true, _) => Some(EntityKind::Events),
            (false, true) => Some(EntityKind::Tracking),
            (false, false) => None,
        };

        let (entity, inherited_types) = match entity {
            Some(kind) => (kind, Vec::new()),
            None => {
                if cues.follow_up.is_match(utterance) {
                    match follow.entity {
                        Some(kind) => (kind, follow.event_types.clone()),
                        None => {
                            return Classification::Unresolvable {
                                question: "What would you like me to compare? Ask for events \
                                           or tracking data first, then follow up."
                                    .to_string(),
                            }
                        }
                    }
                } else {
                    return self.conversational(utterance, context, catalog);
                }
            }
        };

        let teams = mentioned_teams(utterance, catalog);
        let match_id = extract_match(utterance, catalog, &teams, follow.match_id.as_deref());

        let mut filters = extract_filters(utterance, catalog, &teams, match_id.as_deref());
        filters.event_types = if event_types.is_empty() {
            inherited_types
        } else {
            event_types
        };

        let mut intent = RetrievalIntent::new(entity);
        intent.match_id = match_id;
        intent.event = event_ref;
        if entity == EntityKind::Tracking {
            filters.event_types.clear();
            filters.order = speed_order(utterance);
        }
        // A speed ranking is answered by the ranked rows, not by segments.
        intent.cluster = entity == EntityKind::Tracking
            && !filters.order.is_by_speed()
            && cues.cluster.is_match(utterance);
        intent.filters = filters;

        debug!(
            strategy = "rules",
            entity = %intent.entity,
            match_id = ?intent.match_id,
            team_id = ?intent.filters.team_id,
            "Classified retrieval"
        );
        Classification::Retrieval(intent)
    }

    fn extract_event_types(&self, utterance: &str) -> Vec<String> {
        self.event_types
            .iter()
            .filter(|(_, re)| re.is_match(utterance))
            .map(|(tag, _)| tag.clone())
            .collect()
    }

    fn conversational(
        &self,
        utterance: &str,
        context: &[Turn],
        catalog: &MatchCatalog,
    ) -> Classification {
        let cues = &*CUES;

        if cues.help.is_match(utterance) {
            return Classification::Conversational {
                reply: self.help_text(catalog),
            };
        }
        if cues.thanks.is_match(utterance) {
            return Classification::Conversational {
                reply: "You're welcome! Let me know if you want to dig into anything else."
                    .to_string(),
            };
        }
        if cues.greeting.is_match(utterance) {
            let example = catalog
                .matches()
                .first()
                .map(|m| m.match_id.as_str())
                .unwrap_or("a match");
            return Classification::Conversational {
                reply: format!(
                    "Hello! I can answer questions about match events and tracking data. \
                     Try \"show passes in {}\".",
                    example
                ),
            };
        }
        if cues.clarify_prior.is_match(utterance) {
            if let Some(last) = context.last() {
                let reply = if last.data.is_empty() {
                    format!("To recap my last reply: {}", last.assistant)
                } else {
                    let scope = last
                        .context
                        .match_id
                        .as_deref()
                        .map(|m| format!(" from {}", m))
                        .unwrap_or_default();
                    format!(
                        "My last answer was based on {} record(s){}. You can narrow it down \
                         by team, player, half, frame range or minute range.",
                        last.data.len(),
                        scope
                    )
                };
                return Classification::Conversational { reply };
            }
        }

        Classification::Unresolvable {
            question: "I'm not sure what you'd like me to look up. Do you want events (for \
                       example passes or shots) or tracking positions, and for which match?"
                .to_string(),
        }
    }

    fn help_text(&self, catalog: &MatchCatalog) -> String {
        let types: Vec<&str> = self
            .event_types
            .iter()
            .take(6)
            .map(|(tag, _)| tag.as_str())
            .collect();
        let known = if catalog.is_empty() {
            String::new()
        } else {
            let ids: Vec<&str> = catalog
                .matches()
                .iter()
                .take(5)
                .map(|m| m.match_id.as_str())
                .collect();
            format!(" (known matches: {})", ids.join(", "))
        };
        format!(
            "I can look up tactical events (such as {}) and player tracking data. Name a \
             match{}, and optionally a team, player, half, frame range or minute range.",
            types.join(", "),
            known
        )
    }
}

#[async_trait]
impl IntentClassifier for RuleClassifier {
    fn name(&self) -> &'static str {
        "rules"
    }

    async fn classify(
        &self,
        utterance: &str,
        context: &[Turn],
        catalog: &MatchCatalog,
    ) -> Result<Classification, ClassifierError> {
        Ok(self.classify_text(utterance, context, catalog))
    }
}

// =============================================================================
// Extraction helpers
// =============================================================================

fn extract_event_ref(utterance: &str) -> Option<EventRef> {
    let refs = &*REFERENCES;
    if let Some(m) = refs.uuid.find(utterance) {
        return Some(EventRef::Id(m.as_str().to_string()));
    }
    let explicit = refs
        .event_id
        .captures_iter(utterance)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .find(|id| id.chars().any(|c| c.is_ascii_digit()));
    if let Some(id) = explicit {
        return Some(EventRef::Id(id.to_string()));
    }
    if refs.previous_event.is_match(utterance) {
        return Some(EventRef::Previous);
    }
    None
}

fn speed_order(utterance: &str) -> TrackingOrder {
    if CUES.fastest.is_match(utterance) {
        TrackingOrder::SpeedDesc
    } else if CUES.slowest.is_match(utterance) {
        TrackingOrder::SpeedAsc
    } else {
        TrackingOrder::Frame
    }
}

/// Catalog team names mentioned in the utterance.
fn mentioned_teams<'a>(utterance: &str, catalog: &'a MatchCatalog) -> Vec<&'a str> {
    catalog
        .team_names()
        .into_iter()
        .filter(|name| contains_phrase(utterance, name))
        .collect()
}

/// Match named by id, or uniquely identified by the teams mentioned.
///
/// Team-based inference is skipped when the conversation's current match
/// already features every mentioned team.
fn extract_match(
    utterance: &str,
    catalog: &MatchCatalog,
    teams: &[&str],
    current: Option<&str>,
) -> Option<String> {
    if let Some(meta) = catalog
        .matches()
        .iter()
        .find(|m| contains_phrase(utterance, &m.match_id))
    {
        return Some(meta.match_id.clone());
    }
    if let Some(caps) = REFERENCES.match_token.captures(utterance) {
        return Some(caps[1].to_string());
    }
    if teams.is_empty() {
        return None;
    }

    let current_has_teams = current
        .and_then(|id| catalog.get(id))
        .is_some_and(|meta| {
            teams.iter().all(|t| {
                meta.team_names()
                    .iter()
                    .any(|name| name.eq_ignore_ascii_case(t))
            })
        });
    if current_has_teams {
        return None;
    }

    match catalog.matches_with_teams(teams).as_slice() {
        [only] => Some(only.match_id.clone()),
        _ => None,
    }
}

fn extract_filters(
    utterance: &str,
    catalog: &MatchCatalog,
    teams: &[&str],
    match_id: Option<&str>,
) -> QueryFilters {
    let refs = &*REFERENCES;
    let win = &*WINDOWS;
    let mut filters = QueryFilters::default();

    // Team: explicit id first, else a single named team. Two named teams
    // describe the fixture, not a side.
    if let Some(caps) = refs.team_token.captures(utterance) {
        filters.team_id = Some(caps[1].to_string());
    } else if let [team] = teams {
        filters.team_id = Some(catalog.team_id(match_id, team));
    }

    if let Some(caps) = refs.player_token.captures(utterance) {
        filters.player_id = Some(caps[1].to_string());
    } else if let Some(caps) = refs.player_named.captures(utterance) {
        filters.player_id = Some(caps[1].to_string());
    }

    if win.first_half.is_match(utterance) {
        filters.period = Some(1);
    } else if win.second_half.is_match(utterance) {
        filters.period = Some(2);
    } else if let Some(caps) = win.period_n.captures(utterance) {
        filters.period = caps[1].parse().ok();
    }

    if let Some(caps) = win.frame_range.captures(utterance) {
        if let (Some(start), Some(end)) = (capture_i64(&caps, 1), capture_i64(&caps, 2)) {
            filters.frame_window = Some(Window::new(start, end));
        }
    }

    let minutes = win
        .minute_range
        .captures(utterance)
        .or_else(|| win.between_minutes.captures(utterance))
        .and_then(|caps| Some((capture_i64(&caps, 1)?, capture_i64(&caps, 2)?)))
        .or_else(|| {
            win.first_minutes
                .captures(utterance)
                .and_then(|caps| capture_i64(&caps, 1))
                .map(|n| (0, n))
        });
    if let Some((start, end)) = minutes {
        filters.time_window = Some(Window::new(start as f64 * 60.0, end as f64 * 60.0));
    }

    if let Some(caps) = win.top_n.captures(utterance) {
        filters.limit = caps[1].parse().ok();
    } else if let Some(caps) = win.first_n.captures(utterance) {
        let unit_is_minutes = caps
            .get(2)
            .is_some_and(|m| m.as_str().to_lowercase().starts_with("min"));
        if !unit_is_minutes {
            filters.limit = caps[1].parse().ok();
        }
    }
    if filters.limit == Some(0) {
        filters.limit = None;
    }

    filters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TurnContext;
    use scoptics_core::types::MatchMetadata;

    fn classifier() -> RuleClassifier {
        RuleClassifier::new(&[
            "pass".to_string(),
            "shot".to_string(),
            "pressure".to_string(),
            "2v1_final_third".to_string(),
        ])
    }

    fn meta(id: &str, home: &str, away: &str) -> MatchMetadata {
        MatchMetadata {
            match_id: id.to_string(),
            competition_name: None,
            home_team_name: Some(home.to_string()),
            away_team_name: Some(away.to_string()),
            pitch_length_m: None,
            pitch_width_m: None,
            extra: serde_json::json!({ "home_team_id": "team_home", "away_team_id": "team_away" }),
        }
    }

    fn catalog() -> MatchCatalog {
        MatchCatalog::new(vec![
            meta("match_1", "Arsenal", "Chelsea"),
            meta("match_2", "Arsenal", "Everton"),
        ])
    }

    fn retrieval(text: &str) -> RetrievalIntent {
        retrieval_with(text, &[])
    }

    fn retrieval_with(text: &str, context: &[Turn]) -> RetrievalIntent {
        match classifier().classify_text(text, context, &catalog()) {
            Classification::Retrieval(intent) => intent,
            other => panic!("expected retrieval for {:?}, got {:?}", text, other),
        }
    }

    #[test]
    fn test_event_type_pattern() {
        let re = Regex::new(&event_type_pattern("2v1_final_third").unwrap()).unwrap();
        assert!(re.is_match("any 2v1 final third situations?"));
        assert!(re.is_match("2v1_final_third"));
        let re = Regex::new(&event_type_pattern("pass").unwrap()).unwrap();
        assert!(re.is_match("show passes"));
        assert!(!re.is_match("passing lanes"));
        assert!(event_type_pattern("  ").is_none());
    }

    #[test]
    fn test_contains_phrase_respects_word_boundaries() {
        assert!(contains_phrase("Show Arsenal passes", "arsenal"));
        assert!(!contains_phrase("show match_10 passes", "match_1"));
        assert!(contains_phrase("passes in match_1?", "match_1"));
    }

    #[test]
    fn test_greeting_is_conversational() {
        let out = classifier().classify_text("Hello there!", &[], &catalog());
        match out {
            Classification::Conversational { reply } => assert!(reply.contains("match_1")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_thanks_and_help_are_conversational() {
        assert!(matches!(
            classifier().classify_text("thanks!", &[], &catalog()),
            Classification::Conversational { .. }
        ));
        match classifier().classify_text("what can you do?", &[], &catalog()) {
            Classification::Conversational { reply } => {
                assert!(reply.contains("pass"));
                assert!(reply.contains("match_2"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_clarify_prior_uses_last_turn() {
        let turn = Turn::new("show passes in match_1", "Found 2 events.")
            .with_data(vec![serde_json::json!({}), serde_json::json!({})])
            .with_context(TurnContext {
                match_id: Some("match_1".to_string()),
                ..Default::default()
            });
        match classifier().classify_text("what do you mean?", &[turn], &catalog()) {
            Classification::Conversational { reply } => {
                assert!(reply.contains("2 record(s) from match_1"))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_gibberish_is_unresolvable() {
        assert!(matches!(
            classifier().classify_text("purple monkey dishwasher", &[], &catalog()),
            Classification::Unresolvable { .. }
        ));
    }

    #[test]
    fn test_events_with_type_and_match() {
        let intent = retrieval("Show me all passes in match_2");
        assert_eq!(intent.entity, EntityKind::Events);
        assert_eq!(intent.match_id.as_deref(), Some("match_2"));
        assert_eq!(intent.filters.event_types, vec!["pass"]);
    }

    #[test]
    fn test_multiword_event_type() {
        let intent = retrieval("any 2v1 final third situations in match_1?");
        assert_eq!(intent.filters.event_types, vec!["2v1_final_third"]);
    }

    #[test]
    fn test_tracking_with_player_and_half() {
        let intent = retrieval("where was player 7 in the second half of match_1");
        assert_eq!(intent.entity, EntityKind::Tracking);
        assert_eq!(intent.filters.player_id.as_deref(), Some("7"));
        assert_eq!(intent.filters.period, Some(2));
    }

    #[test]
    fn test_tie_break_prefers_events() {
        let intent = retrieval("show passes and player positions in match_1");
        assert_eq!(intent.entity, EntityKind::Events);
    }

    #[test]
    fn test_positions_during_event_is_correlated() {
        let intent = retrieval("show positions during event E123");
        assert_eq!(intent.entity, EntityKind::Tracking);
        assert_eq!(intent.event, Some(EventRef::Id("E123".to_string())));
        assert!(intent.match_id.is_none());
    }

    #[test]
    fn test_typed_event_positions_stay_correlated() {
        let intent = retrieval("show positions during the pass event E1 in match_1");
        assert_eq!(intent.entity, EntityKind::Tracking);
        assert_eq!(intent.event, Some(EventRef::Id("E1".to_string())));
        assert!(intent.filters.event_types.is_empty());
    }

    #[test]
    fn test_fastest_orders_by_speed() {
        let intent = retrieval("what was the fastest moment for player_p9 in match_1");
        assert_eq!(intent.entity, EntityKind::Tracking);
        assert_eq!(intent.filters.order, TrackingOrder::SpeedDesc);
        assert_eq!(intent.filters.player_id.as_deref(), Some("player_p9"));
        assert!(!intent.cluster);

        let intent = retrieval("slowest frames for team_home in match_1");
        assert_eq!(intent.filters.order, TrackingOrder::SpeedAsc);

        let intent = retrieval("tracking data for match_1");
        assert_eq!(intent.filters.order, TrackingOrder::Frame);
    }

    #[test]
    fn test_speed_cue_on_events_is_ignored() {
        let intent = retrieval("the fastest passes in match_1");
        assert_eq!(intent.entity, EntityKind::Events);
        assert_eq!(intent.filters.order, TrackingOrder::Frame);
    }

    #[test]
    fn test_that_event_refers_to_previous() {
        let intent = retrieval("and the tracking for that event?");
        assert_eq!(intent.entity, EntityKind::Tracking);
        assert_eq!(intent.event, Some(EventRef::Previous));
    }

    #[test]
    fn test_event_lookup_by_id() {
        let intent = retrieval("show event E42 in match_1");
        assert_eq!(intent.entity, EntityKind::Events);
        assert_eq!(intent.event, Some(EventRef::Id("E42".to_string())));
    }

    #[test]
    fn test_frame_and_minute_windows() {
        let intent = retrieval("tracking between frames 100 and 250 in match_1");
        assert_eq!(intent.filters.frame_window, Some(Window::new(100, 250)));

        let intent = retrieval("shots between the 10th and 20th minute in match_1");
        assert_eq!(intent.filters.time_window, Some(Window::new(600.0, 1200.0)));

        let intent = retrieval("passes in the first 15 minutes of match_1");
        assert_eq!(intent.filters.time_window, Some(Window::new(0.0, 900.0)));
        assert_eq!(intent.filters.limit, None);
    }

    #[test]
    fn test_reversed_frames_are_passed_through() {
        let intent = retrieval("frames 300 to 100 in match_1");
        assert_eq!(intent.filters.frame_window, Some(Window::new(300, 100)));
    }

    #[test]
    fn test_limit() {
        assert_eq!(retrieval("top 5 shots in match_1").filters.limit, Some(5));
        assert_eq!(retrieval("first 3 passes in match_1").filters.limit, Some(3));
    }

    #[test]
    fn test_single_team_becomes_filter() {
        let intent = retrieval("Chelsea passes in match_1");
        assert_eq!(intent.filters.team_id.as_deref(), Some("team_away"));
        assert_eq!(intent.match_id.as_deref(), Some("match_1"));
    }

    #[test]
    fn test_two_teams_identify_match() {
        let intent = retrieval("shots in Arsenal vs Everton");
        assert_eq!(intent.match_id.as_deref(), Some("match_2"));
        assert!(intent.filters.team_id.is_none());
    }

    #[test]
    fn test_ambiguous_team_does_not_pick_match() {
        let intent = retrieval("Arsenal passes");
        assert!(intent.match_id.is_none());
        assert_eq!(intent.filters.team_id.as_deref(), Some("team_home"));
    }

    #[test]
    fn test_team_inference_defers_to_current_match() {
        let context = vec![Turn::new("q", "a").with_context(TurnContext {
            match_id: Some("match_2".to_string()),
            entity: Some(EntityKind::Events),
            ..Default::default()
        })];
        let intent = retrieval_with("Everton shots", &context);
        assert!(intent.match_id.is_none());
    }

    #[test]
    fn test_cluster_cue_only_for_tracking() {
        assert!(retrieval("moments where player 7 was sprinting in match_1").cluster);
        assert!(!retrieval("passes in key moments of match_1").cluster);
    }

    #[test]
    fn test_follow_up_inherits_entity_and_types() {
        let context = vec![Turn::new("show shots in match_1", "Found 3 events.").with_context(
            TurnContext {
                match_id: Some("match_1".to_string()),
                entity: Some(EntityKind::Events),
                event_types: vec!["shot".to_string()],
                event_id: None,
            },
        )];
        let intent = retrieval_with("what about Chelsea?", &context);
        assert_eq!(intent.entity, EntityKind::Events);
        assert_eq!(intent.filters.event_types, vec!["shot"]);
        assert_eq!(intent.filters.team_id.as_deref(), Some("team_away"));
        // Current match already features Chelsea; resolver falls back to it.
        assert!(intent.match_id.is_none());
    }

    #[test]
    fn test_follow_up_without_context_is_unresolvable() {
        assert!(matches!(
            classifier().classify_text("what about Chelsea?", &[], &catalog()),
            Classification::Unresolvable { .. }
        ));
    }

    #[tokio::test]
    async fn test_trait_delegates_to_rules() {
        let c = classifier();
        let out = c.classify("shots in match_1", &[], &catalog()).await.unwrap();
        assert!(matches!(out, Classification::Retrieval(_)));
        assert_eq!(c.name(), "rules");
    }
}
