//! Conversation state.
//!
//! The state is a plain value owned by the caller: it arrives with every
//! request and goes back out with exactly one more turn. Nothing here holds
//! state between calls.

use serde::{Deserialize, Serialize};

use scoptics_core::types::EntityKind;

// =============================================================================
// Turn
// =============================================================================

/// What a turn's retrieval referred to, carried forward into follow-ups.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<EntityKind>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub event_types: Vec<String>,
    /// Event the turn singled out, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

impl TurnContext {
    pub fn is_empty(&self) -> bool {
        self.match_id.is_none()
            && self.entity.is_none()
            && self.event_types.is_empty()
            && self.event_id.is_none()
    }
}

/// One exchange: the user's utterance, the agent's reply and any payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub user: String,
    pub assistant: String,
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "TurnContext::is_empty")]
    pub context: TurnContext,
}

impl Turn {
    pub fn new(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            assistant: assistant.into(),
            data: Vec::new(),
            context: TurnContext::default(),
        }
    }

    pub fn with_data(mut self, data: Vec<serde_json::Value>) -> Self {
        self.data = data;
        self
    }

    pub fn with_context(mut self, context: TurnContext) -> Self {
        self.context = context;
        self
    }
}

// =============================================================================
// ConversationState
// =============================================================================

/// Ordered log of prior turns. Serializes as a bare JSON array.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationState {
    turns: Vec<Turn>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_turns(turns: Vec<Turn>) -> Self {
        Self { turns }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Return a new state with `turn` appended. `self` is left untouched.
    pub fn append(&self, turn: Turn) -> Self {
        let mut turns = Vec::with_capacity(self.turns.len() + 1);
        turns.extend_from_slice(&self.turns);
        turns.push(turn);
        Self { turns }
    }

    /// Like [`append`](Self::append), keeping only the newest `max_turns`.
    ///
    /// A `max_turns` of zero is treated as one: the new turn is always kept.
    pub fn append_capped(&self, turn: Turn, max_turns: usize) -> Self {
        let keep = max_turns.max(1);
        let mut next = self.append(turn);
        if next.turns.len() > keep {
            let excess = next.turns.len() - keep;
            next.turns.drain(..excess);
        }
        next
    }

    /// The last `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    /// Most recently referenced match anywhere in the conversation.
    pub fn last_match(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find_map(|t| t.context.match_id.as_deref())
    }

    /// Event singled out by the most recent turn that singled one out,
    /// with the match that turn was about.
    pub fn last_event(&self) -> Option<(&str, Option<&str>)> {
        self.turns.iter().rev().find_map(|t| {
            t.context
                .event_id
                .as_deref()
                .map(|id| (id, t.context.match_id.as_deref()))
        })
    }

    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event().map(|(id, _)| id)
    }
}

// =============================================================================
// FollowUpContext
// =============================================================================

/// Retrieval context inherited by follow-ups such as "what about Chelsea?".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FollowUpContext {
    pub match_id: Option<String>,
    pub entity: Option<EntityKind>,
    pub event_types: Vec<String>,
    pub event_id: Option<String>,
}

impl FollowUpContext {
    /// Collect the newest value of each field from `turns` (oldest first).
    ///
    /// Entity and event types come together from the newest retrieval turn
    /// so a follow-up repeats that query rather than mixing two.
    pub fn from_turns(turns: &[Turn]) -> Self {
        let mut ctx = Self::default();
        for turn in turns.iter().rev() {
            let c = &turn.context;
            if ctx.match_id.is_none() {
                ctx.match_id = c.match_id.clone();
            }
            if ctx.entity.is_none() && c.entity.is_some() {
                ctx.entity = c.entity;
                ctx.event_types = c.event_types.clone();
            }
            if ctx.event_id.is_none() {
                ctx.event_id = c.event_id.clone();
            }
        }
        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retrieval_turn(match_id: &str, entity: EntityKind, types: &[&str]) -> Turn {
        Turn::new("q", "a").with_context(TurnContext {
            match_id: Some(match_id.to_string()),
            entity: Some(entity),
            event_types: types.iter().map(|t| t.to_string()).collect(),
            event_id: None,
        })
    }

    #[test]
    fn test_empty_state_is_valid() {
        let state = ConversationState::new();
        assert!(state.is_empty());
        assert!(state.recent(5).is_empty());
        assert!(state.last_match().is_none());
    }

    #[test]
    fn test_append_does_not_mutate_original() {
        let state = ConversationState::new();
        let next = state.append(Turn::new("hi", "hello"));
        assert_eq!(state.len(), 0);
        assert_eq!(next.len(), 1);
        assert_eq!(next.turns()[0].user, "hi");
    }

    #[test]
    fn test_append_never_drops() {
        let mut state = ConversationState::new();
        for i in 0..100 {
            state = state.append(Turn::new(format!("q{}", i), "a"));
        }
        assert_eq!(state.len(), 100);
    }

    #[test]
    fn test_append_capped_keeps_newest() {
        let mut state = ConversationState::new();
        for i in 0..5 {
            state = state.append(Turn::new(format!("q{}", i), "a"));
        }
        let capped = state.append_capped(Turn::new("q5", "a"), 3);
        let users: Vec<&str> = capped.turns().iter().map(|t| t.user.as_str()).collect();
        assert_eq!(users, vec!["q3", "q4", "q5"]);

        let zero = state.append_capped(Turn::new("only", "a"), 0);
        assert_eq!(zero.len(), 1);
        assert_eq!(zero.turns()[0].user, "only");
    }

    #[test]
    fn test_recent_returns_tail_in_order() {
        let mut state = ConversationState::new();
        for i in 0..7 {
            state = state.append(Turn::new(format!("q{}", i), "a"));
        }
        let recent: Vec<&str> = state.recent(3).iter().map(|t| t.user.as_str()).collect();
        assert_eq!(recent, vec!["q4", "q5", "q6"]);
        assert_eq!(state.recent(50).len(), 7);
    }

    #[test]
    fn test_last_match_skips_conversational_turns() {
        let state = ConversationState::new()
            .append(retrieval_turn("match_1", EntityKind::Events, &["pass"]))
            .append(Turn::new("thanks", "You're welcome."));
        assert_eq!(state.last_match(), Some("match_1"));
    }

    #[test]
    fn test_last_event_keeps_its_match() {
        let mut event_turn = retrieval_turn("match_1", EntityKind::Events, &[]);
        event_turn.context.event_id = Some("E1".to_string());
        let state = ConversationState::new()
            .append(event_turn)
            .append(retrieval_turn("match_2", EntityKind::Tracking, &[]));
        assert_eq!(state.last_event(), Some(("E1", Some("match_1"))));
        assert_eq!(state.last_event_id(), Some("E1"));
        assert_eq!(state.last_match(), Some("match_2"));
    }

    #[test]
    fn test_serializes_as_array() {
        let state = ConversationState::new().append(Turn::new("hi", "hello"));
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{ "user": "hi", "assistant": "hello", "data": [] }])
        );

        let parsed: ConversationState = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, state);
    }

    #[test]
    fn test_deserialize_minimal_turn() {
        let state: ConversationState =
            serde_json::from_str(r#"[{"user": "hi", "assistant": "hello"}]"#).unwrap();
        assert!(state.turns()[0].data.is_empty());
        assert!(state.turns()[0].context.is_empty());
    }

    #[test]
    fn test_follow_up_context_takes_newest_retrieval() {
        let mut event_turn = retrieval_turn("match_1", EntityKind::Tracking, &[]);
        event_turn.context.event_id = Some("E7".to_string());
        let turns = vec![
            event_turn,
            retrieval_turn("match_2", EntityKind::Events, &["shot"]),
            Turn::new("thanks", "You're welcome."),
        ];
        let ctx = FollowUpContext::from_turns(&turns);
        assert_eq!(ctx.match_id.as_deref(), Some("match_2"));
        assert_eq!(ctx.entity, Some(EntityKind::Events));
        assert_eq!(ctx.event_types, vec!["shot"]);
        assert_eq!(ctx.event_id.as_deref(), Some("E7"));
    }
}
