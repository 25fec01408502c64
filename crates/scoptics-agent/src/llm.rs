//! Language-model-backed intent classification.
//!
//! [`LlmClassifier`] asks a model for a JSON decision and maps it onto a
//! [`Classification`]. Output that cannot be parsed or validated becomes
//! `Unresolvable`; transport failures surface as [`ClassifierError`].

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use scoptics_core::config::{AgentConfig, LlmConfig};
use scoptics_core::types::EntityKind;
use scoptics_storage::{QueryFilters, TrackingOrder, Window};

use crate::catalog::MatchCatalog;
use crate::classifier::{
    Classification, ClassifierError, EventRef, IntentClassifier, RetrievalIntent,
};
use crate::context::Turn;

const MAX_LLM_OUTPUT_LOG_CHARS: usize = 2_000;
const MAX_TURN_CHARS: usize = 300;

/// LLM request payload
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub system: String,
    pub user: String,
    pub model: String,
    pub temperature: f32,
}

/// LLM client trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError>;
}

/// LLM errors
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("http error: {0}")]
    Http(String),
    #[error("provider returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("response error: {0}")]
    Response(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

// =============================================================================
// LlmClassifier
// =============================================================================

#[derive(Debug, Clone)]
pub struct LlmClassifierConfig {
    pub model: String,
    pub temperature: f32,
    /// Event type tags the model may choose from.
    pub event_types: Vec<String>,
}

impl LlmClassifierConfig {
    pub fn new(llm: &LlmConfig, agent: &AgentConfig) -> Self {
        Self {
            model: llm.model.clone(),
            temperature: llm.temperature,
            event_types: agent.event_types.clone(),
        }
    }
}

/// Decision object the model is asked to return.
#[derive(Debug, Deserialize)]
struct LlmDecision {
    decision: String,
    #[serde(default)]
    reply: Option<String>,
    #[serde(default)]
    question: Option<String>,
    #[serde(default)]
    entity: Option<EntityKind>,
    #[serde(default)]
    match_id: Option<String>,
    #[serde(default)]
    event_types: Vec<String>,
    #[serde(default)]
    event_id: Option<String>,
    #[serde(default)]
    team_id: Option<String>,
    #[serde(default)]
    player_id: Option<String>,
    #[serde(default)]
    period: Option<u8>,
    #[serde(default)]
    frame_start: Option<i64>,
    #[serde(default)]
    frame_end: Option<i64>,
    #[serde(default)]
    minute_start: Option<f64>,
    #[serde(default)]
    minute_end: Option<f64>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    cluster: bool,
    #[serde(default)]
    order: Option<TrackingOrder>,
    #[serde(default)]
    sql: Option<String>,
}

const FALLBACK_QUESTION: &str = "I couldn't work out what to look up. Could you rephrase, \
                                 naming the match and whether you want events or tracking data?";

pub struct LlmClassifier<C: LlmClient> {
    client: C,
    config: LlmClassifierConfig,
}

impl<C: LlmClient> LlmClassifier<C> {
    pub fn new(client: C, config: LlmClassifierConfig) -> Self {
        Self { client, config }
    }

    fn build_prompt(&self, utterance: &str, context: &[Turn], catalog: &MatchCatalog) -> (String, String) {
        let mut system = String::new();
        system.push_str(
            "You route questions about soccer match data. The store holds frame-level \
             tracking records and derived tactical events. Return ONLY one JSON object.\n\n",
        );
        system.push_str("Shape:\n");
        system.push_str(
            r#"{"decision":"conversational|retrieval|unresolvable","reply":null,"question":null,"entity":"events|tracking","match_id":null,"event_types":[],"event_id":null,"team_id":null,"player_id":null,"period":null,"frame_start":null,"frame_end":null,"minute_start":null,"minute_end":null,"limit":null,"cluster":false,"order":"frame|speed_desc|speed_asc","sql":null}"#,
        );
        system.push_str("\n\nRules:\n");
        system.push_str("1) conversational: greetings or questions about earlier answers; set reply.\n");
        system.push_str("2) retrieval: data is needed; set entity and any filters the user gave.\n");
        system.push_str("3) unresolvable: you are not confident; set question to a clarifying question.\n");
        system.push_str("4) If both events and tracking could answer, choose events.\n");
        system.push_str(
            "5) For positions during a specific event use entity tracking and event_id; \
             use \"previous\" for \"that event\".\n",
        );
        system.push_str("6) Leave match_id null unless the user names a match.\n");
        system.push_str("7) cluster is true only for tracking questions about moments or spells.\n");
        system.push_str(&format!(
            "8) event_types must come from: {}.\n",
            self.config.event_types.join(", ")
        ));
        system.push_str(
            "9) For fastest or slowest questions use entity tracking with order speed_desc or \
             speed_asc.\n",
        );
        system.push_str(
            "10) Only when no filter can answer, set sql to one read-only SQLite SELECT over \
             the table tracking(match_id, period, frame, timestamp, team_id, player_id, x, y, \
             z, speed, orientation). It already holds only the chosen match. Select frame and \
             timestamp when the answer spans time.\n",
        );

        let mut user = String::new();
        if !catalog.is_empty() {
            user.push_str("Known matches:\n");
            for meta in catalog.matches() {
                user.push_str(&format!("- {}\n", meta.label()));
            }
            user.push('\n');
        }
        if !context.is_empty() {
            user.push_str("Recent conversation:\n");
            for turn in context {
                user.push_str(&format!("- user: {}\n", truncate(&turn.user, MAX_TURN_CHARS)));
                user.push_str(&format!(
                    "- assistant: {}\n",
                    truncate(&turn.assistant, MAX_TURN_CHARS)
                ));
            }
            user.push('\n');
        }
        user.push_str(&format!("Question:\n{}\n", utterance));
        (system, user)
    }

    fn interpret(&self, output: &str) -> Classification {
        let Some(json) = extract_json(output) else {
            warn!("LLM output did not contain JSON");
            return unresolvable();
        };
        let decision: LlmDecision = match serde_json::from_str(&json) {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "LLM decision did not parse");
                return unresolvable();
            }
        };

        match decision.decision.to_ascii_lowercase().as_str() {
            "conversational" => match decision.reply {
                Some(reply) if !reply.trim().is_empty() => Classification::Conversational { reply },
                _ => unresolvable(),
            },
            "unresolvable" => Classification::Unresolvable {
                question: decision
                    .question
                    .filter(|q| !q.trim().is_empty())
                    .unwrap_or_else(|| FALLBACK_QUESTION.to_string()),
            },
            "retrieval" => self.to_retrieval(decision),
            other => {
                warn!(decision = %other, "Unknown LLM decision");
                unresolvable()
            }
        }
    }

    fn to_retrieval(&self, d: LlmDecision) -> Classification {
        let Some(entity) = d.entity else {
            return unresolvable();
        };

        let mut filters = QueryFilters {
            team_id: d.team_id,
            player_id: d.player_id,
            period: d.period,
            limit: d.limit.filter(|l| *l > 0),
            ..Default::default()
        };
        if let (Some(start), Some(end)) = (d.frame_start, d.frame_end) {
            filters.frame_window = Some(Window::new(start, end));
        }
        if let (Some(start), Some(end)) = (d.minute_start, d.minute_end) {
            filters.time_window = Some(Window::new(start * 60.0, end * 60.0));
        }
        if entity == EntityKind::Events {
            filters.event_types = d
                .event_types
                .into_iter()
                .filter(|t| self.config.event_types.iter().any(|k| k == t))
                .collect();
        }

        let mut intent = RetrievalIntent::new(entity);
        intent.match_id = d.match_id.filter(|m| !m.trim().is_empty());
        intent.event = d.event_id.filter(|id| !id.trim().is_empty()).map(|id| {
            if id.eq_ignore_ascii_case("previous") {
                EventRef::Previous
            } else {
                EventRef::Id(id)
            }
        });
        if entity == EntityKind::Tracking {
            filters.order = d.order.unwrap_or_default();
            intent.sql = d.sql.filter(|q| !q.trim().is_empty());
        }
        intent.cluster = entity == EntityKind::Tracking && d.cluster && !filters.order.is_by_speed();
        intent.filters = filters;
        Classification::Retrieval(intent)
    }
}

#[async_trait]
impl<C: LlmClient> IntentClassifier for LlmClassifier<C> {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn classify(
        &self,
        utterance: &str,
        context: &[Turn],
        catalog: &MatchCatalog,
    ) -> Result<Classification, ClassifierError> {
        let (system, user) = self.build_prompt(utterance, context, catalog);
        debug!(
            model = %self.config.model,
            context_turns = context.len(),
            "Classifier request prepared"
        );

        let output = self
            .client
            .complete(LlmRequest {
                system,
                user,
                model: self.config.model.clone(),
                temperature: self.config.temperature,
            })
            .await?;

        debug!(
            llm_output = %truncate(&output, MAX_LLM_OUTPUT_LOG_CHARS),
            "Classifier raw output"
        );
        Ok(self.interpret(&output))
    }
}

fn unresolvable() -> Classification {
    Classification::Unresolvable {
        question: FALLBACK_QUESTION.to_string(),
    }
}

fn extract_json(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(text[start..=end].to_string())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}
