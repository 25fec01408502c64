//! Intent resolution: utterance plus conversation state to a plan.

use std::sync::Arc;

use tracing::{debug, warn};

use scoptics_core::types::EntityKind;

use crate::catalog::MatchCatalog;
use crate::classifier::{Classification, EventRef, IntentClassifier, RetrievalIntent};
use crate::context::{ConversationState, TurnContext};
use crate::error::AgentError;
use crate::plan::{RetrievalPlan, Scope};

/// Outcome of resolving one utterance.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    /// Answer without touching the store.
    Conversational { reply: String },
    /// Fetch according to `plan`; `context` is recorded on the new turn.
    Retrieve {
        plan: RetrievalPlan,
        context: TurnContext,
    },
    /// Ask the user to clarify. `cause` is the error recovered into the
    /// question, if any.
    Clarify {
        question: String,
        cause: Option<AgentError>,
    },
}

pub struct IntentResolver {
    classifier: Arc<dyn IntentClassifier>,
    catalog: Arc<MatchCatalog>,
    context_turns: usize,
    max_rows: usize,
}

impl IntentResolver {
    pub fn new(
        classifier: Arc<dyn IntentClassifier>,
        catalog: Arc<MatchCatalog>,
        context_turns: usize,
        max_rows: usize,
    ) -> Self {
        Self {
            classifier,
            catalog,
            context_turns,
            max_rows: max_rows.max(1),
        }
    }

    pub fn classifier_name(&self) -> &'static str {
        self.classifier.name()
    }

    /// Resolve `utterance` against the last `context_turns` turns of `state`.
    pub async fn resolve(&self, utterance: &str, state: &ConversationState) -> Resolution {
        let context = state.recent(self.context_turns);
        let classification = match self
            .classifier
            .classify(utterance, context, &self.catalog)
            .await
        {
            Ok(c) => c,
            Err(e) => {
                warn!(
                    classifier = self.classifier.name(),
                    error = %e,
                    "Classification failed"
                );
                return Resolution::Clarify {
                    question: "Sorry, I couldn't interpret that request right now. \
                               Could you try again?"
                        .to_string(),
                    cause: Some(AgentError::Classifier(e.to_string())),
                };
            }
        };

        match classification {
            Classification::Conversational { reply } => Resolution::Conversational { reply },
            Classification::Unresolvable { question } => Resolution::Clarify {
                question,
                cause: None,
            },
            Classification::Retrieval(intent) => self.plan(intent, state),
        }
    }

    fn plan(&self, intent: RetrievalIntent, state: &ConversationState) -> Resolution {
        // "that event" belongs to the match it was found in, not to
        // whichever match the conversation moved on to.
        let (event_id, event_match) = match &intent.event {
            Some(EventRef::Id(id)) => (Some(id.clone()), None),
            Some(EventRef::Previous) => match state.last_event() {
                Some((id, match_id)) => (Some(id.to_string()), match_id.map(str::to_string)),
                None => {
                    return Resolution::Clarify {
                        question: "Which event do you mean? Ask for the event first or give \
                                   its id."
                            .to_string(),
                        cause: None,
                    }
                }
            },
            None => (None, None),
        };

        let named = intent.match_id.as_deref().or(event_match.as_deref());
        let Some(match_id) = self.resolve_match(named, state) else {
            debug!("No match named or referenced");
            return Resolution::Clarify {
                question: self.match_question(),
                cause: Some(AgentError::AmbiguousMatch),
            };
        };

        let mut filters = intent.filters;
        let requested = filters.limit.unwrap_or(self.max_rows);
        filters.limit = Some(requested.min(self.max_rows));

        let context = TurnContext {
            match_id: Some(match_id.clone()),
            entity: Some(intent.entity),
            event_types: filters.event_types.clone(),
            event_id: event_id.clone(),
        };

        let mut scope = Scope::new(match_id, filters);
        let plan = match (intent.entity, event_id, intent.sql) {
            (EntityKind::Events, event_id, _) => {
                scope.filters.event_id = event_id;
                RetrievalPlan::Events(scope)
            }
            (EntityKind::Tracking, Some(event_id), _) => {
                scope.cluster = intent.cluster;
                RetrievalPlan::Correlated { scope, event_id }
            }
            (EntityKind::Tracking, None, Some(sql)) => {
                scope.cluster = intent.cluster;
                RetrievalPlan::Dynamic { scope, sql }
            }
            (EntityKind::Tracking, None, None) => {
                scope.cluster = intent.cluster;
                RetrievalPlan::Tracking(scope)
            }
        };

        Resolution::Retrieve { plan, context }
    }

    /// Named match, else the last referenced one, else the only known one.
    fn resolve_match(&self, named: Option<&str>, state: &ConversationState) -> Option<String> {
        if let Some(id) = named {
            return Some(
                self.catalog
                    .get(id)
                    .map(|m| m.match_id.clone())
                    .unwrap_or_else(|| id.to_string()),
            );
        }
        if let Some(id) = state.last_match() {
            return Some(id.to_string());
        }
        match self.catalog.matches() {
            [only] => Some(only.match_id.clone()),
            _ => None,
        }
    }

    fn match_question(&self) -> String {
        if self.catalog.is_empty() {
            return "Which match are you asking about? Please give its match id.".to_string();
        }
        let labels: Vec<String> = self.catalog.matches().iter().map(|m| m.label()).collect();
        format!(
            "Which match are you asking about? Available matches: {}.",
            labels.join("; ")
        )
    }
}
