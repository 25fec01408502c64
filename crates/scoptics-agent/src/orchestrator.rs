//! Agent orchestrator: entry point for one conversational turn.
//!
//! Drives intent resolution, query execution and response composition in
//! sequence. Holds no per-conversation state; the caller passes the history
//! in and gets it back with one more turn.

use std::sync::Arc;

use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use scoptics_core::config::AgentConfig;
use scoptics_storage::DataStore;

use crate::catalog::MatchCatalog;
use crate::classifier::IntentClassifier;
use crate::context::ConversationState;
use crate::error::AgentError;
use crate::executor::QueryExecutor;
use crate::resolver::{IntentResolver, Resolution};
use crate::response::{AgentResponse, ResponseComposer};

/// A failure that must reach the caller as an error.
///
/// `updated_history` is the history to keep: unchanged for rejected input,
/// with an apology turn appended for fatal retrieval failures.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct AgentFailure {
    pub error: AgentError,
    pub updated_history: ConversationState,
}

/// Coordinates resolver, executor and composer.
pub struct AgentOrchestrator {
    resolver: IntentResolver,
    executor: QueryExecutor,
    composer: ResponseComposer,
    max_query_length: usize,
}

impl AgentOrchestrator {
    /// Build an orchestrator over a store and a catalog snapshot.
    pub fn new(
        config: &AgentConfig,
        max_rows: usize,
        classifier: Arc<dyn IntentClassifier>,
        store: Arc<dyn DataStore>,
        catalog: Arc<MatchCatalog>,
    ) -> Self {
        Self {
            resolver: IntentResolver::new(
                classifier,
                Arc::clone(&catalog),
                config.context_turns,
                max_rows,
            ),
            executor: QueryExecutor::new(store, config.max_frame_gap),
            composer: ResponseComposer::new(catalog, config.max_history_turns),
            max_query_length: config.max_query_length,
        }
    }

    pub fn classifier_name(&self) -> &'static str {
        self.resolver.classifier_name()
    }

    /// Handle one utterance.
    pub async fn handle(
        &self,
        query: &str,
        history: ConversationState,
    ) -> Result<AgentResponse, AgentFailure> {
        let request_id = Uuid::new_v4();
        let span = info_span!("agent_query", request_id = %request_id);
        self.handle_turn(query, history).instrument(span).await
    }

    async fn handle_turn(
        &self,
        query: &str,
        history: ConversationState,
    ) -> Result<AgentResponse, AgentFailure> {
        let utterance = query.trim();
        if let Err(error) = self.validate(utterance) {
            debug!(error = %error, "Query rejected");
            return Err(AgentFailure {
                error,
                updated_history: history,
            });
        }

        info!(
            history_turns = history.len(),
            classifier = self.resolver.classifier_name(),
            "Handling query"
        );

        let (plan, context) = match self.resolver.resolve(utterance, &history).await {
            Resolution::Conversational { reply } => {
                debug!("Conversational reply");
                return Ok(self.composer.reply(&history, utterance, &reply));
            }
            Resolution::Clarify { question, cause } => {
                debug!(cause = ?cause, "Asking for clarification");
                return Ok(self.composer.reply(&history, utterance, &question));
            }
            Resolution::Retrieve { plan, context } => (plan, context),
        };

        info!(
            entity = ?plan.entity(),
            match_id = ?plan.match_id(),
            event_id = ?plan.event_id(),
            "Executing retrieval plan"
        );

        match self.executor.execute(&plan).await {
            Ok(outcome) => {
                let response = self
                    .composer
                    .retrieved(&history, utterance, context, &outcome);
                info!(rows = response.data.len(), "Query answered");
                Ok(response)
            }
            Err(error) if error.is_fatal() => {
                warn!(error = %error, "Retrieval refused");
                let apology = self.composer.failure(&history, utterance, &error);
                Err(AgentFailure {
                    error,
                    updated_history: apology.updated_history,
                })
            }
            Err(error) => {
                warn!(error = %error, "Retrieval failed");
                Ok(self.composer.failure(&history, utterance, &error))
            }
        }
    }

    fn validate(&self, utterance: &str) -> Result<(), AgentError> {
        if utterance.is_empty() {
            return Err(AgentError::EmptyQuery);
        }
        if utterance.chars().count() > self.max_query_length {
            return Err(AgentError::QueryTooLong(self.max_query_length));
        }
        Ok(())
    }
}
