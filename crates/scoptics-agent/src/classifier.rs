//! Classification capability shared by the rule-based and LLM strategies.

use async_trait::async_trait;

use scoptics_core::types::EntityKind;
use scoptics_storage::QueryFilters;

use crate::catalog::MatchCatalog;
use crate::context::Turn;
use crate::llm::LlmError;

/// Reference to the event a correlated tracking query is bounded by.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventRef {
    /// An explicit event id from the utterance.
    Id(String),
    /// "that event" / "this event": the last single event in the conversation.
    Previous,
}

/// A retrieval the utterance asks for, before match fallback and bounds.
#[derive(Clone, Debug, PartialEq)]
pub struct RetrievalIntent {
    pub entity: EntityKind,
    /// Match named by the utterance, if any.
    pub match_id: Option<String>,
    pub filters: QueryFilters,
    /// Event the query is anchored to. Tracking is bounded to its frame
    /// span; an events query selects it.
    pub event: Option<EventRef>,
    /// Group tracking frames into continuous moments.
    pub cluster: bool,
    /// A read-only query over the match's tracking rows, for questions the
    /// filters cannot express.
    pub sql: Option<String>,
}

impl RetrievalIntent {
    pub fn new(entity: EntityKind) -> Self {
        Self {
            entity,
            match_id: None,
            filters: QueryFilters::default(),
            event: None,
            cluster: false,
            sql: None,
        }
    }
}

/// Outcome of classifying one utterance.
#[derive(Clone, Debug, PartialEq)]
pub enum Classification {
    /// No data needed; answer with `reply`.
    Conversational { reply: String },
    /// Data needed.
    Retrieval(RetrievalIntent),
    /// Could not be mapped with acceptable confidence; ask `question`.
    Unresolvable { question: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("language model unavailable: {0}")]
    Llm(#[from] LlmError),
}

/// Maps an utterance plus recent turns to a [`Classification`].
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Short strategy name for logs.
    fn name(&self) -> &'static str;

    async fn classify(
        &self,
        utterance: &str,
        context: &[Turn],
        catalog: &MatchCatalog,
    ) -> Result<Classification, ClassifierError>;
}
