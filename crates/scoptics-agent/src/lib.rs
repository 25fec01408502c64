//! Conversational query agent for Scoptics.
//!
//! Resolves natural-language questions about a match into bounded
//! read-only retrievals over tracking records and tactical events, and
//! composes hybrid text and data replies. Conversation state is owned by
//! the caller and passed through every call.

pub mod catalog;
pub mod classifier;
pub mod cluster;
pub mod context;
pub mod error;
pub mod executor;
pub mod gemini;
pub mod llm;
pub mod orchestrator;
pub mod plan;
pub mod resolver;
pub mod response;
pub mod rules;

pub use catalog::MatchCatalog;
pub use classifier::{Classification, ClassifierError, EventRef, IntentClassifier, RetrievalIntent};
pub use cluster::{cluster_frames, cluster_records, FrameCluster};
pub use context::{ConversationState, FollowUpContext, Turn, TurnContext};
pub use error::AgentError;
pub use executor::{Outcome, QueryExecutor, RowSet, Rows};
pub use gemini::{GeminiClient, GeminiClientConfig};
pub use llm::{LlmClassifier, LlmClassifierConfig, LlmClient, LlmError, LlmRequest};
pub use orchestrator::{AgentFailure, AgentOrchestrator};
pub use plan::{RetrievalPlan, Scope};
pub use resolver::{IntentResolver, Resolution};
pub use response::{AgentResponse, ResponseComposer};
pub use rules::RuleClassifier;
