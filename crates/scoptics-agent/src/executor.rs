//! Query execution: a retrieval plan to data store calls.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use scoptics_core::types::{EntityKind, Event, TrackingRecord};
use scoptics_storage::{
    DataStore, Fetched, QueryFilters, Record, StoreError, StoreErrorKind, TrackingOrder, Window,
};

use crate::cluster::{cluster_frames, cluster_records, FrameCluster};
use crate::error::AgentError;
use crate::plan::{RetrievalPlan, Scope};

/// Rows produced by a plan.
#[derive(Clone, Debug, PartialEq)]
pub enum Rows {
    Events(Vec<Event>),
    Tracking(Vec<TrackingRecord>),
    Clusters(Vec<FrameCluster>),
    /// Rows of a dynamic tracking query, as the query shaped them.
    Records(Vec<Record>),
}

impl Rows {
    pub fn len(&self) -> usize {
        match self {
            Rows::Events(rows) => rows.len(),
            Rows::Tracking(rows) => rows.len(),
            Rows::Clusters(rows) => rows.len(),
            Rows::Records(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entity(&self) -> EntityKind {
        match self {
            Rows::Events(_) => EntityKind::Events,
            Rows::Tracking(_) | Rows::Clusters(_) | Rows::Records(_) => EntityKind::Tracking,
        }
    }

    /// Rows as JSON objects for the outbound payload.
    pub fn to_values(&self) -> Vec<serde_json::Value> {
        fn values<T: Serialize>(rows: &[T]) -> Vec<serde_json::Value> {
            rows.iter()
                .filter_map(|r| serde_json::to_value(r).ok())
                .collect()
        }
        match self {
            Rows::Events(rows) => values(rows),
            Rows::Tracking(rows) => values(rows),
            Rows::Clusters(rows) => values(rows),
            Rows::Records(rows) => rows.iter().cloned().map(serde_json::Value::Object).collect(),
        }
    }
}

/// Successful fetch result.
#[derive(Clone, Debug, PartialEq)]
pub struct RowSet {
    pub match_id: String,
    pub rows: Rows,
    /// The store cap cut the result short.
    pub truncated: bool,
    /// Event a correlated fetch was bounded by.
    pub anchor: Option<Event>,
    /// Order the tracking rows were fetched in.
    pub order: TrackingOrder,
}

/// What executing a plan produced.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// The plan had no target; the store was not called.
    Skipped,
    Rows(RowSet),
    /// A correlated plan's event does not exist in the match.
    EventNotFound { match_id: String, event_id: String },
}

/// Runs retrieval plans against a [`DataStore`].
///
/// Store calls are blocking and run on the blocking thread pool. Failures
/// are not retried.
pub struct QueryExecutor {
    store: Arc<dyn DataStore>,
    max_frame_gap: i64,
}

impl QueryExecutor {
    pub fn new(store: Arc<dyn DataStore>, max_frame_gap: i64) -> Self {
        Self {
            store,
            max_frame_gap: max_frame_gap.max(0),
        }
    }

    pub async fn execute(&self, plan: &RetrievalPlan) -> Result<Outcome, AgentError> {
        match plan {
            RetrievalPlan::None => Ok(Outcome::Skipped),
            RetrievalPlan::Events(scope) => {
                let fetched = self.events(&scope.match_id, scope.filters.clone()).await?;
                Ok(Outcome::Rows(RowSet {
                    match_id: scope.match_id.clone(),
                    rows: Rows::Events(fetched.rows),
                    truncated: fetched.truncated,
                    anchor: None,
                    order: TrackingOrder::Frame,
                }))
            }
            RetrievalPlan::Tracking(scope) => {
                let fetched = self.tracking(&scope.match_id, scope.filters.clone()).await?;
                Ok(Outcome::Rows(self.tracking_rows(scope, fetched, None)))
            }
            RetrievalPlan::Correlated { scope, event_id } => self.correlated(scope, event_id).await,
            RetrievalPlan::Dynamic { scope, sql } => self.dynamic(scope, sql).await,
        }
    }

    /// A caller-written read; clustered when asked and the rows carry frames.
    async fn dynamic(&self, scope: &Scope, sql: &str) -> Result<Outcome, AgentError> {
        let match_id = scope.match_id.clone();
        let sql = sql.to_string();
        let limit = scope.limit();
        let fetched = self
            .blocking(move |store| store.run_tracking_query(&match_id, &sql, limit))
            .await?;

        let clusters = if scope.cluster {
            cluster_records(&fetched.rows, &scope.match_id, self.max_frame_gap)
        } else {
            None
        };
        let rows = match clusters {
            Some(clusters) => Rows::Clusters(clusters),
            None => Rows::Records(fetched.rows),
        };
        Ok(Outcome::Rows(RowSet {
            match_id: scope.match_id.clone(),
            rows,
            truncated: fetched.truncated,
            anchor: None,
            order: TrackingOrder::Frame,
        }))
    }

    /// Events first to find the frame span, then tracking inside it.
    async fn correlated(&self, scope: &Scope, event_id: &str) -> Result<Outcome, AgentError> {
        let lookup = QueryFilters {
            event_id: Some(event_id.to_string()),
            limit: Some(1),
            ..Default::default()
        };
        let Some(event) = self
            .events(&scope.match_id, lookup)
            .await?
            .rows
            .into_iter()
            .next()
        else {
            info!(match_id = %scope.match_id, event_id = %event_id, "Anchor event not found");
            return Ok(Outcome::EventNotFound {
                match_id: scope.match_id.clone(),
                event_id: event_id.to_string(),
            });
        };
        if !event.is_well_formed() {
            return Err(AgentError::RetrievalFailed {
                kind: StoreErrorKind::Malformed,
                message: format!(
                    "event {} ends before it starts (frames {} to {})",
                    event.event_id, event.start_frame, event.end_frame
                ),
            });
        }

        let span = Window::new(event.start_frame, event.end_frame);
        let mut filters = scope.filters.clone();
        filters.frame_window = Some(span);
        filters.event_id = None;
        filters.event_types.clear();

        let mut fetched = self.tracking(&scope.match_id, filters).await?;
        fetched.rows.retain(|r| span.contains(r.frame));
        debug!(
            event_id = %event.event_id,
            start_frame = event.start_frame,
            end_frame = event.end_frame,
            rows = fetched.rows.len(),
            "Tracking bounded to event span"
        );
        Ok(Outcome::Rows(self.tracking_rows(scope, fetched, Some(event))))
    }

    fn tracking_rows(
        &self,
        scope: &Scope,
        fetched: Fetched<TrackingRecord>,
        anchor: Option<Event>,
    ) -> RowSet {
        let rows = if scope.cluster {
            Rows::Clusters(cluster_frames(&fetched.rows, self.max_frame_gap))
        } else {
            Rows::Tracking(fetched.rows)
        };
        RowSet {
            match_id: scope.match_id.clone(),
            rows,
            truncated: fetched.truncated,
            anchor,
            order: scope.filters.order,
        }
    }

    async fn events(
        &self,
        match_id: &str,
        filters: QueryFilters,
    ) -> Result<Fetched<Event>, AgentError> {
        let match_id = match_id.to_string();
        self.blocking(move |store| store.fetch_events(&match_id, &filters))
            .await
    }

    async fn tracking(
        &self,
        match_id: &str,
        filters: QueryFilters,
    ) -> Result<Fetched<TrackingRecord>, AgentError> {
        let match_id = match_id.to_string();
        self.blocking(move |store| store.fetch_tracking(&match_id, &filters))
            .await
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, AgentError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn DataStore) -> Result<T, StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let result = tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(|e| AgentError::RetrievalFailed {
                kind: StoreErrorKind::Unavailable,
                message: format!("store task failed: {}", e),
            })?;
        result.map_err(AgentError::from)
    }
}
