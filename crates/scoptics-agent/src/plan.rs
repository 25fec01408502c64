//! Retrieval plans: what the executor must fetch for one turn.

use scoptics_core::types::EntityKind;
use scoptics_storage::QueryFilters;

/// Match scope and filters shared by every plan that reaches the store.
#[derive(Clone, Debug, PartialEq)]
pub struct Scope {
    pub match_id: String,
    /// Filters passed to the store. `limit` is always set and never exceeds
    /// the store cap.
    pub filters: QueryFilters,
    /// Group tracking rows into continuous segments.
    pub cluster: bool,
}

impl Scope {
    pub fn new(match_id: impl Into<String>, filters: QueryFilters) -> Self {
        Self {
            match_id: match_id.into(),
            filters,
            cluster: false,
        }
    }

    pub fn limit(&self) -> Option<usize> {
        self.filters.limit
    }
}

/// A transient description of the store calls for one turn.
#[derive(Clone, Debug, PartialEq)]
pub enum RetrievalPlan {
    /// Nothing to fetch. Never reaches the store.
    None,
    /// One events fetch.
    Events(Scope),
    /// One tracking fetch.
    Tracking(Scope),
    /// Look up `event_id` first, then fetch tracking bounded to its frame
    /// span. `scope.filters` apply to the tracking fetch.
    Correlated { scope: Scope, event_id: String },
    /// One caller-written read over the match's tracking rows. Only
    /// `scope.limit()` and `scope.cluster` apply.
    Dynamic { scope: Scope, sql: String },
}

impl RetrievalPlan {
    /// Entity the returned rows belong to.
    pub fn entity(&self) -> Option<EntityKind> {
        match self {
            RetrievalPlan::None => None,
            RetrievalPlan::Events(_) => Some(EntityKind::Events),
            RetrievalPlan::Tracking(_)
            | RetrievalPlan::Correlated { .. }
            | RetrievalPlan::Dynamic { .. } => Some(EntityKind::Tracking),
        }
    }

    pub fn scope(&self) -> Option<&Scope> {
        match self {
            RetrievalPlan::None => None,
            RetrievalPlan::Events(scope)
            | RetrievalPlan::Tracking(scope)
            | RetrievalPlan::Correlated { scope, .. }
            | RetrievalPlan::Dynamic { scope, .. } => Some(scope),
        }
    }

    pub fn match_id(&self) -> Option<&str> {
        self.scope().map(|s| s.match_id.as_str())
    }

    /// Event id the plan is anchored to, if any.
    pub fn event_id(&self) -> Option<&str> {
        match self {
            RetrievalPlan::Correlated { event_id, .. } => Some(event_id),
            RetrievalPlan::Events(scope) => scope.filters.event_id.as_deref(),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, RetrievalPlan::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_accessors() {
        assert_eq!(RetrievalPlan::None.entity(), None);
        assert!(RetrievalPlan::None.match_id().is_none());

        let plan = RetrievalPlan::Correlated {
            scope: Scope::new("match_1", QueryFilters::default()),
            event_id: "E1".to_string(),
        };
        assert_eq!(plan.entity(), Some(EntityKind::Tracking));
        assert_eq!(plan.match_id(), Some("match_1"));
        assert_eq!(plan.event_id(), Some("E1"));

        let filters = QueryFilters {
            event_id: Some("E2".to_string()),
            ..Default::default()
        };
        let plan = RetrievalPlan::Events(Scope::new("match_1", filters));
        assert_eq!(plan.entity(), Some(EntityKind::Events));
        assert_eq!(plan.event_id(), Some("E2"));

        let plan = RetrievalPlan::Dynamic {
            scope: Scope::new("match_2", QueryFilters::default()),
            sql: "SELECT MAX(speed) FROM tracking".to_string(),
        };
        assert_eq!(plan.entity(), Some(EntityKind::Tracking));
        assert_eq!(plan.match_id(), Some("match_2"));
        assert!(plan.event_id().is_none());
    }
}
