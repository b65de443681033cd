//! Container path resolution

use pfind_core::{
    AmbiguityPolicy, ChildQuery, ContainerId, EntryKind, Error, ObjectStore, PathSpec, Result,
};
use std::sync::Arc;

/// Outcome of walking a [`PathSpec`]. Absence is a value, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(ContainerId),
    /// No container named `segment` exists at position `index`.
    Missing { index: usize, segment: String },
    /// Several containers share the name and the policy refused to choose.
    Ambiguous {
        index: usize,
        segment: String,
        candidates: usize,
    },
}

impl Resolution {
    pub fn container(&self) -> Option<&ContainerId> {
        match self {
            Resolution::Resolved(id) => Some(id),
            _ => None,
        }
    }

    pub fn into_container(self) -> Option<ContainerId> {
        match self {
            Resolution::Resolved(id) => Some(id),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Resolution::Resolved(_) => "resolved",
            Resolution::Missing { .. } => "missing",
            Resolution::Ambiguous { .. } => "ambiguous",
        }
    }
}

/// Walks container names from an anchor down to a target container.
#[derive(Clone)]
pub struct PathResolver {
    store: Arc<dyn ObjectStore>,
    policy: AmbiguityPolicy,
}

impl PathResolver {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            policy: AmbiguityPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: AmbiguityPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Resolve `path` starting at `anchor`.
    ///
    /// Each segment is matched exactly against non-deleted child containers of
    /// the current container. The walk stops at the first segment that does
    /// not resolve; no later segment is looked up. Only store transport
    /// failures are returned as `Err`.
    pub async fn resolve(&self, anchor: &ContainerId, path: &PathSpec) -> Result<Resolution> {
        let mut current = anchor.clone();

        for (index, segment) in path.segments().iter().enumerate() {
            let query = ChildQuery::children_of(&current)
                .named(segment.as_str())
                .of_kind(EntryKind::Container);

            let candidates = match self.store.list_children(&query).await {
                Ok(candidates) => candidates,
                // The container we are standing in vanished between calls.
                Err(Error::NotFound(_)) => Vec::new(),
                Err(e) => return Err(e),
            };
            let count = candidates.len();

            if count > 1 {
                tracing::warn!(
                    path = %path,
                    segment = %segment,
                    candidates = count,
                    policy = ?self.policy,
                    "ambiguous container name"
                );
            }

            let outcome = match self.policy.pick(candidates) {
                Some(entry) => {
                    tracing::debug!(segment = %segment, id = %entry.id, "resolved path segment");
                    current = ContainerId::new(entry.id);
                    continue;
                }
                None if count == 0 => Resolution::Missing {
                    index,
                    segment: segment.clone(),
                },
                None => Resolution::Ambiguous {
                    index,
                    segment: segment.clone(),
                    candidates: count,
                },
            };

            tracing::debug!(path = %path, index, outcome = outcome.kind(), "path not resolved");
            return Ok(outcome);
        }

        Ok(Resolution::Resolved(current))
    }
}
