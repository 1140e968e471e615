use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::utils::{
    error::{McpError, McpResult},
    types::QueryResponse,
};

/// Concurrent keyed cache of query responses, evicted by age
#[derive(Debug, Default)]
pub struct ResultStore {
    entries: DashMap<String, QueryResponse>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the response stored under its id
    pub fn put(&self, response: QueryResponse) {
        self.entries.insert(response.id.clone(), response);
    }

    pub fn get(&self, id: &str) -> McpResult<QueryResponse> {
        self.entries
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| McpError::NotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Remove every response created before `cutoff`; returns how many went
    pub fn evict_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, response| {
            let keep = response.created_at >= cutoff;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
