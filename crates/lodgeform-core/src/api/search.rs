//! Query-keyed lodge search cache.
//!
//! Repeated queries are answered from memory. A query that is already being
//! fetched is skipped rather than queued, so a burst of identical keystrokes
//! produces a single request. Cached results only cover the grand lodge most
//! recently searched, and are dropped once too many queries pile up.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::debug;

use crate::models::Lodge;

use super::BackendClient;

/// Shorter queries are not sent to the backend.
pub const MIN_QUERY_LEN: usize = 2;

/// Cached queries kept before the cache is emptied.
pub const MAX_CACHED_QUERIES: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SearchKey {
    grand_lodge_id: Option<String>,
    query: String,
}

impl SearchKey {
    fn new(grand_lodge_id: Option<&str>, query: &str) -> Self {
        Self {
            grand_lodge_id: grand_lodge_id.map(str::to_string),
            query: query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Cached(Vec<Lodge>),
    Fetched(Vec<Lodge>),
    /// An identical query is already in flight.
    Skipped,
    TooShort,
}

impl SearchOutcome {
    pub fn lodges(&self) -> Option<&[Lodge]> {
        match self {
            SearchOutcome::Cached(lodges) | SearchOutcome::Fetched(lodges) => Some(lodges),
            SearchOutcome::Skipped | SearchOutcome::TooShort => None,
        }
    }
}

#[derive(Debug, Default)]
struct SearchState {
    /// Grand lodge the cached results belong to.
    scope: Option<String>,
    results: HashMap<SearchKey, Vec<Lodge>>,
    in_flight: HashSet<SearchKey>,
}

impl SearchState {
    fn rescope(&mut self, grand_lodge_id: &Option<String>) {
        if &self.scope != grand_lodge_id {
            if !self.results.is_empty() {
                debug!(from = ?self.scope, to = ?grand_lodge_id, "Grand lodge changed, dropping cached searches");
            }
            self.results.clear();
            self.scope = grand_lodge_id.clone();
        }
    }

    fn store(&mut self, key: SearchKey, lodges: Vec<Lodge>) {
        if key.grand_lodge_id != self.scope {
            return;
        }
        if self.results.len() >= MAX_CACHED_QUERIES {
            debug!(cached = self.results.len(), "Search cache full, clearing");
            self.results.clear();
        }
        self.results.insert(key, lodges);
    }
}

/// Shared between the UI and background search tasks; clones share state.
#[derive(Debug, Clone, Default)]
pub struct LodgeSearchCache {
    state: Arc<Mutex<SearchState>>,
}

impl LodgeSearchCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn search(
        &self,
        client: &BackendClient,
        grand_lodge_id: Option<&str>,
        query: &str,
    ) -> Result<SearchOutcome> {
        self.search_with(grand_lodge_id, query, || client.search_lodges(grand_lodge_id, query))
            .await
    }

    /// Run `fetch` unless the query is cached or already in flight.
    pub async fn search_with<F, Fut>(
        &self,
        grand_lodge_id: Option<&str>,
        query: &str,
        fetch: F,
    ) -> Result<SearchOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Lodge>>>,
    {
        let key = SearchKey::new(grand_lodge_id, query);
        if key.query.chars().count() < MIN_QUERY_LEN {
            return Ok(SearchOutcome::TooShort);
        }

        {
            let mut state = self.state.lock().await;
            state.rescope(&key.grand_lodge_id);
            if let Some(lodges) = state.results.get(&key) {
                return Ok(SearchOutcome::Cached(lodges.clone()));
            }
            if !state.in_flight.insert(key.clone()) {
                debug!(query = %key.query, "Search already in flight, skipping");
                return Ok(SearchOutcome::Skipped);
            }
        }

        let result = fetch().await;

        let mut state = self.state.lock().await;
        state.in_flight.remove(&key);
        let lodges = result?;
        state.store(key, lodges.clone());
        Ok(SearchOutcome::Fetched(lodges))
    }

    pub async fn is_in_flight(&self, grand_lodge_id: Option<&str>, query: &str) -> bool {
        let key = SearchKey::new(grand_lodge_id, query);
        self.state.lock().await.in_flight.contains(&key)
    }

    pub async fn cached_len(&self) -> usize {
        self.state.lock().await.results.len()
    }
}
