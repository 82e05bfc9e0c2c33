//! In-process implementation of `RemoteClient`.
//!
//! Tables are plain vectors of JSON rows guarded by a mutex, so every single
//! operation is atomic, the same guarantee a row-level write gets from the
//! real backend. Call counters, injected failures, and artificial latency
//! make it usable as a test double.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use super::query::{Filter, Page, Query};
use super::{ApiError, RemoteClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Query,
    Insert,
    Update,
    Delete,
}

#[derive(Default)]
struct MemoryState {
    tables: HashMap<String, Vec<Value>>,
    unique: HashMap<String, Vec<Vec<String>>>,
    calls: HashMap<(String, Operation), usize>,
    failures: HashMap<String, VecDeque<String>>,
    latency: Option<Duration>,
    next_id: u64,
}

impl MemoryState {
    fn record_call(&mut self, table: &str, op: Operation) -> Result<(), ApiError> {
        *self.calls.entry((table.to_string(), op)).or_default() += 1;
        match self.failures.get_mut(table).and_then(VecDeque::pop_front) {
            Some(message) => Err(ApiError::ServerError(message)),
            None => Ok(()),
        }
    }

    fn violates_unique(&self, table: &str, row: &Value) -> Option<String> {
        let constraints = self.unique.get(table)?;
        let existing = self.tables.get(table)?;
        constraints.iter().find_map(|columns| {
            let clash = existing
                .iter()
                .any(|other| columns.iter().all(|c| other.get(c) == row.get(c)));
            clash.then(|| format!("{}_{}_key", table, columns.join("_")))
        })
    }
}

#[derive(Default)]
pub struct MemoryClient {
    state: Mutex<MemoryState>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a table with rows, replacing whatever it held.
    pub fn with_rows(self, table: &str, rows: Vec<Value>) -> Self {
        self.state().tables.insert(table.to_string(), rows);
        self
    }

    /// Reject inserts that repeat an existing combination of `columns`.
    pub fn with_unique(self, table: &str, columns: &[&str]) -> Self {
        self.state()
            .unique
            .entry(table.to_string())
            .or_default()
            .push(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Delay every operation by `latency` before it touches the tables.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state().latency = latency;
    }

    /// Make the next operation on `table` fail with a server error.
    pub fn fail_next(&self, table: &str, message: &str) {
        self.state()
            .failures
            .entry(table.to_string())
            .or_default()
            .push_back(message.to_string());
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.state().tables.get(table).cloned().unwrap_or_default()
    }

    pub fn calls(&self, table: &str, op: Operation) -> usize {
        self.state()
            .calls
            .get(&(table.to_string(), op))
            .copied()
            .unwrap_or(0)
    }

    async fn simulate_latency(&self) {
        let latency = self.state().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl RemoteClient for MemoryClient {
    async fn query(&self, query: &Query) -> Result<Page, ApiError> {
        self.simulate_latency().await;
        let mut state = self.state();
        state.record_call(&query.table, Operation::Query)?;

        let mut rows: Vec<Value> = state
            .tables
            .get(&query.table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| query.filters.iter().all(|f| f.matches(row)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by(|a, b| query.compare_rows(a, b));

        let total = query.count.then_some(rows.len());
        if let Some(range) = query.range {
            rows = rows.into_iter().skip(range.offset).take(range.limit).collect();
        }

        debug!(table = %query.table, returned = rows.len(), "Memory query");
        Ok(Page { rows, total })
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, ApiError> {
        self.simulate_latency().await;
        let mut state = self.state();
        state.record_call(table, Operation::Insert)?;

        let Value::Object(mut fields) = row else {
            return Err(ApiError::InvalidResponse(format!("Insert into {} expects an object", table)));
        };

        state.next_id += 1;
        let next_id = state.next_id;
        fields
            .entry("id")
            .or_insert_with(|| Value::String(format!("{}-{}", table, next_id)));
        fields
            .entry("created_at")
            .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
        let row = Value::Object(fields);

        if let Some(constraint) = state.violates_unique(table, &row) {
            return Err(ApiError::Conflict(format!(
                "duplicate key value violates unique constraint \"{}\" (23505)",
                constraint
            )));
        }

        state.tables.entry(table.to_string()).or_default().push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, patch: Value, filters: &[Filter]) -> Result<Vec<Value>, ApiError> {
        self.simulate_latency().await;
        let mut state = self.state();
        state.record_call(table, Operation::Update)?;

        let Value::Object(patch) = patch else {
            return Err(ApiError::InvalidResponse(format!("Update of {} expects an object", table)));
        };

        let mut changed = Vec::new();
        if let Some(rows) = state.tables.get_mut(table) {
            for row in rows.iter_mut().filter(|row| filters.iter().all(|f| f.matches(row))) {
                if let Value::Object(fields) = row {
                    for (key, value) in &patch {
                        fields.insert(key.clone(), value.clone());
                    }
                }
                changed.push(row.clone());
            }
        }
        Ok(changed)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<usize, ApiError> {
        self.simulate_latency().await;
        let mut state = self.state();
        state.record_call(table, Operation::Delete)?;

        let Some(rows) = state.tables.get_mut(table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|row| !filters.iter().all(|f| f.matches(row)));
        Ok(before - rows.len())
    }
}
