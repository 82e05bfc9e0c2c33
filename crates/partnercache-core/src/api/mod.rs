//! Remote data client module for the hosted backend.
//!
//! Everything the dashboard persists lives behind the `RemoteClient` trait:
//! table reads with filters, ordering and offset pagination, plus inserts,
//! updates and deletes. There are no multi-statement transactions; a
//! conditional update (`update` with extra filters, checking the returned
//! rows) is the only compare-and-swap primitive.
//!
//! `RestClient` speaks the PostgREST wire format over reqwest.
//! `MemoryClient` keeps tables in process for tests and offline demos.

pub mod client;
pub mod error;
pub mod memory;
pub mod query;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

pub use client::RestClient;
pub use error::ApiError;
pub use memory::MemoryClient;
pub use query::{Filter, Page, Query};

#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Fetch the rows matching `query`, in the query's order.
    async fn query(&self, query: &Query) -> Result<Page, ApiError>;

    /// Insert a full row and return it as stored (with generated columns).
    async fn insert(&self, table: &str, row: Value) -> Result<Value, ApiError>;

    /// Apply `patch` to every row matching `filters`; returns the changed rows.
    async fn update(&self, table: &str, patch: Value, filters: &[Filter]) -> Result<Vec<Value>, ApiError>;

    /// Delete every row matching `filters`; returns how many were removed.
    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<usize, ApiError>;
}

/// A typed row of a named backend table.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const TABLE: &'static str;
}

/// Convert raw rows into typed records, rejecting rows that don't match the shape.
pub fn decode_rows<T: DeserializeOwned>(table: &str, rows: Vec<Value>) -> Result<Vec<T>, ApiError> {
    rows.into_iter()
        .map(|row| decode_row(table, row))
        .collect()
}

pub fn decode_row<T: DeserializeOwned>(table: &str, row: Value) -> Result<T, ApiError> {
    serde_json::from_value(row)
        .map_err(|e| ApiError::InvalidResponse(format!("Malformed {} row: {}", table, e)))
}

/// Fetch and decode every row matching `query`.
pub async fn fetch_records<T: Record>(
    client: &dyn RemoteClient,
    query: &Query,
) -> Result<(Vec<T>, Option<usize>), ApiError> {
    let page = client.query(query).await?;
    let records = decode_rows(T::TABLE, page.rows)?;
    Ok((records, page.total))
}

/// Insert `payload` into `T`'s table and decode the stored row.
pub async fn insert_record<T: Record, P: Serialize>(
    client: &dyn RemoteClient,
    payload: &P,
) -> Result<T, ApiError> {
    let row = serde_json::to_value(payload)
        .map_err(|e| ApiError::InvalidResponse(format!("Failed to encode {} row: {}", T::TABLE, e)))?;
    let stored = client.insert(T::TABLE, row).await?;
    decode_row(T::TABLE, stored)
}
