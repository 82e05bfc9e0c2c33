//! Core library for the partner dashboard data layer.
//!
//! Platform-agnostic pieces shared by every frontend:
//! - `api`: the remote table client (`RestClient`, `MemoryClient`)
//! - `cache`: stale-while-revalidate snapshots and paginated collections
//! - `booking`: consultation and webinar booking flows
//! - `models`: typed rows for every backend table
//! - `config`: configuration file and environment overrides

pub mod api;
pub mod booking;
pub mod cache;
pub mod config;
pub mod models;

pub use api::{ApiError, MemoryClient, RemoteClient, RestClient};
pub use cache::{CollectionLoader, SnapshotCache};
pub use config::{Config, ConfigError};
