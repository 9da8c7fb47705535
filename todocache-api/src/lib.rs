//! todocache API - Cache-Aside Todo Service
//!
//! Serves todo records from a peer-distributed cache group, falling back to
//! PostgreSQL whenever the cache cannot answer. A node always serves the
//! cache protocol for its peers; a gateway node also serves the JSON API.
//!
//! Reads go cache-first through [`reads::ReadCoordinator`]; writes go
//! straight to the store through [`writes::WriteCoordinator`] and never
//! touch the cache. [`topology::run`] wires one cache group per process and
//! supervises the listeners.

pub mod config;
pub mod db;
pub mod error;
pub mod fill;
pub mod reads;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod topology;
pub mod writes;

pub use config::{bind_addr_from_url, Cli, ConfigError, NodeConfig};
pub use db::{DbConfig, PgTodoStore};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use fill::TodoFiller;
pub use reads::{CacheLookup, ReadCoordinator};
pub use routes::create_api_router;
pub use state::AppState;
pub use writes::WriteCoordinator;
