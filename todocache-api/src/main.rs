//! todocache node entry point
//!
//! Parses flags, initializes logging, connects to PostgreSQL and runs the
//! node until Ctrl-C or a listener failure.

use std::sync::Arc;

use clap::Parser;
use todocache_api::telemetry::{init_tracing, TelemetryConfig};
use todocache_api::{topology, ApiResult, Cli, DbConfig, NodeConfig, PgTodoStore};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let cli = Cli::parse();

    let telemetry_config = TelemetryConfig::from_env()?;
    init_tracing(&telemetry_config)?;

    let config = NodeConfig::from_cli(&cli)?;

    let db_config = DbConfig::from_env();
    let store = PgTodoStore::connect(&db_config).await?;

    topology::run(config, Arc::new(store)).await
}
