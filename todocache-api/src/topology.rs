//! Process topology: one cache group, one or two listeners.
//!
//! Every node builds the same fill function, cache group and peer pool and
//! serves the cache protocol on its own address. A gateway node additionally
//! serves the public API. Both listeners run under one supervisor: when
//! either stops, for any reason, the node stops with an error.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use todocache_distcache::{Group, GroupOptions, HttpPool};
use todocache_storage::TodoStore;
use tower_http::trace::TraceLayer;

use crate::config::NodeConfig;
use crate::error::{ApiError, ApiResult};
use crate::fill::TodoFiller;
use crate::routes::create_api_router;
use crate::state::AppState;

/// The wired-up components of one node, before any listener is bound.
pub struct Node {
    pub group: Group,
    pub pool: Arc<HttpPool>,
    store: Arc<dyn TodoStore>,
}

impl Node {
    /// Store, then fill function, then group, then peers.
    pub fn build(config: &NodeConfig, store: Arc<dyn TodoStore>) -> ApiResult<Self> {
        let filler = Arc::new(TodoFiller::new(Arc::clone(&store)));

        let mut options = GroupOptions::new(config.cache_bytes);
        if let Some(ttl) = config.cache_ttl {
            options = options.with_ttl(ttl);
        }
        let group = Group::new(config.group.clone(), options, filler);

        let pool = Arc::new(HttpPool::new(config.self_url.clone()));
        pool.set(&config.peers);
        group
            .register_peers(pool.clone())
            .map_err(|e| ApiError::internal_error(e.to_string()))?;

        Ok(Self { group, pool, store })
    }

    /// Router for cache-protocol traffic on the node's own address.
    pub fn cache_router(&self) -> Router {
        self.pool
            .router([self.group.clone()])
            .layer(TraceLayer::new_for_http())
    }

    /// Router for the public API, sharing this node's group.
    pub fn api_router(&self) -> Router {
        let cache = Arc::new(self.group.clone());
        create_api_router(AppState::new(cache, Arc::clone(&self.store)))
    }
}

/// Run a node until Ctrl-C.
pub async fn run(config: NodeConfig, store: Arc<dyn TodoStore>) -> ApiResult<()> {
    run_until(config, store, shutdown_signal()).await
}

/// Run a node until `shutdown` resolves or a listener stops.
///
/// Both listeners are bound before either starts serving, so a bind
/// failure on either address fails the node without serving anything.
pub async fn run_until<F>(
    config: NodeConfig,
    store: Arc<dyn TodoStore>,
    shutdown: F,
) -> ApiResult<()>
where
    F: Future<Output = ()> + Send,
{
    let node = Node::build(&config, store)?;

    let cache_listener = bind("cache", &config.cache_bind_addr()?).await?;
    let api_listener = if config.api_enabled {
        Some(bind("api", &config.api_bind_addr()?).await?)
    } else {
        None
    };

    tracing::info!(
        self_url = %config.self_url,
        group = %config.group,
        cache_bytes = config.cache_bytes,
        api = config.api_enabled,
        "Starting todocache node"
    );

    let mut tasks = JoinSet::new();
    tasks.spawn(serve("cache", cache_listener, node.cache_router()));
    if let Some(listener) = api_listener {
        tasks.spawn(serve("api", listener, node.api_router()));
    }

    let outcome = tokio::select! {
        Some(joined) = tasks.join_next() => Err(match joined {
            Ok(Ok(role)) => ApiError::internal_error(format!("{} listener exited", role)),
            Ok(Err(err)) => err,
            Err(err) => ApiError::internal_error(format!("Listener task failed: {}", err)),
        }),
        _ = shutdown => {
            tracing::info!("Shutdown signal received");
            Ok(())
        }
    };

    tasks.abort_all();
    if let Err(err) = &outcome {
        tracing::error!(error = %err, "Node stopped");
    }
    outcome
}

async fn bind(role: &'static str, addr: &str) -> ApiResult<TcpListener> {
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        ApiError::internal_error(format!("Failed to bind {} listener on {}: {}", role, addr, e))
    })?;
    tracing::info!(role, addr, "Listener bound");
    Ok(listener)
}

async fn serve(role: &'static str, listener: TcpListener, app: Router) -> ApiResult<&'static str> {
    axum::serve(listener, app)
        .await
        .map_err(|e| ApiError::internal_error(format!("{} listener failed: {}", role, e)))?;
    Ok(role)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "Ctrl-C handler unavailable, running until a listener stops");
        std::future::pending::<()>().await;
    }
}
