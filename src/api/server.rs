//! Emulator API Server
//!
//! Serves the REST surface until shutdown is triggered or the process
//! receives Ctrl-C.

use crate::api::auth::{AllowAll, Authenticator, TokenAuthenticator};
use crate::api::metrics::ApiMetrics;
use crate::api::rest::{RestRouter, DEFAULT_MAX_BODY_SIZE};
use crate::engine::EngineContext;
use crate::error::{Error, Result};
use crate::registry::ResourceTypeRegistry;
use crate::store::ResourceStore;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{info, warn};

// =============================================================================
// Server Configuration
// =============================================================================

/// Configuration for the API server
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// REST API bind address
    pub bind_addr: SocketAddr,
    /// Max request body size
    pub max_body_size: usize,
    /// Token required in `X-Auth-Token`; no authentication when unset
    pub auth_token: Option<String>,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 5000)),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            auth_token: None,
        }
    }
}

// =============================================================================
// API Server
// =============================================================================

/// HTTP front end over one lifecycle engine per registered type
pub struct ApiServer<S> {
    config: ApiServerConfig,
    ctx: EngineContext<S>,
    registry: Arc<ResourceTypeRegistry>,
    metrics: ApiMetrics,
    shutdown_tx: broadcast::Sender<()>,
}

impl<S: ResourceStore> ApiServer<S> {
    /// Create a new API server
    pub fn new(
        config: ApiServerConfig,
        ctx: EngineContext<S>,
        registry: Arc<ResourceTypeRegistry>,
    ) -> Result<Self> {
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            ctx,
            registry,
            metrics: ApiMetrics::new()?,
            shutdown_tx,
        })
    }

    /// Build the router this server serves
    pub fn router(&self) -> Result<axum::Router> {
        let authenticator: Arc<dyn Authenticator> = match &self.config.auth_token {
            Some(token) => Arc::new(TokenAuthenticator::new(token.clone())),
            None => Arc::new(AllowAll),
        };

        RestRouter::new(&self.ctx, &self.registry)
            .with_authenticator(authenticator)
            .with_metrics(self.metrics.clone())
            .with_max_body_size(self.config.max_body_size)
            .build()
    }

    /// Bind the configured address and serve until shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await.map_err(|e| {
            Error::Internal(format!("Failed to bind REST server: {}", e))
        })?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until shutdown
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let app = self.router()?;
        let addr = listener.local_addr()?;

        info!("REST API listening on {}", addr);
        info!("  REST base: {}", self.ctx.rest_base);
        info!("  Resource types: {}", self.registry.len());
        if self.config.auth_token.is_none() {
            warn!("Authentication disabled, every request is accepted");
        }

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = shutdown_rx.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
                info!("REST server shutting down");
            })
            .await
            .map_err(|e| Error::Internal(format!("REST server error: {}", e)))?;

        Ok(())
    }

    /// Trigger graceful shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    pub fn metrics(&self) -> &ApiMetrics {
        &self.metrics
    }
}
