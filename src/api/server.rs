//! API Server
//!
//! HTTP server setup and graceful shutdown.

use super::{
    handlers::AppState,
    middleware::{create_cors_layer, request_id_middleware},
    routes::create_router,
};
use crate::config::ApiConfig;
use crate::settlement::SettlementOrchestrator;
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info};

pub struct ApiServer {
    config: ApiConfig,
    orchestrator: Arc<SettlementOrchestrator>,
}

impl ApiServer {
    pub fn new(config: ApiConfig, orchestrator: Arc<SettlementOrchestrator>) -> Self {
        Self {
            config,
            orchestrator,
        }
    }

    /// Serve until Ctrl+C or SIGTERM
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let app = create_app(&self.config, self.orchestrator.clone());
        let addr = self.get_socket_addr()?;

        info!("Starting bet ledger API on http://{}", addr);
        self.log_server_info();

        let listener = tokio::net::TcpListener::bind(addr).await?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        let counters = self.orchestrator.treasury_stats().counters;
        info!(
            total_bets = counters.total_bets,
            total_balance = %counters.total_balance,
            "API server stopped gracefully"
        );
        Ok(())
    }

    fn get_socket_addr(&self) -> Result<SocketAddr, Box<dyn std::error::Error>> {
        Ok(SocketAddr::from((
            self.config.host.parse::<std::net::IpAddr>()?,
            self.config.port,
        )))
    }

    fn log_server_info(&self) {
        let ledger = self.orchestrator.ledger().config();
        info!("Server configuration:");
        info!("   CORS: {:?}", self.config.allowed_origins);
        info!("   Request timeout: {}s", self.config.request_timeout_secs);
        info!("   Randomness: {}", self.orchestrator.randomness());
        info!("   Bet range: [{}, {}]", ledger.min_bet, ledger.max_bet);
        info!("   House fee rate: {}", ledger.house_fee_rate);

        info!("Available endpoints:");
        info!("   GET  /health                                - Health check");
        info!("   GET  /api/accounts/:account_id              - Account snapshot");
        info!("   POST /api/accounts/:account_id/bets         - Place a bet");
        info!("   POST /api/accounts/:account_id/transactions - Deposit or withdraw");
        info!("   GET  /api/treasury                          - Treasury statistics");
        info!("   POST /api/verify                            - Verify an outcome proof");
        info!("   GET  /metrics                               - Prometheus metrics");
    }
}

/// Router with the full middleware stack
pub fn create_app(config: &ApiConfig, orchestrator: Arc<SettlementOrchestrator>) -> axum::Router {
    let state = Arc::new(AppState::new(orchestrator));

    create_router(state)
        // Request ID middleware (first for tracing)
        .layer(axum::middleware::from_fn(request_id_middleware))
        // CORS layer (before timeout to handle preflight)
        .layer(create_cors_layer(config.allowed_origins.clone()))
        .layer(TimeoutLayer::new(config.request_timeout()))
        // Tracing layer (last for complete request tracing)
        .layer(TraceLayer::new_for_http())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
