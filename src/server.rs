use crate::{
    annotator::Annotator, config::ServerConfig, detector_service::DetectorService,
    fetcher::Fetcher, routes::api_routes,
};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Everything a handler needs, built once at startup and shared read-only:
/// the detector sessions, the annotator with its font, the HTTP client, and
/// the fixed annotation count.
#[derive(Clone)]
pub struct SharedState<D: DetectorService> {
    pub detector: Arc<D>,
    pub annotator: Arc<Annotator>,
    pub fetcher: Fetcher,
    pub num_objects: usize,
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new<D: DetectorService>(
        state: SharedState<D>,
        config: &ServerConfig,
    ) -> anyhow::Result<Self> {
        let addr = config.get_address();

        let router = Router::new().merge(api_routes()).with_state(state);

        let listener = TcpListener::bind(addr).await?;

        Ok(Self { router, listener })
    }

    pub async fn run(self) -> anyhow::Result<()> {
        tracing::info!("Listening on {}", self.listener.local_addr()?);

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server stopped");

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
