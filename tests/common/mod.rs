//! Shared utilities for integration tests.

use flowats_gateway::config::GatewayConfig;
use flowats_gateway::http::{AppState, HttpServer};
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Boot a gateway on an ephemeral loopback port and return its address.
pub async fn spawn_gateway(config: GatewayConfig) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(AppState::from_config(config));
    tokio::spawn(async move {
        let _ = server.run(listener).await;
    });

    // give the accept loop a beat to come up
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    addr
}

/// Config with a known metrics token and quiet logging.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.observability.metrics_token = "test-secret".into();
    config.observability.log_level = "error".into();
    config
}
