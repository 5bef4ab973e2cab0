use axum::{extract::State, routing::get, Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::engine::Engine;
use crate::models::StatusSnapshot;

pub async fn get_status(State(engine): State<Arc<Engine>>) -> Json<StatusSnapshot> {
    Json(engine.status().await)
}

pub fn create_router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/api/status", get(get_status))
        .with_state(engine)
}

pub async fn start_server(port: u16, engine: Arc<Engine>) {
    let app = create_router(engine);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("status API: http://localhost:{}/api/status", addr.port());
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind API port");
    axum::serve(listener, app).await.unwrap();
}
