// HTTP and WebSocket APIs

pub mod records;
pub mod websocket;

pub use records::{create_records_router, ApiError, RecordsAppState};
pub use websocket::{create_ws_router, ws_handler, WsAppState};

use crate::gateway::RecordGateway;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Full application router: record API, WebSocket endpoint, permissive CORS
pub fn create_app(gateway: Arc<RecordGateway>) -> Router {
    let records_state = Arc::new(RecordsAppState {
        gateway: Arc::clone(&gateway),
    });
    let ws_state = Arc::new(WsAppState { gateway });

    Router::new()
        .merge(create_records_router(records_state))
        .merge(create_ws_router(ws_state))
        .layer(CorsLayer::permissive())
}
