//! REST API endpoints for the gateway

pub mod health;
pub mod invite;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::GatewayState;

pub fn create_rest_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/send-invite", post(invite::send_invite))
}
