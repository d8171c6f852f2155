use std::time::Duration;

use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{admin, public};

/// The public listener: read-only feed/media/artwork/transcript serving
/// plus the health probe. Meant to be exposed to podcast clients.
pub fn public_router(state: AppState) -> Router {
    public::router()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state)
}

/// The admin listener: requeueing, metadata refresh, and manual
/// submissions. Meant to stay off the public network.
pub fn admin_router(state: AppState) -> Router {
    admin::router()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state)
}
