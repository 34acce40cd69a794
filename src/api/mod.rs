/// API routes and handlers
pub mod attest;
pub mod identifiers;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(attest::routes())
        .merge(identifiers::routes())
}
