pub mod error;
pub mod flash;
pub mod middleware;
pub mod routes;

use axum::routing::{get, post};
use axum::Router;
use ballotbox_core::AppState;

pub fn build_router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/polls",
            get(routes::polls::list_polls).post(routes::admin::create_poll),
        )
        .route("/api/polls/{id}", get(routes::polls::poll_detail))
        .route("/api/polls/{id}/results", get(routes::polls::poll_results))
        .route("/api/polls/{id}/vote", post(routes::polls::cast_vote))
        .route("/api/auth/register", post(routes::auth::register))
        .route("/api/auth/login", post(routes::auth::login))
        .route("/api/auth/logout", post(routes::auth::logout))
}
