use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session. `/api/*` is exempt from the route
/// guard entirely; the `/auth/*` pages go through it so that signed-in users are
/// bounced to their dashboard.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /api/health
        // Liveness probe for load balancers.
        .route("/api/health", get(|| async { "ok" }))
        // GET /api/me
        // Profile of the current session; resolves the session itself.
        .route("/api/me", get(handlers::get_me))
        // GET/POST /auth/login
        .route("/auth/login", get(handlers::login_page).post(handlers::login))
        // GET/POST /auth/register
        .route(
            "/auth/register",
            get(handlers::register_page).post(handlers::register),
        )
        // POST /auth/logout
        .route("/auth/logout", post(handlers::logout))
        // GET /dashboard/unauthorized
        // Landing page for role-namespace violations; any signed-in user may see it.
        .route("/dashboard/unauthorized", get(handlers::unauthorized_page))
}
