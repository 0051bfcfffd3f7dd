use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Employee Router Module
///
/// Read-only pages nested under `/dashboard/employee`.
pub fn employee_routes() -> Router<AppState> {
    Router::new()
        // GET /dashboard/employee
        .route("/", get(handlers::employee_dashboard))
        // GET /dashboard/employee/modules
        .route("/modules", get(handlers::employee_modules))
}
