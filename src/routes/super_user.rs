use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch},
};

/// Super User Router Module
///
/// Pages of the platform operator, nested under `/dashboard/super`. The route
/// guard only lets `super_user` in; mutating handlers check the role again.
pub fn super_routes() -> Router<AppState> {
    Router::new()
        // GET /dashboard/super
        // Platform counters: admins, organizations, modules, employees.
        .route("/", get(handlers::super_dashboard))
        // GET/POST /dashboard/super/organizations
        .route(
            "/organizations",
            get(handlers::list_organizations).post(handlers::create_organization),
        )
        // GET/POST /dashboard/super/modules
        // The whole catalog, inactive modules included.
        .route(
            "/modules",
            get(handlers::list_modules).post(handlers::create_module),
        )
        // PATCH /dashboard/super/modules/{id}
        // Toggles catalog visibility.
        .route("/modules/{id}", patch(handlers::set_module_active))
        // GET /dashboard/super/admins
        .route("/admins", get(handlers::list_admins))
}
