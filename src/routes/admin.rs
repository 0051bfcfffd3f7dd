use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Admin Router Module
///
/// Pages of an organization admin, nested under `/dashboard/admin`. Every
/// handler is scoped to the caller's own organization.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /dashboard/admin
        .route("/", get(handlers::admin_dashboard))
        // GET /dashboard/admin/organization
        .route("/organization", get(handlers::admin_organization))
        // GET /dashboard/admin/employees
        // Employees with the ids of their granted modules.
        .route("/employees", get(handlers::list_employees))
        // POST/DELETE /dashboard/admin/employees/{user_id}/modules/{module_id}
        .route(
            "/employees/{user_id}/modules/{module_id}",
            post(handlers::grant_module_access).delete(handlers::revoke_module_access),
        )
        // GET/POST /dashboard/admin/modules
        // Active catalog plus purchases; POST buys a module for the organization.
        .route(
            "/modules",
            get(handlers::admin_modules).post(handlers::purchase_module),
        )
}
