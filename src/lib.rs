use axum::{Router, extract::FromRef, http::HeaderName};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Authorization core: session, directory, policy and the guard combining them.
pub mod auth;
pub mod directory;
pub mod middleware;
pub mod policy;
pub mod session;

// Dashboard data and HTTP surface.
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod routes;

use routes::{admin, employee, public, super_user};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use directory::{DirectoryState, MockDirectory, PostgresDirectory};
pub use repository::{PostgresRepository, RepositoryState};
pub use session::{MockSessionProvider, SessionState, SupabaseSessionProvider};

/// ApiDoc
///
/// OpenAPI document for every page and API route, served at `/api/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_me, handlers::login_page, handlers::register_page, handlers::login,
        handlers::register, handlers::logout, handlers::super_dashboard,
        handlers::list_organizations, handlers::create_organization, handlers::list_modules,
        handlers::create_module, handlers::set_module_active, handlers::list_admins,
        handlers::admin_dashboard, handlers::admin_organization, handlers::list_employees,
        handlers::grant_module_access, handlers::revoke_module_access, handlers::admin_modules,
        handlers::purchase_module, handlers::employee_dashboard, handlers::employee_modules,
        handlers::unauthorized_page
    ),
    components(
        schemas(
            models::UserRole, models::UserRecord, models::Organization, models::Module,
            models::OrganizationModule, models::UserModuleAccess, models::LoginRequest,
            models::RegisterRequest, models::CreateOrganizationRequest,
            models::CreateModuleRequest, models::SetModuleActiveRequest,
            models::PurchaseModuleRequest, models::SuperDashboardStats,
            models::OrganizationSummary, models::AdminSummary, models::PurchasedModule,
            models::AdminDashboard, models::OrganizationOverview, models::EmployeeSummary,
            models::AdminModulesPage,
            models::EmployeeModule, models::EmployeeDashboard, models::CurrentUserProfile,
            models::PageInfo,
        )
    ),
    tags(
        (name = "rbac-portal", description = "RBAC admin dashboard API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Single immutable container of the request-independent clients, cloned into
/// every request. The session provider is optional: without Supabase credentials
/// the route guard runs as a no-op.
#[derive(Clone)]
pub struct AppState {
    /// Dashboard data access.
    pub repo: RepositoryState,
    /// `users` table lookups for the route guard and registration.
    pub directory: DirectoryState,
    /// Supabase Auth client; `None` disables authorization.
    pub session: Option<SessionState>,
    pub config: AppConfig,
}

impl AppState {
    /// State with no session provider, as in a deployment missing Supabase credentials.
    pub fn without_session(repo: RepositoryState, directory: DirectoryState, config: AppConfig) -> Self {
        Self {
            repo,
            directory,
            session: None,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for DirectoryState {
    fn from_ref(app_state: &AppState) -> DirectoryState {
        app_state.directory.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the page routes, layers the route guard over all of them, then adds
/// request-id, tracing and CORS layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/api/docs").url("/api/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .nest("/dashboard/super", super_user::super_routes())
        .nest("/dashboard/admin", admin::admin_routes())
        .nest("/dashboard/employee", employee::employee_routes())
        .fallback(handlers::not_found)
        // `layer` (not `route_layer`) so redirects also cover paths with no handler,
        // such as `/` and bare `/dashboard`.
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::route_guard,
        ))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for each request carrying the `x-request-id`, so every log line of one
/// request (guard decisions included) is correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
