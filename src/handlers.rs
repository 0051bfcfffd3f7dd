use crate::{
    AppState,
    auth::CurrentUser,
    error::{ApiError, SessionError},
    models::{
        AdminDashboard, AdminModulesPage, AdminSummary, CreateModuleRequest,
        CreateOrganizationRequest, CurrentUserProfile, EmployeeDashboard, EmployeeSummary,
        LoginRequest, Module, Organization, OrganizationModule, OrganizationOverview,
        OrganizationSummary, PageInfo, PurchaseModuleRequest, RegisterRequest,
        SetModuleActiveRequest, SuperDashboardStats, UserModuleAccess, UserRecord, UserRole,
    },
    policy::{LOGIN_PATH, role_home},
    session::{clear_tokens, store_tokens},
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::Redirect,
};
use axum_extra::extract::CookieJar;
use chrono::Utc;
use uuid::Uuid;

const SUPER: &[UserRole] = &[UserRole::SuperUser];
const ADMINS: &[UserRole] = &[UserRole::SuperUser, UserRole::Admin];
const EMPLOYEES: &[UserRole] = &[UserRole::Employee];

fn page(page: &str, message: &str) -> Json<PageInfo> {
    Json(PageInfo {
        page: page.to_string(),
        message: message.to_string(),
    })
}

// --- Session & Profile ---

/// get_me
///
/// [API Route] Profile of the signed-in user. `/api` is outside the route guard,
/// so the session and directory lookups happen here.
#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Profile", body = CurrentUserProfile),
        (status = 401, description = "No session")
    )
)]
pub async fn get_me(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<CurrentUserProfile>, StatusCode> {
    let session = state.session.as_ref().ok_or(StatusCode::UNAUTHORIZED)?;

    let identity = session
        .get_user(&jar)
        .await
        .map_err(|e| {
            tracing::error!("session lookup failed: {}", e);
            StatusCode::BAD_GATEWAY
        })?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let user = state
        .directory
        .find_user(identity.id)
        .await
        .map_err(|e| {
            tracing::error!("user directory lookup failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    Ok(Json(CurrentUserProfile {
        id: user.id,
        email: user.email,
        full_name: user.full_name,
        role: user.role,
        organization_id: user.organization_id,
        home: role_home(user.role).path().to_string(),
    }))
}

#[utoipa::path(get, path = "/auth/login", responses((status = 200, body = PageInfo)))]
pub async fn login_page() -> Json<PageInfo> {
    page("login", "Sign in with your email and password")
}

#[utoipa::path(get, path = "/auth/register", responses((status = 200, body = PageInfo)))]
pub async fn register_page() -> Json<PageInfo> {
    page("register", "Create an account")
}

/// login
///
/// [Public Route] Password sign-in through Supabase Auth. On success the token
/// pair is stored in HTTP-only cookies and the client is sent to `/`, where the
/// route guard forwards it to its role's dashboard.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 303, description = "Signed in"),
        (status = 401, description = "Invalid credentials"),
        (status = 503, description = "Authentication not configured")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Redirect), StatusCode> {
    let session = state
        .session
        .as_ref()
        .ok_or(StatusCode::SERVICE_UNAVAILABLE)?;

    match session.sign_in(&payload.email, &payload.password).await {
        Ok(tokens) => Ok((store_tokens(jar, &tokens), Redirect::to("/"))),
        Err(SessionError::Rejected { status }) => {
            tracing::info!("sign-in rejected by auth provider ({})", status);
            Err(StatusCode::UNAUTHORIZED)
        }
        Err(e) => {
            tracing::error!("sign-in failed: {}", e);
            Err(StatusCode::BAD_GATEWAY)
        }
    }
}

/// register
///
/// [Public Route] Creates the Supabase auth user, then the mirrored `users` row
/// with the same id. New accounts are employees unless `admin` is requested;
/// super users cannot be self-registered.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = UserRecord),
        (status = 400, description = "Rejected by auth provider"),
        (status = 403, description = "Role not allowed")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserRecord>), StatusCode> {
    let role = match payload.role {
        None | Some(UserRole::Employee) => UserRole::Employee,
        Some(UserRole::Admin) => UserRole::Admin,
        Some(UserRole::SuperUser) => return Err(StatusCode::FORBIDDEN),
    };

    let session = state
        .session
        .as_ref()
        .ok_or(StatusCode::SERVICE_UNAVAILABLE)?;

    // Step 1: external auth provider owns the credentials.
    let id = match session.sign_up(&payload.email, &payload.password).await {
        Ok(id) => id,
        Err(SessionError::Rejected { status }) => {
            tracing::info!("sign-up rejected by auth provider ({})", status);
            return Err(StatusCode::BAD_REQUEST);
        }
        Err(e) => {
            tracing::error!("sign-up failed: {}", e);
            return Err(StatusCode::BAD_GATEWAY);
        }
    };

    // Step 2: mirror the identity into public.users under the same primary key.
    let now = Utc::now();
    let record = UserRecord {
        id,
        email: payload.email,
        full_name: payload.full_name,
        role,
        organization_id: None,
        created_at: now,
        updated_at: now,
    };

    let created = state.directory.create_user(record).await.map_err(|e| {
        tracing::error!(user_id = %id, "failed to create users row: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// logout
///
/// Clears both session cookies and returns to the login page.
#[utoipa::path(post, path = "/auth/logout", responses((status = 303, description = "Signed out")))]
pub async fn logout(jar: CookieJar) -> (CookieJar, Redirect) {
    (clear_tokens(jar), Redirect::to(LOGIN_PATH))
}

// --- Super User Pages ---

#[utoipa::path(
    get,
    path = "/dashboard/super",
    responses((status = 200, description = "Platform counters", body = SuperDashboardStats))
)]
pub async fn super_dashboard(
    user: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<SuperDashboardStats>, ApiError> {
    user.require(SUPER)?;
    Ok(Json(state.repo.get_super_stats().await))
}

#[utoipa::path(
    get,
    path = "/dashboard/super/organizations",
    responses((status = 200, description = "Organizations", body = [OrganizationSummary]))
)]
pub async fn list_organizations(
    user: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<OrganizationSummary>>, ApiError> {
    user.require(SUPER)?;
    Ok(Json(state.repo.list_organizations().await))
}

/// create_organization
///
/// [Super Route] Creates an organization owned by an existing admin, who is
/// attached to it.
#[utoipa::path(
    post,
    path = "/dashboard/super/organizations",
    request_body = CreateOrganizationRequest,
    responses(
        (status = 201, description = "Created", body = Organization),
        (status = 404, description = "Admin not found"),
        (status = 422, description = "Invalid input")
    )
)]
pub async fn create_organization(
    user: CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateOrganizationRequest>,
) -> Result<(StatusCode, Json<Organization>), ApiError> {
    user.require(SUPER)?;
    let organization = state.repo.create_organization(payload).await?;
    Ok((StatusCode::CREATED, Json(organization)))
}

#[utoipa::path(
    get,
    path = "/dashboard/super/modules",
    responses((status = 200, description = "Module catalog", body = [Module]))
)]
pub async fn list_modules(
    user: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Module>>, ApiError> {
    user.require(SUPER)?;
    Ok(Json(state.repo.list_modules().await))
}

#[utoipa::path(
    post,
    path = "/dashboard/super/modules",
    request_body = CreateModuleRequest,
    responses(
        (status = 201, description = "Created", body = Module),
        (status = 422, description = "Invalid input")
    )
)]
pub async fn create_module(
    user: CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateModuleRequest>,
) -> Result<(StatusCode, Json<Module>), ApiError> {
    user.require(SUPER)?;
    let module = state.repo.create_module(payload).await?;
    tracing::info!(module_id = %module.id, "module created");
    Ok((StatusCode::CREATED, Json(module)))
}

/// set_module_active
///
/// [Super Route] Publishes or withdraws a module from the catalog. Existing
/// purchases are untouched.
#[utoipa::path(
    patch,
    path = "/dashboard/super/modules/{id}",
    params(("id" = Uuid, Path, description = "Module ID")),
    request_body = SetModuleActiveRequest,
    responses(
        (status = 200, description = "Updated", body = Module),
        (status = 404, description = "Not Found")
    )
)]
pub async fn set_module_active(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetModuleActiveRequest>,
) -> Result<Json<Module>, ApiError> {
    user.require(SUPER)?;
    Ok(Json(state.repo.set_module_active(id, payload.is_active).await?))
}

#[utoipa::path(
    get,
    path = "/dashboard/super/admins",
    responses((status = 200, description = "Organization admins", body = [AdminSummary]))
)]
pub async fn list_admins(
    user: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<AdminSummary>>, ApiError> {
    user.require(SUPER)?;
    Ok(Json(state.repo.list_admins().await))
}

// --- Organization Admin Pages ---

/// admin_dashboard
///
/// [Admin Route] Overview of the caller's organization. Users without an
/// organization (super users included) get 404.
#[utoipa::path(
    get,
    path = "/dashboard/admin",
    responses(
        (status = 200, description = "Organization overview", body = AdminDashboard),
        (status = 404, description = "No organization")
    )
)]
pub async fn admin_dashboard(
    user: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AdminDashboard>, ApiError> {
    user.require(ADMINS)?;
    let org_id = user.organization_id()?;
    let dashboard = state
        .repo
        .get_admin_dashboard(org_id)
        .await
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(dashboard))
}

/// admin_organization
///
/// [Admin Route] Organization settings with team size, active modules and the
/// monthly cost of its purchases.
#[utoipa::path(
    get,
    path = "/dashboard/admin/organization",
    responses(
        (status = 200, description = "Organization overview", body = OrganizationOverview),
        (status = 404, description = "No organization")
    )
)]
pub async fn admin_organization(
    user: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<OrganizationOverview>, ApiError> {
    user.require(ADMINS)?;
    let org_id = user.organization_id()?;
    let overview = state
        .repo
        .get_organization_overview(org_id)
        .await
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(overview))
}

#[utoipa::path(
    get,
    path = "/dashboard/admin/employees",
    responses((status = 200, description = "Employees", body = [EmployeeSummary]))
)]
pub async fn list_employees(
    user: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<EmployeeSummary>>, ApiError> {
    user.require(ADMINS)?;
    let org_id = user.organization_id()?;
    Ok(Json(state.repo.list_employees(org_id).await))
}

/// grant_module_access
///
/// [Admin Route] Gives an employee of the caller's organization access to a
/// module the organization owns.
#[utoipa::path(
    post,
    path = "/dashboard/admin/employees/{user_id}/modules/{module_id}",
    params(
        ("user_id" = Uuid, Path, description = "Employee user ID"),
        ("module_id" = Uuid, Path, description = "Module ID")
    ),
    responses(
        (status = 201, description = "Granted", body = UserModuleAccess),
        (status = 404, description = "Employee not in organization"),
        (status = 422, description = "Module not purchased")
    )
)]
pub async fn grant_module_access(
    user: CurrentUser,
    State(state): State<AppState>,
    Path((user_id, module_id)): Path<(Uuid, Uuid)>,
) -> Result<(StatusCode, Json<UserModuleAccess>), ApiError> {
    user.require(ADMINS)?;
    let org_id = user.organization_id()?;
    let access = state
        .repo
        .grant_module_access(org_id, user_id, module_id)
        .await?;
    Ok((StatusCode::CREATED, Json(access)))
}

#[utoipa::path(
    delete,
    path = "/dashboard/admin/employees/{user_id}/modules/{module_id}",
    params(
        ("user_id" = Uuid, Path, description = "Employee user ID"),
        ("module_id" = Uuid, Path, description = "Module ID")
    ),
    responses(
        (status = 204, description = "Revoked"),
        (status = 404, description = "No such grant")
    )
)]
pub async fn revoke_module_access(
    user: CurrentUser,
    State(state): State<AppState>,
    Path((user_id, module_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    user.require(ADMINS)?;
    let org_id = user.organization_id()?;
    state
        .repo
        .revoke_module_access(org_id, user_id, module_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// admin_modules
///
/// [Admin Route] The active catalog next to what the organization already owns.
#[utoipa::path(
    get,
    path = "/dashboard/admin/modules",
    responses(
        (status = 200, description = "Catalog and purchases", body = AdminModulesPage),
        (status = 404, description = "No organization")
    )
)]
pub async fn admin_modules(
    user: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AdminModulesPage>, ApiError> {
    user.require(ADMINS)?;
    let org_id = user.organization_id()?;
    let organization = state
        .repo
        .get_organization(org_id)
        .await
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(AdminModulesPage {
        organization,
        catalog: state.repo.list_catalog().await,
        purchased: state.repo.list_purchased_modules(org_id).await,
    }))
}

#[utoipa::path(
    post,
    path = "/dashboard/admin/modules",
    request_body = PurchaseModuleRequest,
    responses(
        (status = 201, description = "Purchased", body = OrganizationModule),
        (status = 404, description = "Module not found"),
        (status = 422, description = "Module inactive")
    )
)]
pub async fn purchase_module(
    user: CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<PurchaseModuleRequest>,
) -> Result<(StatusCode, Json<OrganizationModule>), ApiError> {
    user.require(ADMINS)?;
    let org_id = user.organization_id()?;
    let purchase = state.repo.purchase_module(org_id, payload.module_id).await?;
    Ok((StatusCode::CREATED, Json(purchase)))
}

// --- Employee Pages ---

#[utoipa::path(
    get,
    path = "/dashboard/employee",
    responses((status = 200, description = "Employee overview", body = EmployeeDashboard))
)]
pub async fn employee_dashboard(
    user: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<EmployeeDashboard>, ApiError> {
    user.require(EMPLOYEES)?;
    let record = &user.0;
    Ok(Json(
        state
            .repo
            .get_employee_dashboard(record.id, record.organization_id)
            .await,
    ))
}

/// employee_modules
///
/// [Employee Route] Only the modules granted to the caller.
#[utoipa::path(
    get,
    path = "/dashboard/employee/modules",
    responses((status = 200, description = "Granted modules", body = [Module]))
)]
pub async fn employee_modules(
    user: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Module>>, ApiError> {
    user.require(EMPLOYEES)?;
    let record = &user.0;
    let dashboard = state
        .repo
        .get_employee_dashboard(record.id, record.organization_id)
        .await;
    Ok(Json(dashboard.granted_modules))
}

#[utoipa::path(get, path = "/dashboard/unauthorized", responses((status = 200, body = PageInfo)))]
pub async fn unauthorized_page() -> Json<PageInfo> {
    page("unauthorized", "You do not have permission to view that page")
}

pub async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
