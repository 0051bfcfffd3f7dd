use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Roles ---

/// UserRole
///
/// The closed set of roles stored in `public.users.role`. Every authorization
/// decision matches on this enum exhaustively, so adding a role is a compile error
/// until each decision site handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum UserRole {
    SuperUser,
    Admin,
    Employee,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::SuperUser => "super_user",
            UserRole::Admin => "admin",
            UserRole::Employee => "employee",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a role column holds a value outside the known set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown user role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for UserRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_user" => Ok(UserRole::SuperUser),
            "admin" => Ok(UserRole::Admin),
            "employee" => Ok(UserRole::Employee),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

// --- Core Schemas (Mapped to Database) ---

/// UserRecord
///
/// A validated row of the `public.users` table. The id mirrors `auth.users.id`.
/// Built by the user directory from a raw row once the role has been parsed.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    pub organization_id: Option<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    // The admin user who owns the organization.
    pub admin_id: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Module
///
/// A purchasable catalog entry from `public.modules`. `is_active` controls
/// whether admins can see and buy it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Module {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    // Monthly price in dollars.
    pub price: f64,
    pub is_active: bool,
    pub features: Vec<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct OrganizationModule {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub module_id: Uuid,
    #[ts(type = "string")]
    pub purchased_at: DateTime<Utc>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct UserModuleAccess {
    pub id: Uuid,
    pub user_id: Uuid,
    pub module_id: Uuid,
    #[ts(type = "string")]
    pub granted_at: DateTime<Utc>,
    pub is_active: bool,
}

// --- Request Payloads (Input Schemas) ---

/// LoginRequest
///
/// Credentials forwarded to Supabase Auth (POST /auth/login). Never persisted or logged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// RegisterRequest
///
/// Input payload for POST /auth/register. The password is only passed through to
/// Supabase Auth. `role` may only be `admin` or `employee`; a super user cannot
/// be self-registered.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    #[serde(default)]
    pub role: Option<UserRole>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateOrganizationRequest {
    pub name: String,
    pub slug: String,
    pub admin_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateModuleRequest {
    pub name: String,
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SetModuleActiveRequest {
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PurchaseModuleRequest {
    pub module_id: Uuid,
}

// --- Page Data Schemas (Output) ---

/// SuperDashboardStats
///
/// Counters for the platform overview (GET /dashboard/super).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct SuperDashboardStats {
    pub total_admins: i64,
    pub total_organizations: i64,
    pub total_modules: i64,
    pub total_employees: i64,
}

/// OrganizationSummary
///
/// One row of the super user's organization list, joined with its admin and
/// aggregated member/module counts.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct OrganizationSummary {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub admin_id: Uuid,
    pub admin_email: Option<String>,
    pub employee_count: i64,
    pub active_module_count: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct AdminSummary {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub organization_id: Option<Uuid>,
    pub organization_name: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// PurchasedModule
///
/// An active organization purchase joined with its catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct PurchasedModule {
    pub purchase_id: Uuid,
    pub module_id: Uuid,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub features: Vec<String>,
    #[ts(type = "string")]
    pub purchased_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AdminDashboard {
    pub organization: Organization,
    pub employee_count: i64,
    pub active_module_count: i64,
    pub purchased_modules: Vec<PurchasedModule>,
}

/// OrganizationOverview
///
/// Settings page of an organization (GET /dashboard/admin/organization).
/// `member_count` counts every user attached to the organization, admin
/// included; `total_cost` sums the price of its active purchases.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct OrganizationOverview {
    pub organization: Organization,
    pub member_count: i64,
    pub active_module_count: i64,
    pub total_cost: f64,
}

/// EmployeeSummary
///
/// A member of the admin's organization with the ids of the modules currently
/// granted to them.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct EmployeeSummary {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub module_ids: Vec<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AdminModulesPage {
    pub organization: Organization,
    pub catalog: Vec<Module>,
    pub purchased: Vec<PurchasedModule>,
}

/// EmployeeModule
///
/// A module owned by the employee's organization, flagged with whether the
/// employee personally has access to it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct EmployeeModule {
    pub module_id: Uuid,
    pub name: String,
    pub description: String,
    pub features: Vec<String>,
    pub granted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct EmployeeDashboard {
    pub organization: Option<Organization>,
    pub granted_modules: Vec<Module>,
    pub organization_modules: Vec<EmployeeModule>,
}

/// CurrentUserProfile
///
/// Output of GET /api/me: the directory record plus the dashboard the user lands on.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CurrentUserProfile {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    pub organization_id: Option<Uuid>,
    pub home: String,
}

/// PageInfo
///
/// Minimal payload for pages with no backing data (auth forms, unauthorized notice).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct PageInfo {
    pub page: String,
    pub message: String,
}
