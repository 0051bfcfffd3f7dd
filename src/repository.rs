use crate::{
    error::RepositoryError,
    models::{
        AdminDashboard, AdminSummary, CreateModuleRequest, CreateOrganizationRequest,
        EmployeeDashboard, EmployeeModule, EmployeeSummary, Module, Organization,
        OrganizationModule, OrganizationOverview, OrganizationSummary, PurchasedModule,
        SuperDashboardStats,
        UserModuleAccess,
    },
};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Repository Trait
///
/// Persistence contract for the dashboard pages. Handlers only see this trait,
/// so the Postgres implementation can be swapped for a mock in tests.
///
/// Reads degrade to empty values on database errors (logged), mirroring the
/// empty states the pages show. Writes report failures as `RepositoryError`.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Super User ---
    async fn get_super_stats(&self) -> SuperDashboardStats;
    async fn list_organizations(&self) -> Vec<OrganizationSummary>;
    async fn create_organization(
        &self,
        req: CreateOrganizationRequest,
    ) -> Result<Organization, RepositoryError>;
    async fn list_modules(&self) -> Vec<Module>;
    async fn create_module(&self, req: CreateModuleRequest) -> Result<Module, RepositoryError>;
    async fn set_module_active(&self, id: Uuid, is_active: bool) -> Result<Module, RepositoryError>;
    async fn list_admins(&self) -> Vec<AdminSummary>;

    // --- Organization Admin ---
    async fn get_organization(&self, org_id: Uuid) -> Option<Organization>;
    async fn get_admin_dashboard(&self, org_id: Uuid) -> Option<AdminDashboard>;
    async fn get_organization_overview(&self, org_id: Uuid) -> Option<OrganizationOverview>;
    async fn list_employees(&self, org_id: Uuid) -> Vec<EmployeeSummary>;
    // Active modules only, ordered by name.
    async fn list_catalog(&self) -> Vec<Module>;
    async fn list_purchased_modules(&self, org_id: Uuid) -> Vec<PurchasedModule>;
    // Idempotent: buying an owned module returns the existing purchase.
    async fn purchase_module(
        &self,
        org_id: Uuid,
        module_id: Uuid,
    ) -> Result<OrganizationModule, RepositoryError>;
    async fn grant_module_access(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        module_id: Uuid,
    ) -> Result<UserModuleAccess, RepositoryError>;
    async fn revoke_module_access(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        module_id: Uuid,
    ) -> Result<(), RepositoryError>;

    // --- Employee ---
    async fn get_employee_dashboard(&self, user_id: Uuid, org_id: Option<Uuid>)
    -> EmployeeDashboard;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// `Repository` backed by the Supabase Postgres database. Queries are checked at
/// runtime (`query_as` with binds) so the crate builds without a live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn count(&self, sql: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(sql)
            .fetch_one(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("count error ({}): {:?}", sql, e);
                0
            })
    }

    async fn count_for(&self, sql: &str, id: Uuid) -> i64 {
        sqlx::query_scalar::<_, i64>(sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("count error ({}): {:?}", sql, e);
                0
            })
    }
}

// Modules store price as NUMERIC; cast so it decodes into f64.
const MODULE_COLUMNS: &str =
    "id, name, description, price::float8 AS price, is_active, features, created_at, updated_at";

const PURCHASED_MODULES_SQL: &str = r#"
    SELECT om.id AS purchase_id, m.id AS module_id, m.name, m.description,
           m.price::float8 AS price, m.features, om.purchased_at
    FROM organization_modules om
    JOIN modules m ON m.id = om.module_id
    WHERE om.organization_id = $1 AND om.is_active = true
    ORDER BY om.purchased_at DESC
"#;

#[async_trait]
impl Repository for PostgresRepository {
    /// get_super_stats
    ///
    /// Platform-wide counters for the super user overview.
    async fn get_super_stats(&self) -> SuperDashboardStats {
        SuperDashboardStats {
            total_admins: self.count("SELECT COUNT(*) FROM users WHERE role = 'admin'").await,
            total_organizations: self.count("SELECT COUNT(*) FROM organizations").await,
            total_modules: self.count("SELECT COUNT(*) FROM modules").await,
            total_employees: self.count("SELECT COUNT(*) FROM users WHERE role = 'employee'").await,
        }
    }

    /// list_organizations
    ///
    /// Every organization, newest first, with its admin's email and aggregated
    /// member and active-module counts.
    async fn list_organizations(&self) -> Vec<OrganizationSummary> {
        let query = r#"
            SELECT
                o.id, o.name, o.slug, o.admin_id,
                a.email AS admin_email,
                (SELECT COUNT(*) FROM users u
                   WHERE u.organization_id = o.id AND u.role = 'employee') AS employee_count,
                (SELECT COUNT(*) FROM organization_modules om
                   WHERE om.organization_id = o.id AND om.is_active = true) AS active_module_count,
                o.created_at
            FROM organizations o
            LEFT JOIN users a ON a.id = o.admin_id
            ORDER BY o.created_at DESC
        "#;

        sqlx::query_as::<_, OrganizationSummary>(query)
            .fetch_all(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("list_organizations error: {:?}", e);
                vec![]
            })
    }

    /// create_organization
    ///
    /// Inserts the organization and attaches its admin in one transaction. The
    /// referenced user must exist and hold the admin role.
    async fn create_organization(
        &self,
        req: CreateOrganizationRequest,
    ) -> Result<Organization, RepositoryError> {
        let name = req.name.trim();
        let slug = req.slug.trim();
        if name.is_empty() || slug.is_empty() {
            return Err(RepositoryError::Invalid("name and slug are required".to_string()));
        }

        let mut tx = self.pool.begin().await?;

        let admin_role: Option<String> =
            sqlx::query_scalar("SELECT role FROM users WHERE id = $1")
                .bind(req.admin_id)
                .fetch_optional(&mut *tx)
                .await?;
        match admin_role.as_deref() {
            None => return Err(RepositoryError::NotFound("admin")),
            Some("admin") => {}
            Some(_) => {
                return Err(RepositoryError::Invalid(
                    "organization owner must have the admin role".to_string(),
                ));
            }
        }

        let organization = sqlx::query_as::<_, Organization>(
            r#"INSERT INTO organizations (id, name, slug, admin_id, created_at, updated_at)
               VALUES ($1, $2, $3, $4, NOW(), NOW())
               RETURNING id, name, slug, admin_id, created_at, updated_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(slug)
        .bind(req.admin_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE users SET organization_id = $1, updated_at = NOW() WHERE id = $2")
            .bind(organization.id)
            .bind(req.admin_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(organization_id = %organization.id, "organization created");
        Ok(organization)
    }

    /// list_modules
    ///
    /// The whole catalog, inactive modules included, newest first.
    async fn list_modules(&self) -> Vec<Module> {
        let query = format!("SELECT {} FROM modules ORDER BY created_at DESC", MODULE_COLUMNS);
        sqlx::query_as::<_, Module>(&query)
            .fetch_all(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("list_modules error: {:?}", e);
                vec![]
            })
    }

    /// create_module
    ///
    /// New modules are active immediately. Blank feature entries are dropped.
    async fn create_module(&self, req: CreateModuleRequest) -> Result<Module, RepositoryError> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(RepositoryError::Invalid("module name is required".to_string()));
        }
        if !req.price.is_finite() || req.price < 0.0 {
            return Err(RepositoryError::Invalid("price must be zero or positive".to_string()));
        }
        let features: Vec<String> = req
            .features
            .iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();

        let query = format!(
            "INSERT INTO modules (id, name, description, price, is_active, features, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, true, $5, NOW(), NOW()) RETURNING {}",
            MODULE_COLUMNS
        );
        let module = sqlx::query_as::<_, Module>(&query)
            .bind(Uuid::new_v4())
            .bind(name)
            .bind(req.description.trim())
            .bind(req.price)
            .bind(&features)
            .fetch_one(&self.pool)
            .await?;
        Ok(module)
    }

    async fn set_module_active(&self, id: Uuid, is_active: bool) -> Result<Module, RepositoryError> {
        let query = format!(
            "UPDATE modules SET is_active = $1, updated_at = NOW() WHERE id = $2 RETURNING {}",
            MODULE_COLUMNS
        );
        sqlx::query_as::<_, Module>(&query)
            .bind(is_active)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound("module"))
    }

    /// list_admins
    ///
    /// All organization admins, newest first, with the organization they run.
    async fn list_admins(&self) -> Vec<AdminSummary> {
        let query = r#"
            SELECT u.id, u.email, u.full_name, u.organization_id,
                   o.name AS organization_name, u.created_at
            FROM users u
            LEFT JOIN organizations o ON o.id = u.organization_id
            WHERE u.role = 'admin'
            ORDER BY u.created_at DESC
        "#;
        sqlx::query_as::<_, AdminSummary>(query)
            .fetch_all(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("list_admins error: {:?}", e);
                vec![]
            })
    }

    async fn get_organization(&self, org_id: Uuid) -> Option<Organization> {
        sqlx::query_as::<_, Organization>(
            "SELECT id, name, slug, admin_id, created_at, updated_at FROM organizations WHERE id = $1",
        )
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_organization error: {:?}", e);
            None
        })
    }

    /// get_admin_dashboard
    ///
    /// Organization overview for its admin. `None` when the organization is gone.
    async fn get_admin_dashboard(&self, org_id: Uuid) -> Option<AdminDashboard> {
        let organization = self.get_organization(org_id).await?;
        let employee_count = self
            .count_for(
                "SELECT COUNT(*) FROM users WHERE organization_id = $1 AND role = 'employee'",
                org_id,
            )
            .await;
        let purchased_modules = self.list_purchased_modules(org_id).await;

        Some(AdminDashboard {
            organization,
            employee_count,
            active_module_count: purchased_modules.len() as i64,
            purchased_modules,
        })
    }

    /// get_organization_overview
    ///
    /// Member count, active purchases and their summed monthly price.
    async fn get_organization_overview(&self, org_id: Uuid) -> Option<OrganizationOverview> {
        let organization = self.get_organization(org_id).await?;
        let member_count = self
            .count_for("SELECT COUNT(*) FROM users WHERE organization_id = $1", org_id)
            .await;
        let active_module_count = self
            .count_for(
                "SELECT COUNT(*) FROM organization_modules WHERE organization_id = $1 AND is_active = true",
                org_id,
            )
            .await;

        let cost_query = r#"
            SELECT COALESCE(SUM(m.price), 0)::float8
            FROM organization_modules om
            JOIN modules m ON m.id = om.module_id
            WHERE om.organization_id = $1 AND om.is_active = true
        "#;
        let total_cost = sqlx::query_scalar::<_, f64>(cost_query)
            .bind(org_id)
            .fetch_one(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("organization cost error: {:?}", e);
                0.0
            });

        Some(OrganizationOverview {
            organization,
            member_count,
            active_module_count,
            total_cost,
        })
    }

    /// list_employees
    ///
    /// Employees of the organization with the modules currently granted to each.
    async fn list_employees(&self, org_id: Uuid) -> Vec<EmployeeSummary> {
        let query = r#"
            SELECT u.id, u.email, u.full_name,
                   COALESCE(
                       ARRAY_AGG(uma.module_id) FILTER (WHERE uma.module_id IS NOT NULL),
                       '{}'
                   ) AS module_ids,
                   u.created_at
            FROM users u
            LEFT JOIN user_module_access uma
                   ON uma.user_id = u.id AND uma.is_active = true
            WHERE u.organization_id = $1 AND u.role = 'employee'
            GROUP BY u.id
            ORDER BY u.created_at DESC
        "#;
        sqlx::query_as::<_, EmployeeSummary>(query)
            .bind(org_id)
            .fetch_all(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("list_employees error: {:?}", e);
                vec![]
            })
    }

    async fn list_catalog(&self) -> Vec<Module> {
        let query = format!(
            "SELECT {} FROM modules WHERE is_active = true ORDER BY name",
            MODULE_COLUMNS
        );
        sqlx::query_as::<_, Module>(&query)
            .fetch_all(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("list_catalog error: {:?}", e);
                vec![]
            })
    }

    async fn list_purchased_modules(&self, org_id: Uuid) -> Vec<PurchasedModule> {
        sqlx::query_as::<_, PurchasedModule>(PURCHASED_MODULES_SQL)
            .bind(org_id)
            .fetch_all(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("list_purchased_modules error: {:?}", e);
                vec![]
            })
    }

    /// purchase_module
    ///
    /// Only active catalog modules can be bought. A previously cancelled purchase
    /// is re-activated instead of duplicated.
    async fn purchase_module(
        &self,
        org_id: Uuid,
        module_id: Uuid,
    ) -> Result<OrganizationModule, RepositoryError> {
        let active: Option<bool> = sqlx::query_scalar("SELECT is_active FROM modules WHERE id = $1")
            .bind(module_id)
            .fetch_optional(&self.pool)
            .await?;
        match active {
            None => return Err(RepositoryError::NotFound("module")),
            Some(false) => {
                return Err(RepositoryError::Invalid("module is not available".to_string()));
            }
            Some(true) => {}
        }

        let existing = sqlx::query_as::<_, OrganizationModule>(
            r#"UPDATE organization_modules SET is_active = true
               WHERE organization_id = $1 AND module_id = $2
               RETURNING id, organization_id, module_id, purchased_at, is_active"#,
        )
        .bind(org_id)
        .bind(module_id)
        .fetch_optional(&self.pool)
        .await?;
        if let Some(purchase) = existing {
            return Ok(purchase);
        }

        let purchase = sqlx::query_as::<_, OrganizationModule>(
            r#"INSERT INTO organization_modules (id, organization_id, module_id, purchased_at, is_active)
               VALUES ($1, $2, $3, NOW(), true)
               RETURNING id, organization_id, module_id, purchased_at, is_active"#,
        )
        .bind(Uuid::new_v4())
        .bind(org_id)
        .bind(module_id)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(organization_id = %org_id, module_id = %module_id, "module purchased");
        Ok(purchase)
    }

    /// grant_module_access
    ///
    /// The user must be an employee of the organization and the organization must
    /// own the module. Re-granting re-activates the existing row.
    async fn grant_module_access(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        module_id: Uuid,
    ) -> Result<UserModuleAccess, RepositoryError> {
        let member_org: Option<Option<Uuid>> = sqlx::query_scalar(
            "SELECT organization_id FROM users WHERE id = $1 AND role = 'employee'",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        if member_org.flatten() != Some(org_id) {
            return Err(RepositoryError::NotFound("employee"));
        }

        let owned: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM organization_modules WHERE organization_id = $1 AND module_id = $2 AND is_active = true",
        )
        .bind(org_id)
        .bind(module_id)
        .fetch_optional(&self.pool)
        .await?;
        if owned.is_none() {
            return Err(RepositoryError::Invalid(
                "organization has not purchased this module".to_string(),
            ));
        }

        let existing = sqlx::query_as::<_, UserModuleAccess>(
            r#"UPDATE user_module_access SET is_active = true
               WHERE user_id = $1 AND module_id = $2
               RETURNING id, user_id, module_id, granted_at, is_active"#,
        )
        .bind(user_id)
        .bind(module_id)
        .fetch_optional(&self.pool)
        .await?;
        if let Some(access) = existing {
            return Ok(access);
        }

        let access = sqlx::query_as::<_, UserModuleAccess>(
            r#"INSERT INTO user_module_access (id, user_id, module_id, granted_at, is_active)
               VALUES ($1, $2, $3, NOW(), true)
               RETURNING id, user_id, module_id, granted_at, is_active"#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(module_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(access)
    }

    async fn revoke_module_access(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        module_id: Uuid,
    ) -> Result<(), RepositoryError> {
        // Scoped through the user's organization so an admin cannot touch other tenants.
        let result = sqlx::query(
            r#"UPDATE user_module_access uma SET is_active = false
               FROM users u
               WHERE uma.user_id = u.id AND u.organization_id = $1
                 AND uma.user_id = $2 AND uma.module_id = $3 AND uma.is_active = true"#,
        )
        .bind(org_id)
        .bind(user_id)
        .bind(module_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound("module access"));
        }
        Ok(())
    }

    /// get_employee_dashboard
    ///
    /// Modules granted to the employee, plus every module their organization owns
    /// flagged with whether it is granted.
    async fn get_employee_dashboard(
        &self,
        user_id: Uuid,
        org_id: Option<Uuid>,
    ) -> EmployeeDashboard {
        let granted_query = r#"
            SELECT m.id, m.name, m.description, m.price::float8 AS price, m.is_active,
                   m.features, m.created_at, m.updated_at
            FROM user_module_access uma
            JOIN modules m ON m.id = uma.module_id
            WHERE uma.user_id = $1 AND uma.is_active = true
            ORDER BY m.name
        "#;
        let granted_modules = sqlx::query_as::<_, Module>(granted_query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("employee granted modules error: {:?}", e);
                vec![]
            });

        let Some(org_id) = org_id else {
            return EmployeeDashboard {
                organization: None,
                granted_modules,
                organization_modules: vec![],
            };
        };

        let organization_query = r#"
            SELECT m.id AS module_id, m.name, m.description, m.features,
                   EXISTS (
                       SELECT 1 FROM user_module_access uma
                       WHERE uma.user_id = $2 AND uma.module_id = m.id AND uma.is_active = true
                   ) AS granted
            FROM organization_modules om
            JOIN modules m ON m.id = om.module_id
            WHERE om.organization_id = $1 AND om.is_active = true
            ORDER BY m.name
        "#;
        let organization_modules = sqlx::query_as::<_, EmployeeModule>(organization_query)
            .bind(org_id)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("employee organization modules error: {:?}", e);
                vec![]
            });

        EmployeeDashboard {
            organization: self.get_organization(org_id).await,
            granted_modules,
            organization_modules,
        }
    }
}
