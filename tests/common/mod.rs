#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use rbac_portal::{
    AppConfig, AppState, MockDirectory, MockSessionProvider,
    directory::DirectoryState,
    error::RepositoryError,
    models::{
        AdminDashboard, AdminSummary, CreateModuleRequest, CreateOrganizationRequest,
        EmployeeDashboard, EmployeeSummary, Module, Organization, OrganizationModule,
        OrganizationOverview, OrganizationSummary, PurchasedModule, SuperDashboardStats, UserModuleAccess, UserRecord,
        UserRole,
    },
    repository::{Repository, RepositoryState},
    session::SessionState,
};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

// --- MOCK REPOSITORY IMPLEMENTATION ---

// Canned page data plus a log of the write calls handlers make.
#[derive(Default)]
pub struct MockRepoControl {
    pub stats_to_return: SuperDashboardStats,
    pub modules_to_return: Vec<Module>,
    pub fail_writes: bool,
    pub purchases: Mutex<Vec<(Uuid, Uuid)>>,
    pub grants: Mutex<Vec<(Uuid, Uuid, Uuid)>>,
}

pub fn organization(id: Uuid, admin_id: Uuid) -> Organization {
    let now = Utc::now();
    Organization {
        id,
        name: "Acme".to_string(),
        slug: "acme".to_string(),
        admin_id,
        created_at: now,
        updated_at: now,
    }
}

pub fn module(name: &str) -> Module {
    let now = Utc::now();
    Module {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: format!("{} module", name),
        price: 49.0,
        is_active: true,
        features: vec!["reports".to_string()],
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl Repository for MockRepoControl {
    async fn get_super_stats(&self) -> SuperDashboardStats {
        self.stats_to_return.clone()
    }

    async fn list_organizations(&self) -> Vec<OrganizationSummary> {
        vec![]
    }

    async fn create_organization(
        &self,
        req: CreateOrganizationRequest,
    ) -> Result<Organization, RepositoryError> {
        if self.fail_writes {
            return Err(RepositoryError::NotFound("admin"));
        }
        let mut org = organization(Uuid::new_v4(), req.admin_id);
        org.name = req.name;
        org.slug = req.slug;
        Ok(org)
    }

    async fn list_modules(&self) -> Vec<Module> {
        self.modules_to_return.clone()
    }

    async fn create_module(&self, req: CreateModuleRequest) -> Result<Module, RepositoryError> {
        if req.name.trim().is_empty() {
            return Err(RepositoryError::Invalid("module name is required".to_string()));
        }
        let mut created = module(&req.name);
        created.price = req.price;
        Ok(created)
    }

    async fn set_module_active(&self, id: Uuid, is_active: bool) -> Result<Module, RepositoryError> {
        let mut updated = module("toggled");
        updated.id = id;
        updated.is_active = is_active;
        Ok(updated)
    }

    async fn list_admins(&self) -> Vec<AdminSummary> {
        vec![]
    }

    async fn get_organization(&self, org_id: Uuid) -> Option<Organization> {
        Some(organization(org_id, Uuid::new_v4()))
    }

    async fn get_admin_dashboard(&self, org_id: Uuid) -> Option<AdminDashboard> {
        Some(AdminDashboard {
            organization: organization(org_id, Uuid::new_v4()),
            employee_count: 3,
            active_module_count: 1,
            purchased_modules: vec![],
        })
    }

    async fn get_organization_overview(&self, org_id: Uuid) -> Option<OrganizationOverview> {
        let active: Vec<&Module> = self.modules_to_return.iter().filter(|m| m.is_active).collect();
        Some(OrganizationOverview {
            organization: organization(org_id, Uuid::new_v4()),
            member_count: 4,
            active_module_count: active.len() as i64,
            total_cost: active.iter().map(|m| m.price).sum(),
        })
    }

    async fn list_employees(&self, _org_id: Uuid) -> Vec<EmployeeSummary> {
        vec![]
    }

    async fn list_catalog(&self) -> Vec<Module> {
        self.modules_to_return.clone()
    }

    async fn list_purchased_modules(&self, _org_id: Uuid) -> Vec<PurchasedModule> {
        vec![]
    }

    async fn purchase_module(
        &self,
        org_id: Uuid,
        module_id: Uuid,
    ) -> Result<OrganizationModule, RepositoryError> {
        if self.fail_writes {
            return Err(RepositoryError::Invalid("module is not active".to_string()));
        }
        self.purchases.lock().unwrap().push((org_id, module_id));
        Ok(OrganizationModule {
            id: Uuid::new_v4(),
            organization_id: org_id,
            module_id,
            purchased_at: Utc::now(),
            is_active: true,
        })
    }

    async fn grant_module_access(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        module_id: Uuid,
    ) -> Result<UserModuleAccess, RepositoryError> {
        if self.fail_writes {
            return Err(RepositoryError::NotFound("employee"));
        }
        self.grants.lock().unwrap().push((org_id, user_id, module_id));
        Ok(UserModuleAccess {
            id: Uuid::new_v4(),
            user_id,
            module_id,
            granted_at: Utc::now(),
            is_active: true,
        })
    }

    async fn revoke_module_access(
        &self,
        _org_id: Uuid,
        _user_id: Uuid,
        _module_id: Uuid,
    ) -> Result<(), RepositoryError> {
        if self.fail_writes {
            return Err(RepositoryError::NotFound("module access"));
        }
        Ok(())
    }

    async fn get_employee_dashboard(
        &self,
        _user_id: Uuid,
        org_id: Option<Uuid>,
    ) -> EmployeeDashboard {
        EmployeeDashboard {
            organization: org_id.map(|id| organization(id, Uuid::new_v4())),
            granted_modules: self.modules_to_return.clone(),
            organization_modules: vec![],
        }
    }
}

// --- Fixtures ---

pub fn user(role: UserRole, organization_id: Option<Uuid>) -> UserRecord {
    let now = Utc::now();
    UserRecord {
        id: Uuid::new_v4(),
        email: format!("{}@example.com", role),
        full_name: "Test User".to_string(),
        role,
        organization_id,
        created_at: now,
        updated_at: now,
    }
}

pub fn state_with(
    repo: MockRepoControl,
    directory: MockDirectory,
    session: Option<MockSessionProvider>,
) -> AppState {
    AppState {
        repo: Arc::new(repo) as RepositoryState,
        directory: Arc::new(directory) as DirectoryState,
        session: session.map(|s| Arc::new(s) as SessionState),
        config: AppConfig::default(),
    }
}

/// A signed-in session whose identity resolves to `user` in the directory.
pub fn signed_in_state(user: &UserRecord) -> (AppState, MockSessionProvider) {
    let session = MockSessionProvider::signed_in(user.id);
    let state = state_with(
        MockRepoControl::default(),
        MockDirectory::with_user(user.clone()),
        Some(session.clone()),
    );
    (state, session)
}
