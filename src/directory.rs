use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::{collections::HashMap, sync::Arc};
use uuid::Uuid;

use crate::{
    error::DirectoryError,
    models::{UserRecord, UserRole},
};

/// UserDirectory
///
/// Read access to `public.users`, the table mapping an auth identity to its role
/// and organization. Queried fresh on every guarded request.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Looks up a user by auth id. `Ok(None)` means the identity has no profile row.
    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, DirectoryError>;

    /// Creates the profile row mirroring a freshly signed-up auth user.
    async fn create_user(&self, user: UserRecord) -> Result<UserRecord, DirectoryError>;
}

pub type DirectoryState = Arc<dyn UserDirectory>;

/// UserRow
///
/// Raw row as stored; `role` is free text until validated.
#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    full_name: String,
    role: String,
    organization_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = DirectoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(UserRecord {
            id: row.id,
            email: row.email,
            full_name: row.full_name,
            role: row.role.parse::<UserRole>()?,
            organization_id: row.organization_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// PostgresDirectory
///
/// `UserDirectory` backed by the Supabase Postgres database.
#[derive(Clone)]
pub struct PostgresDirectory {
    pool: PgPool,
}

impl PostgresDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PostgresDirectory {
    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, DirectoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"SELECT id, email, full_name, role, organization_id, created_at, updated_at
               FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserRecord::try_from).transpose()
    }

    async fn create_user(&self, user: UserRecord) -> Result<UserRecord, DirectoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"INSERT INTO users (id, email, full_name, role, organization_id, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
               RETURNING id, email, full_name, role, organization_id, created_at, updated_at"#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(user.role.as_str())
        .bind(user.organization_id)
        .fetch_one(&self.pool)
        .await?;

        UserRecord::try_from(row)
    }
}

// --- Mock (For Tests) ---

/// MockDirectory
///
/// In-memory directory for tests. With `should_fail` set every lookup errors,
/// simulating an unreachable database.
#[derive(Clone, Default)]
pub struct MockDirectory {
    pub users: HashMap<Uuid, UserRecord>,
    pub should_fail: bool,
}

impl MockDirectory {
    pub fn with_user(user: UserRecord) -> Self {
        let mut users = HashMap::new();
        users.insert(user.id, user);
        Self {
            users,
            should_fail: false,
        }
    }

    pub fn new_failing() -> Self {
        Self {
            users: HashMap::new(),
            should_fail: true,
        }
    }
}

#[async_trait]
impl UserDirectory for MockDirectory {
    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, DirectoryError> {
        if self.should_fail {
            return Err(DirectoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(self.users.get(&id).cloned())
    }

    async fn create_user(&self, user: UserRecord) -> Result<UserRecord, DirectoryError> {
        if self.should_fail {
            return Err(DirectoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(user)
    }
}
