use crate::credential::Credential;
use crate::error::StoreError;
use crate::naming::UserId;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::instrument;

/// A credential together with the compute unit it was issued to.
///
/// The unit id is what ties the secret to one instance: a workspace that
/// was recreated under the same name carries a different id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCredential {
    pub credential: Credential,
    pub unit_id: String,
}

impl StoredCredential {
    pub fn new(credential: Credential, unit_id: impl Into<String>) -> Self {
        Self {
            credential,
            unit_id: unit_id.into(),
        }
    }
}

/// Durable mapping from user to the credential of their current workspace.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    async fn put(&self, user: &UserId, stored: &StoredCredential) -> Result<(), StoreError>;

    async fn get(&self, user: &UserId) -> Result<Option<StoredCredential>, StoreError>;

    /// Forget the user's credential. Deleting an absent entry is not an error.
    async fn delete(&self, user: &UserId) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct SqliteCredentialStore {
    pool: SqlitePool,
}

impl SqliteCredentialStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a reference to the database pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl CredentialStore for SqliteCredentialStore {
    #[instrument(skip(self, stored), fields(user_id = %user, unit_id = %stored.unit_id))]
    async fn put(&self, user: &UserId, stored: &StoredCredential) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO workspace_credentials (user_id, credential, unit_id, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE
            SET credential = excluded.credential,
                unit_id = excluded.unit_id,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user.as_str())
        .bind(stored.credential.expose())
        .bind(&stored.unit_id)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user))]
    async fn get(&self, user: &UserId) -> Result<Option<StoredCredential>, StoreError> {
        let row: Option<(String, String)> = sqlx::query_as(
            "SELECT credential, unit_id FROM workspace_credentials WHERE user_id = ?",
        )
        .bind(user.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(secret, unit_id)| StoredCredential::new(Credential::new(secret), unit_id)))
    }

    #[instrument(skip(self), fields(user_id = %user))]
    async fn delete(&self, user: &UserId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM workspace_credentials WHERE user_id = ?")
            .bind(user.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
