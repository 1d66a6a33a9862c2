//! PostgreSQL storage for users and their authenticators

use async_trait::async_trait;
use keyreg_core::{Authenticator, User};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};

use super::{CredentialStore, Reservation, StorageError, UserTransaction};

/// PostgreSQL-backed credential storage
pub struct PostgresCredentialStore {
    pool: PgPool,
}

impl PostgresCredentialStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        tracing::info!("Connected to PostgreSQL database");
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Migration(e.to_string()))?;

        tracing::info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for PostgresCredentialStore {
    async fn reserve_pending(
        &self,
        username: &str,
        pending: User,
    ) -> Result<Reservation, StorageError> {
        // The WHERE clause on the conflict arm leaves registered rows untouched,
        // in which case nothing is returned.
        let reserved: Option<String> = sqlx::query_scalar(
            r#"
            INSERT INTO users (username, name, user_id, registered, authenticators)
            VALUES ($1, $2, $3, FALSE, $4)
            ON CONFLICT (username) DO UPDATE SET
                name = EXCLUDED.name,
                user_id = EXCLUDED.user_id,
                authenticators = EXCLUDED.authenticators,
                updated_at = NOW()
            WHERE users.registered = FALSE
            RETURNING username
            "#,
        )
        .bind(username)
        .bind(&pending.name)
        .bind(&pending.id)
        .bind(Json(&pending.authenticators))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        match reserved {
            Some(_) => {
                tracing::debug!(username = %username, "Pending user stored");
                Ok(Reservation::Reserved(pending))
            }
            None => Ok(Reservation::AlreadyRegistered),
        }
    }

    async fn get_user(&self, username: &str) -> Result<Option<User>, StorageError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT name, user_id, registered, authenticators
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(row.map(UserRow::into_user))
    }

    async fn begin(&self) -> Result<Box<dyn UserTransaction>, StorageError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(Box::new(PostgresTransaction { tx }))
    }

    async fn check_health(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UserTransaction for PostgresTransaction {
    async fn get(&mut self, username: &str) -> Result<Option<User>, StorageError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT name, user_id, registered, authenticators
            FROM users
            WHERE username = $1
            FOR UPDATE
            "#,
        )
        .bind(username)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(row.map(UserRow::into_user))
    }

    async fn save(&mut self, username: &str, user: User) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO users (username, name, user_id, registered, authenticators)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (username) DO UPDATE SET
                name = EXCLUDED.name,
                user_id = EXCLUDED.user_id,
                registered = EXCLUDED.registered,
                authenticators = EXCLUDED.authenticators,
                updated_at = NOW()
            "#,
        )
        .bind(username)
        .bind(&user.name)
        .bind(&user.id)
        .bind(user.registered)
        .bind(Json(&user.authenticators))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        self.tx
            .commit()
            .await
            .map_err(|e| StorageError::Query(e.to_string()))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| StorageError::Query(e.to_string()))
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    name: String,
    user_id: String,
    registered: bool,
    authenticators: Json<Vec<Authenticator>>,
}

impl UserRow {
    fn into_user(self) -> User {
        User {
            name: self.name,
            id: self.user_id,
            registered: self.registered,
            authenticators: self.authenticators.0,
        }
    }
}
