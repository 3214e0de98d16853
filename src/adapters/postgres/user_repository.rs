//! PostgreSQL implementation of UserRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, UserId};
use crate::domain::user::User;
use crate::ports::UserRepository;

/// PostgreSQL implementation of the UserRepository port.
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    /// Creates a new PostgresUserRepository with the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a user.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    country: Option<String>,
    city: Option<String>,
    zip_code: Option<String>,
    address: Option<String>,
    is_approved: bool,
    is_admin: bool,
    gateway_customer_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: UserId::from_uuid(row.id),
            email: row.email,
            password_hash: row.password_hash,
            first_name: row.first_name,
            last_name: row.last_name,
            country: row.country,
            city: row.city,
            zip_code: row.zip_code,
            address: row.address,
            is_approved: row.is_approved,
            is_admin: row.is_admin,
            gateway_customer_id: row.gateway_customer_id,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        }
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, email, password_hash, first_name, last_name, country, city,
           zip_code, address, is_approved, is_admin, gateway_customer_id,
           created_at, updated_at
    FROM users
"#;

fn db_error(context: &str, e: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, e))
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create(&self, user: &User) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, email, password_hash, first_name, last_name, country, city,
                zip_code, address, is_approved, is_admin, gateway_customer_id,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.country)
        .bind(&user.city)
        .bind(&user.zip_code)
        .bind(&user.address)
        .bind(user.is_approved)
        .bind(user.is_admin)
        .bind(&user.gateway_customer_id)
        .bind(user.created_at.as_datetime())
        .bind(user.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some("users_email_key") {
                    return DomainError::validation("email", "Email already registered");
                }
            }
            db_error("Failed to create user", e)
        })?;

        Ok(())
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, DomainError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("{} WHERE id = $1", SELECT_COLUMNS))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("Failed to load user", e))?;

        Ok(row.map(User::from))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("{} WHERE email = $1", SELECT_COLUMNS))
                .bind(email)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("Failed to load user", e))?;

        Ok(row.map(User::from))
    }

    async fn find_by_gateway_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<User>, DomainError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("{} WHERE gateway_customer_id = $1", SELECT_COLUMNS))
                .bind(customer_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("Failed to load user", e))?;

        Ok(row.map(User::from))
    }

    async fn set_gateway_customer_id(
        &self,
        user_id: &UserId,
        customer_id: &str,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            "UPDATE users SET gateway_customer_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(user_id.as_uuid())
        .bind(customer_id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to bind gateway customer", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(ErrorCode::UserNotFound, "User not found"));
        }

        Ok(())
    }
}
