use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::PgPool;

use super::{ProfileUpdate, UserRecord, UserStore};
use crate::error::AppError;

type UserRow = (
    String,
    String,
    Option<String>,
    Option<String>,
    Option<NaiveDate>,
    Option<String>,
);

fn into_record(row: UserRow) -> UserRecord {
    let (email, password_hash, first_name, last_name, dob, address) = row;
    UserRecord {
        email,
        password_hash,
        first_name,
        last_name,
        dob,
        address,
    }
}

/// Postgres-backed store over the `users` table (see `migrations/`)
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT email, password_hash, first_name, last_name, dob, address
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(into_record))
    }

    async fn insert_user(&self, email: &str, password_hash: &str) -> Result<(), AppError> {
        // A concurrent duplicate surfaces as unique_violation on users_pkey
        sqlx::query(
            r#"
            INSERT INTO users (email, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(Utc::now())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_profile(
        &self,
        email: &str,
        update: &ProfileUpdate,
    ) -> Result<Option<UserRecord>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
            SET first_name = $2,
                last_name = $3,
                dob = $4,
                address = COALESCE($5, address),
                updated_at = $6
            WHERE email = $1
            RETURNING email, password_hash, first_name, last_name, dob, address
            "#,
        )
        .bind(email)
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(update.dob)
        .bind(update.address.as_deref())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(into_record))
    }
}
