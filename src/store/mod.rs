/// User Data Store
///
/// The Session Authority and the profile routes only see the `UserStore`
/// trait. Uniqueness of `email` is the store's job: a second insert for the same
/// email must fail with `DatabaseError::UniqueConstraintViolation`, whatever
/// pre-checks callers ran.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::AppError;

mod memory;
mod postgres;

pub use memory::InMemoryUserStore;
pub use postgres::PgUserStore;

/// A user row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub dob: Option<NaiveDate>,
    pub address: Option<String>,
}

impl UserRecord {
    /// A freshly registered user: no profile fields yet
    pub fn new(email: &str, password_hash: &str) -> Self {
        Self {
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            first_name: None,
            last_name: None,
            dob: None,
            address: None,
        }
    }

    pub fn apply(&mut self, update: &ProfileUpdate) {
        self.first_name = Some(update.first_name.clone());
        self.last_name = Some(update.last_name.clone());
        self.dob = Some(update.dob);
        if let Some(address) = &update.address {
            self.address = Some(address.clone());
        }
    }
}

/// Validated profile fields. `address: None` leaves the stored address alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    pub dob: NaiveDate,
    pub address: Option<String>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError>;

    async fn insert_user(&self, email: &str, password_hash: &str) -> Result<(), AppError>;

    /// Returns the updated row, or `None` if no user has this email
    async fn update_profile(
        &self,
        email: &str,
        update: &ProfileUpdate,
    ) -> Result<Option<UserRecord>, AppError>;
}
