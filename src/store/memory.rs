use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::{ProfileUpdate, UserRecord, UserStore};
use crate::error::{AppError, DatabaseError};

/// Process-local store, used when no database is configured and in tests
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        Ok(users.get(email).cloned())
    }

    async fn insert_user(&self, email: &str, password_hash: &str) -> Result<(), AppError> {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        if users.contains_key(email) {
            return Err(AppError::Database(DatabaseError::UniqueConstraintViolation(
                format!("users.email = {}", email),
            )));
        }
        users.insert(email.to_string(), UserRecord::new(email, password_hash));
        Ok(())
    }

    async fn update_profile(
        &self,
        email: &str,
        update: &ProfileUpdate,
    ) -> Result<Option<UserRecord>, AppError> {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        Ok(users.get_mut(email).map(|user| {
            user.apply(update);
            user.clone()
        }))
    }
}
