use super::StoreError;
use crate::domain_model::*;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct NewUser {
    pub user_id: UserId,
    pub provider_user_id: String,
    pub display_name: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user_id: UserId,
    pub provider_user_id: String,
    pub display_name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait UserRepo: Send + Sync {
    /// Returns the existing record untouched, or creates it. The flag is
    /// `true` when the record was created by this call.
    async fn get_or_create(&self, user: NewUser) -> Result<(UserRecord, bool), StoreError>;

    async fn id_exists(&self, user_id: UserId) -> Result<bool, StoreError>;
}
