use crate::domain_model::*;
use crate::domain_port::*;
use chrono::Utc;
use dashmap::DashMap;

#[derive(Default)]
pub struct MemoryUserRepo {
    users: DashMap<UserId, UserRecord>,
}

impl MemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl UserRepo for MemoryUserRepo {
    async fn get_or_create(&self, user: NewUser) -> Result<(UserRecord, bool), StoreError> {
        let mut created = false;
        let record = self
            .users
            .entry(user.user_id)
            .or_insert_with(|| {
                created = true;
                UserRecord {
                    user_id: user.user_id,
                    provider_user_id: user.provider_user_id,
                    display_name: user.display_name,
                    email: user.email,
                    created_at: Utc::now(),
                }
            })
            .value()
            .clone();
        Ok((record, created))
    }

    async fn id_exists(&self, user_id: UserId) -> Result<bool, StoreError> {
        Ok(self.users.contains_key(&user_id))
    }
}
