use crate::domain_model::*;
use crate::domain_port::*;
use dashmap::DashMap;

/// Process-local token store for development and tests.
#[derive(Default)]
pub struct MemoryTokenStore {
    records: DashMap<UserId, TokenRecord>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self, owner: UserId) -> Result<Option<TokenRecord>, StoreError> {
        Ok(self.records.get(&owner).map(|r| r.value().clone()))
    }

    async fn upsert(&self, record: &TokenRecord) -> Result<(), StoreError> {
        self.records.insert(record.owner, record.clone());
        Ok(())
    }
}
