use crate::domain_model::*;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store error: {0}")]
    Backend(String),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

#[async_trait::async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self, owner: UserId) -> Result<Option<TokenRecord>, StoreError>;

    /// Insert or fully replace the record for `record.owner`.
    /// Fields of a previous record are never merged into the new one.
    async fn upsert(&self, record: &TokenRecord) -> Result<(), StoreError>;
}
