use crate::domain_model::{UpstreamAccessToken, UserId};

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("no upstream token linked to this user")]
    NoToken,
    #[error("upstream refused to refresh the token: {0}")]
    Refresh(String),
    #[error("token endpoint is rate limiting")]
    RateLimited { retry_after_secs: Option<u64> },
    #[error("unusable token endpoint response: {0}")]
    Malformed(String),
    #[error("token endpoint unreachable: {0}")]
    Unreachable(String),
    #[error("token store error: {0}")]
    Store(String),
}

#[async_trait::async_trait]
pub trait TokenLifecycle: Send + Sync {
    /// Returns an access token that was unexpired at lookup time, refreshing
    /// the stored record first when it has lapsed.
    async fn get_valid_access_token(&self, owner: UserId)
    -> Result<UpstreamAccessToken, TokenError>;
}
