use crate::domain_model::*;

#[derive(Debug, thiserror::Error)]
pub enum OAuthProviderError {
    #[error("provider rejected the request with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("provider is rate limiting")]
    RateLimited { retry_after_secs: Option<u64> },
    #[error("provider response carried no access token ({detail})")]
    MissingAccessToken { detail: String },
    #[error("malformed provider response: {0}")]
    Malformed(String),
    #[error("provider unreachable: {0}")]
    Unreachable(String),
}

/// Accounts side of the streaming provider: authorize URL, token endpoint and
/// the profile lookup used to resolve identities.
#[async_trait::async_trait]
pub trait OAuthProvider: Send + Sync {
    fn authorize_url(&self) -> String;

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, OAuthProviderError>;

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, OAuthProviderError>;

    async fn fetch_profile(
        &self,
        access_token: &UpstreamAccessToken,
    ) -> Result<ProviderProfile, OAuthProviderError>;
}
