use crate::domain_model::UserId;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("token invalid")]
    TokenInvalid,
    #[error("token expired")]
    TokenExpired,
    #[error("user not found")]
    UserNotFound,
    #[error("authorization was denied at the provider")]
    AccessDenied,
    #[error("authorization code missing")]
    MissingCode,
    #[error("token exchange failed: {0}")]
    TokenExchange(String),
    #[error("token exchange returned no access token ({0})")]
    NoAccessToken(String),
    #[error("token exchange returned no refresh token")]
    NoRefreshToken,
    #[error("provider rate limited the login")]
    RateLimited,
    #[error("profile lookup failed with status {0}")]
    ProfileFailed(u16),
    #[error("profile carries no provider id")]
    NoProviderId,
    #[error("provider unreachable: {0}")]
    Unreachable(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    /// Query parameters appended to the frontend URL when the login callback
    /// fails. The browser lands on an error state instead of a raw fault.
    pub fn redirect_marker(&self) -> Vec<(&'static str, String)> {
        let marker = |code: &str| vec![("error", code.to_string())];
        match self {
            AuthError::AccessDenied => marker("access_denied"),
            AuthError::MissingCode => marker("missing_code"),
            AuthError::TokenExchange(_) => marker("token_request_failed"),
            AuthError::NoAccessToken(detail) => {
                let mut params = marker("no_access_token");
                params.push(("detail", detail.clone()));
                params
            }
            AuthError::NoRefreshToken => marker("no_refresh_token"),
            AuthError::RateLimited => marker("rate_limited"),
            AuthError::ProfileFailed(status) => {
                let mut params = marker("profile_failed");
                params.push(("status", status.to_string()));
                params
            }
            AuthError::NoProviderId => marker("no_spotify_id"),
            AuthError::Unreachable(_) => marker("upstream_unreachable"),
            _ => marker("internal"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessToken(pub String);

#[derive(Debug, Clone, Serialize)]
pub struct RefreshToken(pub String);

/// Session credentials minted by this service, independent of the provider's
/// own tokens.
#[derive(Debug, Clone, Serialize)]
pub struct SessionTokens {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CallbackInput {
    pub code: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub user_id: UserId,
    pub created: bool,
    pub tokens: SessionTokens,
}

#[derive(Debug, Clone)]
pub struct TokenVerifyResult {
    pub user_id: UserId,
}

#[async_trait::async_trait]
pub trait TokenCodec: Send + Sync {
    async fn issue_access_token(&self, user: UserId)
    -> Result<(AccessToken, DateTime<Utc>), AuthError>;
    async fn issue_refresh_token(
        &self,
        user: UserId,
    ) -> Result<(RefreshToken, DateTime<Utc>), AuthError>;
    async fn verify_access_token(&self, token: &AccessToken)
    -> Result<TokenVerifyResult, AuthError>;
    async fn verify_refresh_token(
        &self,
        token: &RefreshToken,
    ) -> Result<TokenVerifyResult, AuthError>;
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Provider URL the browser is sent to in order to start a login.
    fn authorize_url(&self) -> String;
    async fn complete_login(&self, input: CallbackInput) -> Result<LoginResult, AuthError>;
    async fn verify_token(&self, token: &str) -> Result<UserId, AuthError>;
    async fn refresh_session(&self, refresh_token: &str) -> Result<SessionTokens, AuthError>;
}
