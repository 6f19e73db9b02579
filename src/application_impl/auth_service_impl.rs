use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use chrono::Utc;
use std::sync::Arc;

pub struct RealAuthService {
    provider: Arc<dyn OAuthProvider>,
    user_repo: Arc<dyn UserRepo>,
    token_store: Arc<dyn TokenStore>,
    token_codec: Arc<dyn TokenCodec>,
}

impl RealAuthService {
    pub fn new(
        provider: Arc<dyn OAuthProvider>,
        user_repo: Arc<dyn UserRepo>,
        token_store: Arc<dyn TokenStore>,
        token_codec: Arc<dyn TokenCodec>,
    ) -> Self {
        Self {
            provider,
            user_repo,
            token_store,
            token_codec,
        }
    }

    async fn issue_session(&self, user_id: UserId) -> Result<SessionTokens, AuthError> {
        let (access_token, access_exp) = self.token_codec.issue_access_token(user_id).await?;
        let (refresh_token, refresh_exp) = self.token_codec.issue_refresh_token(user_id).await?;
        Ok(SessionTokens {
            access_token,
            refresh_token,
            access_token_expires_at: access_exp,
            refresh_token_expires_at: refresh_exp,
        })
    }

    async fn ensure_user_exists(&self, user_id: UserId) -> Result<(), AuthError> {
        let exists = self
            .user_repo
            .id_exists(user_id)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;
        if !exists {
            return Err(AuthError::UserNotFound);
        }
        Ok(())
    }
}

fn exchange_error(error: OAuthProviderError) -> AuthError {
    match error {
        OAuthProviderError::MissingAccessToken { detail } => AuthError::NoAccessToken(detail),
        OAuthProviderError::Unreachable(e) => AuthError::Unreachable(e),
        other => AuthError::TokenExchange(other.to_string()),
    }
}

fn profile_error(error: OAuthProviderError) -> AuthError {
    match error {
        OAuthProviderError::RateLimited { .. } => AuthError::RateLimited,
        OAuthProviderError::Rejected { status, .. } => AuthError::ProfileFailed(status),
        OAuthProviderError::Unreachable(e) => AuthError::Unreachable(e),
        other => AuthError::InternalError(other.to_string()),
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    fn authorize_url(&self) -> String {
        self.provider.authorize_url()
    }

    async fn complete_login(&self, input: CallbackInput) -> Result<LoginResult, AuthError> {
        if let Some(error) = input.error {
            info!(%error, "provider reported a failed authorization");
            return Err(AuthError::AccessDenied);
        }
        let code = input
            .code
            .filter(|c| !c.is_empty())
            .ok_or(AuthError::MissingCode)?;

        let grant = self
            .provider
            .exchange_code(&code)
            .await
            .map_err(exchange_error)?;
        let issued_at = Utc::now();
        let refresh_token = grant
            .refresh_token
            .clone()
            .ok_or(AuthError::NoRefreshToken)?;

        let profile = self
            .provider
            .fetch_profile(&UpstreamAccessToken(grant.access_token.clone()))
            .await
            .map_err(profile_error)?;
        let provider_user_id = profile
            .id
            .filter(|id| !id.is_empty())
            .ok_or(AuthError::NoProviderId)?;

        let (user, created) = self
            .user_repo
            .get_or_create(NewUser {
                user_id: UserId::from_provider_id(&provider_user_id),
                display_name: profile
                    .display_name
                    .unwrap_or_else(|| provider_user_id.clone()),
                email: profile.email.unwrap_or_default(),
                provider_user_id,
            })
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        let record = TokenRecord {
            owner: user.user_id,
            expires_at: grant.expires_at(issued_at),
            access_token: grant.access_token,
            refresh_token,
        };
        self.token_store
            .upsert(&record)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        let tokens = self.issue_session(user.user_id).await?;
        info!(user_id = %user.user_id, created, "login completed");

        Ok(LoginResult {
            user_id: user.user_id,
            created,
            tokens,
        })
    }

    async fn verify_token(&self, token: &str) -> Result<UserId, AuthError> {
        let verify_result = self
            .token_codec
            .verify_access_token(&AccessToken(token.to_string()))
            .await?;
        self.ensure_user_exists(verify_result.user_id).await?;
        Ok(verify_result.user_id)
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<SessionTokens, AuthError> {
        let verify_result = self
            .token_codec
            .verify_refresh_token(&RefreshToken(refresh_token.to_string()))
            .await?;
        self.ensure_user_exists(verify_result.user_id).await?;
        self.issue_session(verify_result.user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::{JwtConfig, JwtHs256Codec, SpotifyAccounts};
    use crate::infra_memory::{MemoryTokenStore, MemoryUserRepo};
    use crate::testing::*;
    use chrono::Duration;
    use serde_json::json;

    struct Fixture {
        upstream: Arc<ScriptedUpstream>,
        tokens: Arc<MemoryTokenStore>,
        users: Arc<MemoryUserRepo>,
        service: RealAuthService,
    }

    fn fixture() -> Fixture {
        let upstream = Arc::new(ScriptedUpstream::new());
        let tokens = Arc::new(MemoryTokenStore::new());
        let users = Arc::new(MemoryUserRepo::new());
        let accounts = Arc::new(SpotifyAccounts::new(upstream.clone(), spotify_config()).unwrap());
        let codec = Arc::new(JwtHs256Codec::new(JwtConfig {
            issuer: "tunebridge.test".to_string(),
            audience: "web".to_string(),
            access_ttl: std::time::Duration::from_secs(300),
            refresh_ttl: std::time::Duration::from_secs(3600),
            signing_key: b"test-key".to_vec(),
        }));
        Fixture {
            service: RealAuthService::new(accounts, users.clone(), tokens.clone(), codec),
            upstream,
            tokens,
            users,
        }
    }

    fn callback(code: &str) -> CallbackInput {
        CallbackInput {
            code: Some(code.to_string()),
            error: None,
        }
    }

    fn script_login(f: &Fixture, access: &str, refresh: &str) {
        f.upstream.on(
            TOKEN_URL,
            ok(json!({"access_token": access, "refresh_token": refresh, "expires_in": 3600})),
        );
        f.upstream.on(
            ME_URL,
            ok(json!({"id": "wizzler", "display_name": "Wiz", "email": "w@example.com"})),
        );
    }

    #[tokio::test]
    async fn callback_creates_user_and_token_record() {
        let f = fixture();
        script_login(&f, "at-1", "rt-1");

        let before = Utc::now();
        let result = f.service.complete_login(callback("code-1")).await.unwrap();
        let after = Utc::now();

        assert!(result.created);
        assert_eq!(result.user_id, UserId::from_provider_id("wizzler"));
        assert!(f.users.id_exists(result.user_id).await.unwrap());

        let record = f.tokens.get(result.user_id).await.unwrap().unwrap();
        assert_eq!(record.access_token, "at-1");
        assert_eq!(record.refresh_token, "rt-1");
        assert!(record.expires_at >= before + Duration::seconds(3600));
        assert!(record.expires_at <= after + Duration::seconds(3600));

        let session_user = f
            .service
            .verify_token(&result.tokens.access_token.0)
            .await
            .unwrap();
        assert_eq!(session_user, result.user_id);
    }

    #[tokio::test]
    async fn second_login_overwrites_the_token_record() {
        let f = fixture();
        f.upstream.on(
            TOKEN_URL,
            ok(json!({"access_token": "at-1", "refresh_token": "rt-1", "expires_in": 3600})),
        );
        f.upstream.on(
            TOKEN_URL,
            ok(json!({"access_token": "at-2", "refresh_token": "rt-2", "expires_in": 60})),
        );
        f.upstream.on(ME_URL, ok(json!({"id": "wizzler"})));

        let first = f.service.complete_login(callback("code-1")).await.unwrap();
        let second = f.service.complete_login(callback("code-2")).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        let record = f.tokens.get(second.user_id).await.unwrap().unwrap();
        assert_eq!(record.access_token, "at-2");
        assert_eq!(record.refresh_token, "rt-2");
        assert!(record.expires_at < Utc::now() + Duration::seconds(61));
    }

    #[tokio::test]
    async fn provider_error_short_circuits_without_network() {
        let f = fixture();
        let result = f
            .service
            .complete_login(CallbackInput {
                code: None,
                error: Some("access_denied".to_string()),
            })
            .await;
        assert!(matches!(result, Err(AuthError::AccessDenied)));
        assert_eq!(f.upstream.calls(), 0);
    }

    #[tokio::test]
    async fn reused_code_is_a_token_exchange_error() {
        let f = fixture();
        f.upstream.on(
            TOKEN_URL,
            status(400, json!({"error": "invalid_grant"})),
        );

        let result = f.service.complete_login(callback("used")).await;

        let err = result.err().unwrap();
        assert!(matches!(err, AuthError::TokenExchange(_)));
        assert_eq!(
            err.redirect_marker(),
            vec![("error", "token_request_failed".to_string())]
        );
        assert_eq!(f.upstream.calls_to(ME_URL), 0);
    }

    #[tokio::test]
    async fn rate_limited_profile_lookup_is_reported() {
        let f = fixture();
        f.upstream.on(
            TOKEN_URL,
            ok(json!({"access_token": "at", "refresh_token": "rt"})),
        );
        f.upstream.on(ME_URL, status(429, json!({"error": {"status": 429}})));

        let result = f.service.complete_login(callback("code")).await;

        assert!(matches!(result, Err(AuthError::RateLimited)));
    }

    #[tokio::test]
    async fn profile_without_id_is_rejected() {
        let f = fixture();
        f.upstream.on(
            TOKEN_URL,
            ok(json!({"access_token": "at", "refresh_token": "rt"})),
        );
        f.upstream.on(ME_URL, ok(json!({"display_name": "ghost"})));

        let result = f.service.complete_login(callback("code")).await;

        assert!(matches!(result, Err(AuthError::NoProviderId)));
    }

    #[tokio::test]
    async fn session_refresh_issues_a_new_pair() {
        let f = fixture();
        script_login(&f, "at", "rt");
        let login = f.service.complete_login(callback("code")).await.unwrap();

        let refreshed = f
            .service
            .refresh_session(&login.tokens.refresh_token.0)
            .await
            .unwrap();

        let user = f
            .service
            .verify_token(&refreshed.access_token.0)
            .await
            .unwrap();
        assert_eq!(user, login.user_id);
    }

    #[tokio::test]
    async fn session_for_unknown_user_is_rejected() {
        let f = fixture();
        let codec = JwtHs256Codec::new(JwtConfig {
            issuer: "tunebridge.test".to_string(),
            audience: "web".to_string(),
            access_ttl: std::time::Duration::from_secs(300),
            refresh_ttl: std::time::Duration::from_secs(3600),
            signing_key: b"test-key".to_vec(),
        });
        let (token, _) = codec
            .issue_access_token(UserId::from_provider_id("stranger"))
            .await
            .unwrap();

        let result = f.service.verify_token(&token.0).await;

        assert!(matches!(result, Err(AuthError::UserNotFound)));
    }
}
