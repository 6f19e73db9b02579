use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use chrono::Utc;
use std::sync::Arc;

/// Hands out upstream access tokens, refreshing them only once a request
/// finds the stored one already expired.
///
/// Two requests racing on the same expired record both refresh; the later
/// upsert wins. Nothing here serializes them.
pub struct LazyTokenLifecycle {
    store: Arc<dyn TokenStore>,
    provider: Arc<dyn OAuthProvider>,
}

impl LazyTokenLifecycle {
    pub fn new(store: Arc<dyn TokenStore>, provider: Arc<dyn OAuthProvider>) -> Self {
        LazyTokenLifecycle { store, provider }
    }
}

#[async_trait::async_trait]
impl TokenLifecycle for LazyTokenLifecycle {
    async fn get_valid_access_token(
        &self,
        owner: UserId,
    ) -> Result<UpstreamAccessToken, TokenError> {
        let record = self
            .store
            .get(owner)
            .await
            .map_err(|e| TokenError::Store(e.to_string()))?
            .ok_or(TokenError::NoToken)?;

        if !record.is_expired_at(Utc::now()) {
            return Ok(record.access_token());
        }

        info!(%owner, expired_at = %record.expires_at, "refreshing upstream token");
        let grant = self
            .provider
            .refresh(&record.refresh_token)
            .await
            .map_err(|e| match e {
                OAuthProviderError::Unreachable(msg) => TokenError::Unreachable(msg),
                OAuthProviderError::RateLimited { retry_after_secs } => {
                    warn!(%owner, ?retry_after_secs, "token refresh throttled");
                    TokenError::RateLimited { retry_after_secs }
                }
                OAuthProviderError::Rejected { .. } => {
                    warn!(%owner, "upstream token refresh rejected: {}", e);
                    TokenError::Refresh(e.to_string())
                }
                OAuthProviderError::MissingAccessToken { .. } | OAuthProviderError::Malformed(_) => {
                    warn!(%owner, "unusable refresh response: {}", e);
                    TokenError::Malformed(e.to_string())
                }
            })?;

        let refreshed = record.refreshed(grant, Utc::now());
        self.store
            .upsert(&refreshed)
            .await
            .map_err(|e| TokenError::Store(e.to_string()))?;

        Ok(refreshed.access_token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::SpotifyAccounts;
    use crate::infra_memory::MemoryTokenStore;
    use crate::testing::*;
    use chrono::{DateTime, Duration};
    use serde_json::json;

    struct Fixture {
        upstream: Arc<ScriptedUpstream>,
        store: Arc<MemoryTokenStore>,
        lifecycle: LazyTokenLifecycle,
        owner: UserId,
    }

    fn fixture() -> Fixture {
        let upstream = Arc::new(ScriptedUpstream::new());
        let store = Arc::new(MemoryTokenStore::new());
        let accounts = Arc::new(SpotifyAccounts::new(upstream.clone(), spotify_config()).unwrap());
        Fixture {
            lifecycle: LazyTokenLifecycle::new(store.clone(), accounts),
            upstream,
            store,
            owner: UserId::from_provider_id("wizzler"),
        }
    }

    async fn seed(f: &Fixture, expires_at: DateTime<Utc>) {
        f.store
            .upsert(&TokenRecord {
                owner: f.owner,
                access_token: "stored-access".to_string(),
                refresh_token: "stored-refresh".to_string(),
                expires_at,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unexpired_token_is_returned_without_network() {
        let f = fixture();
        seed(&f, Utc::now() + Duration::minutes(10)).await;

        let token = f.lifecycle.get_valid_access_token(f.owner).await.unwrap();

        assert_eq!(token.as_str(), "stored-access");
        assert_eq!(f.upstream.calls(), 0);
    }

    #[tokio::test]
    async fn missing_record_fails_without_network() {
        let f = fixture();

        let result = f.lifecycle.get_valid_access_token(f.owner).await;

        assert!(matches!(result, Err(TokenError::NoToken)));
        assert_eq!(f.upstream.calls(), 0);
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_exactly_once_and_persisted() {
        let f = fixture();
        let old_expiry = Utc::now() - Duration::seconds(1);
        seed(&f, old_expiry).await;
        f.upstream.on(
            TOKEN_URL,
            ok(json!({"access_token": "fresh-access", "expires_in": 3600})),
        );

        let token = f.lifecycle.get_valid_access_token(f.owner).await.unwrap();

        assert_eq!(token.as_str(), "fresh-access");
        assert_eq!(f.upstream.calls_to(TOKEN_URL), 1);
        let stored = f.store.get(f.owner).await.unwrap().unwrap();
        assert_eq!(stored.access_token, "fresh-access");
        assert_eq!(stored.refresh_token, "stored-refresh");
        assert!(stored.expires_at > old_expiry);

        // The refreshed record now serves without another round trip.
        f.lifecycle.get_valid_access_token(f.owner).await.unwrap();
        assert_eq!(f.upstream.calls_to(TOKEN_URL), 1);
    }

    #[tokio::test]
    async fn token_expiring_exactly_now_is_refreshed() {
        let f = fixture();
        seed(&f, Utc::now()).await;
        f.upstream
            .on(TOKEN_URL, ok(json!({"access_token": "fresh-access"})));

        let token = f.lifecycle.get_valid_access_token(f.owner).await.unwrap();

        assert_eq!(token.as_str(), "fresh-access");
    }

    #[tokio::test]
    async fn rejected_refresh_is_terminal_and_keeps_the_record() {
        let f = fixture();
        seed(&f, Utc::now() - Duration::hours(1)).await;
        f.upstream.on(
            TOKEN_URL,
            status(400, json!({"error": "invalid_grant", "error_description": "Refresh token revoked"})),
        );

        let result = f.lifecycle.get_valid_access_token(f.owner).await;

        assert!(matches!(result, Err(TokenError::Refresh(_))));
        assert_eq!(f.upstream.calls_to(TOKEN_URL), 1);
        let stored = f.store.get(f.owner).await.unwrap().unwrap();
        assert_eq!(stored.access_token, "stored-access");
    }

    #[tokio::test]
    async fn throttled_refresh_is_rate_limited_not_terminal() {
        let f = fixture();
        seed(&f, Utc::now() - Duration::hours(1)).await;
        f.upstream.on(
            TOKEN_URL,
            UpstreamResponse {
                retry_after_secs: Some(7),
                ..status(429, json!({"error": "rate limited"}))
            },
        );

        let result = f.lifecycle.get_valid_access_token(f.owner).await;

        assert!(matches!(
            result,
            Err(TokenError::RateLimited {
                retry_after_secs: Some(7)
            })
        ));
        let stored = f.store.get(f.owner).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token, "stored-refresh");
    }

    #[tokio::test]
    async fn refresh_response_without_access_token_is_not_a_rejection() {
        let f = fixture();
        seed(&f, Utc::now() - Duration::hours(1)).await;
        f.upstream.on(TOKEN_URL, ok(json!({"expires_in": 3600})));

        let result = f.lifecycle.get_valid_access_token(f.owner).await;

        assert!(matches!(result, Err(TokenError::Malformed(_))));
    }

    #[tokio::test]
    async fn oversized_lifetime_from_provider_is_clamped() {
        let f = fixture();
        seed(&f, Utc::now() - Duration::hours(1)).await;
        f.upstream.on(
            TOKEN_URL,
            ok(json!({"access_token": "x", "expires_in": 9_000_000_000_000_000_000i64})),
        );

        let token = f.lifecycle.get_valid_access_token(f.owner).await.unwrap();

        assert_eq!(token.as_str(), "x");
        let stored = f.store.get(f.owner).await.unwrap().unwrap();
        assert!(stored.expires_at <= Utc::now() + Duration::seconds(MAX_EXPIRES_IN_SECS));
    }

    #[tokio::test]
    async fn unreachable_token_endpoint_is_distinct_from_rejection() {
        let f = fixture();
        seed(&f, Utc::now() - Duration::hours(1)).await;
        f.upstream.unreachable(TOKEN_URL);

        let result = f.lifecycle.get_valid_access_token(f.owner).await;

        assert!(matches!(result, Err(TokenError::Unreachable(_))));
    }
}
