use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use serde::Deserialize;
use std::sync::Arc;

pub const DEFAULT_SCOPES: &[&str] = &[
    "user-read-private",
    "user-read-email",
    "user-top-read",
    "user-read-recently-played",
    "playlist-read-private",
    "playlist-modify-public",
    "playlist-modify-private",
    "user-modify-playback-state",
    "user-read-playback-state",
    "streaming",
    "user-read-currently-playing",
];

#[derive(Clone)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// e.g. `https://accounts.spotify.com`
    pub accounts_url: String,
    /// e.g. `https://api.spotify.com/v1`
    pub api_url: String,
    pub scopes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    error: Option<String>,
}

pub struct SpotifyAccounts {
    upstream: Arc<dyn UpstreamClient>,
    cfg: SpotifyConfig,
    authorize_url: String,
}

impl SpotifyAccounts {
    pub fn new(
        upstream: Arc<dyn UpstreamClient>,
        cfg: SpotifyConfig,
    ) -> Result<Self, url::ParseError> {
        let scopes = cfg.scopes.join(" ");
        let authorize_url = url::Url::parse_with_params(
            &format!("{}/authorize", cfg.accounts_url.trim_end_matches('/')),
            &[
                ("client_id", cfg.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", cfg.redirect_uri.as_str()),
                ("scope", scopes.as_str()),
            ],
        )?
        .to_string();
        Ok(SpotifyAccounts {
            upstream,
            cfg,
            authorize_url,
        })
    }

    fn token_url(&self) -> String {
        format!("{}/api/token", self.cfg.accounts_url.trim_end_matches('/'))
    }

    async fn request_token(
        &self,
        grant_type: &str,
        fields: &[(&str, &str)],
    ) -> Result<TokenGrant, OAuthProviderError> {
        let mut form = vec![
            ("grant_type", grant_type),
            ("client_id", self.cfg.client_id.as_str()),
            ("client_secret", self.cfg.client_secret.as_str()),
        ];
        form.extend_from_slice(fields);

        let response = self
            .upstream
            .send(UpstreamRequest::new(UpstreamMethod::Post, self.token_url()).form(&form))
            .await
            .map_err(|UpstreamError::Unreachable(e)| OAuthProviderError::Unreachable(e))?;
        debug!(grant_type, status = response.status, "token endpoint answered");

        if response.status == 429 {
            return Err(OAuthProviderError::RateLimited {
                retry_after_secs: response.retry_after_secs,
            });
        }
        if !response.is_success() {
            return Err(OAuthProviderError::Rejected {
                status: response.status,
                message: response
                    .error_message()
                    .unwrap_or_else(|| "token request failed".to_string()),
            });
        }

        let body = response
            .body
            .ok_or_else(|| OAuthProviderError::Malformed("empty token response".to_string()))?;
        let parsed: TokenResponse = serde_json::from_value(body)
            .map_err(|e| OAuthProviderError::Malformed(e.to_string()))?;

        let access_token = parsed.access_token.filter(|t| !t.is_empty()).ok_or_else(|| {
            OAuthProviderError::MissingAccessToken {
                detail: parsed.error.unwrap_or_else(|| "unknown".to_string()),
            }
        })?;

        Ok(TokenGrant {
            access_token,
            refresh_token: parsed.refresh_token.filter(|t| !t.is_empty()),
            expires_in: parsed.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
        })
    }
}

#[async_trait::async_trait]
impl OAuthProvider for SpotifyAccounts {
    fn authorize_url(&self) -> String {
        self.authorize_url.clone()
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, OAuthProviderError> {
        self.request_token(
            "authorization_code",
            &[("code", code), ("redirect_uri", self.cfg.redirect_uri.as_str())],
        )
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, OAuthProviderError> {
        self.request_token("refresh_token", &[("refresh_token", refresh_token)])
            .await
    }

    async fn fetch_profile(
        &self,
        access_token: &UpstreamAccessToken,
    ) -> Result<ProviderProfile, OAuthProviderError> {
        let url = format!("{}/me", self.cfg.api_url.trim_end_matches('/'));
        let response = self
            .upstream
            .send(UpstreamRequest::get(url).bearer(access_token.as_str()))
            .await
            .map_err(|UpstreamError::Unreachable(e)| OAuthProviderError::Unreachable(e))?;
        debug!(status = response.status, "profile endpoint answered");

        if response.status == 429 {
            return Err(OAuthProviderError::RateLimited {
                retry_after_secs: response.retry_after_secs,
            });
        }
        if !response.is_success() {
            return Err(OAuthProviderError::Rejected {
                status: response.status,
                message: response
                    .error_message()
                    .unwrap_or_else(|| "profile request failed".to_string()),
            });
        }

        let body = response
            .body
            .ok_or_else(|| OAuthProviderError::Malformed("empty profile response".to_string()))?;
        serde_json::from_value(body).map_err(|e| OAuthProviderError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use serde_json::json;

    fn form_field<'a>(request: &'a UpstreamRequest, name: &str) -> Option<&'a str> {
        match &request.body {
            UpstreamBody::Form(fields) => fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    #[test]
    fn authorize_url_carries_client_and_scopes() {
        let accounts =
            SpotifyAccounts::new(Arc::new(ScriptedUpstream::new()), spotify_config()).unwrap();
        let url = url::Url::parse(&accounts.authorize_url()).unwrap();
        assert_eq!(url.path(), "/authorize");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("client_id".to_string(), "client-id".to_string())));
        assert!(pairs.contains(&("response_type".to_string(), "code".to_string())));
        assert!(pairs.contains(&(
            "scope".to_string(),
            "user-read-email user-top-read".to_string()
        )));
    }

    #[tokio::test]
    async fn code_exchange_posts_the_authorization_code_grant() {
        let upstream = Arc::new(ScriptedUpstream::new());
        upstream.on(
            TOKEN_URL,
            ok(json!({"access_token": "at", "refresh_token": "rt", "expires_in": 1800})),
        );
        let accounts = SpotifyAccounts::new(upstream.clone(), spotify_config()).unwrap();

        let grant = accounts.exchange_code("the-code").await.unwrap();
        assert_eq!(grant.access_token, "at");
        assert_eq!(grant.refresh_token.as_deref(), Some("rt"));
        assert_eq!(grant.expires_in, 1800);

        let sent = &upstream.requests()[0];
        assert_eq!(sent.method, UpstreamMethod::Post);
        assert_eq!(form_field(sent, "grant_type"), Some("authorization_code"));
        assert_eq!(form_field(sent, "code"), Some("the-code"));
        assert_eq!(form_field(sent, "client_secret"), Some("client-secret"));
    }

    #[tokio::test]
    async fn missing_expires_in_defaults_to_an_hour() {
        let upstream = Arc::new(ScriptedUpstream::new());
        upstream.on(TOKEN_URL, ok(json!({"access_token": "at"})));
        let accounts = SpotifyAccounts::new(upstream.clone(), spotify_config()).unwrap();

        let grant = accounts.refresh("rt").await.unwrap();
        assert_eq!(grant.expires_in, 3600);
        assert!(grant.refresh_token.is_none());
        assert_eq!(
            form_field(&upstream.requests()[0], "grant_type"),
            Some("refresh_token")
        );
    }

    #[tokio::test]
    async fn rejected_code_reports_the_provider_message() {
        let upstream = Arc::new(ScriptedUpstream::new());
        upstream.on(
            TOKEN_URL,
            status(
                400,
                json!({"error": "invalid_grant", "error_description": "Invalid authorization code"}),
            ),
        );
        let accounts = SpotifyAccounts::new(upstream, spotify_config()).unwrap();

        match accounts.exchange_code("used-code").await {
            Err(OAuthProviderError::Rejected { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "Invalid authorization code");
            }
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn success_without_access_token_is_reported() {
        let upstream = Arc::new(ScriptedUpstream::new());
        upstream.on(TOKEN_URL, ok(json!({"error": "server_error"})));
        let accounts = SpotifyAccounts::new(upstream, spotify_config()).unwrap();

        match accounts.exchange_code("code").await {
            Err(OAuthProviderError::MissingAccessToken { detail }) => {
                assert_eq!(detail, "server_error")
            }
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn profile_lookup_uses_the_bearer_token() {
        let upstream = Arc::new(ScriptedUpstream::new());
        upstream.on(ME_URL, ok(json!({"id": "wizzler", "display_name": "W"})));
        let accounts = SpotifyAccounts::new(upstream.clone(), spotify_config()).unwrap();

        let profile = accounts
            .fetch_profile(&UpstreamAccessToken("at".to_string()))
            .await
            .unwrap();
        assert_eq!(profile.id.as_deref(), Some("wizzler"));
        assert_eq!(upstream.requests()[0].bearer.as_deref(), Some("at"));
    }
}
