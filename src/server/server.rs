use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_http::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::Settings;
use anyhow::anyhow;
use sqlx::{MySql, Pool};
use std::sync::Arc;
use std::time::Duration;

pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pub music_service: Arc<dyn MusicService>,
    pub frontend_url: Arc<str>,
    pool: Option<Pool<MySql>>,
}

impl Server {
    pub fn new(
        auth_service: Arc<dyn AuthService>,
        music_service: Arc<dyn MusicService>,
        frontend_url: &str,
    ) -> Self {
        Self {
            auth_service,
            music_service,
            frontend_url: Arc::from(frontend_url),
            pool: None,
        }
    }

    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let upstream: Arc<dyn UpstreamClient> = Arc::new(ReqwestUpstreamClient::new(
            Duration::from_secs(settings.http.upstream_timeout_secs),
            &settings.musicbrainz.user_agent,
        )?);

        let (user_repo, token_store, pool): (
            Arc<dyn UserRepo>,
            Arc<dyn TokenStore>,
            Option<Pool<MySql>>,
        ) =
            match settings.storage.backend.as_str() {
                "memory" => {
                    warn!("memory storage backend: users and tokens are lost on restart");
                    let user_repo: Arc<dyn UserRepo> = Arc::new(MemoryUserRepo::new());
                    let token_store: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::new());
                    (user_repo, token_store, None)
                }
                "mysql" => {
                    let dsn = settings
                        .storage
                        .dsn
                        .as_ref()
                        .ok_or_else(|| anyhow!("storage.dsn is required for the mysql backend"))?;
                    let pool = Pool::<MySql>::connect(dsn.expose()).await?;
                    let user_repo: Arc<dyn UserRepo> = Arc::new(MySqlUserRepo::new(pool.clone()));
                    let token_store: Arc<dyn TokenStore> =
                        Arc::new(MySqlTokenStore::new(pool.clone()));
                    (user_repo, token_store, Some(pool))
                }
                other => return Err(anyhow!("Unknown storage backend: {}", other)),
            };

        let cache: Arc<dyn ResponseCache> = match settings.cache.backend.as_str() {
            "memory" => Arc::new(MemoryResponseCache::new()),
            "redis" => {
                let dsn = settings
                    .cache
                    .dsn
                    .as_ref()
                    .ok_or_else(|| anyhow!("cache.dsn is required for the redis backend"))?;
                let redis_client = redis::Client::open(dsn.expose())?;
                let redis_manager = redis_client.get_connection_manager().await?;
                Arc::new(RedisResponseCache::new(
                    redis_manager,
                    settings.cache.prefix.clone(),
                ))
            }
            "none" => Arc::new(NoopResponseCache),
            other => return Err(anyhow!("Unknown cache backend: {}", other)),
        };

        let spotify = &settings.spotify;
        let provider: Arc<dyn OAuthProvider> = Arc::new(SpotifyAccounts::new(
            upstream.clone(),
            SpotifyConfig {
                client_id: spotify.client_id.clone(),
                client_secret: spotify.client_secret.expose().to_string(),
                redirect_uri: spotify.redirect_uri.clone(),
                accounts_url: spotify.accounts_url.clone(),
                api_url: spotify.api_url.clone(),
                scopes: spotify.scopes.clone().unwrap_or_else(|| {
                    DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect()
                }),
            },
        )?);

        let signing_key = settings.session.signing_key.expose();
        if signing_key.is_empty() {
            return Err(anyhow!("session.signing_key must be set"));
        }
        let token_codec: Arc<dyn TokenCodec> = Arc::new(JwtHs256Codec::new(JwtConfig {
            issuer: settings.session.issuer.clone(),
            audience: settings.session.audience.clone(),
            access_ttl: Duration::from_secs(settings.session.access_ttl_secs),
            refresh_ttl: Duration::from_secs(settings.session.refresh_ttl_secs),
            signing_key: signing_key.as_bytes().to_vec(),
        }));

        let lifecycle: Arc<dyn TokenLifecycle> =
            Arc::new(LazyTokenLifecycle::new(token_store.clone(), provider.clone()));

        let auth_service: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
            provider,
            user_repo,
            token_store,
            token_codec,
        ));

        let music_service: Arc<dyn MusicService> = Arc::new(RealMusicService::new(
            lifecycle,
            cache,
            upstream,
            UpstreamEndpoints {
                spotify_api_url: spotify.api_url.clone(),
                lastfm_api_url: settings.lastfm.url.clone(),
                lastfm_api_key: settings.lastfm.api_key.expose().to_string(),
                musicbrainz_api_url: settings.musicbrainz.url.clone(),
                musicbrainz_user_agent: settings.musicbrainz.user_agent.clone(),
            },
        )?);

        info!(
            storage = %settings.storage.backend,
            cache = %settings.cache.backend,
            "server started"
        );

        Ok(Self {
            pool,
            ..Self::new(auth_service, music_service, &settings.frontend.url)
        })
    }

    /// Origin of the frontend, for CORS.
    pub fn frontend_origin(&self) -> anyhow::Result<String> {
        let url = url::Url::parse(&self.frontend_url)?;
        Ok(url.origin().ascii_serialization())
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
