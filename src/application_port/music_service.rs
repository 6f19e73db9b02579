use super::TokenError;
use crate::domain_model::UserId;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("{field} is required")]
    MissingParameter { field: &'static str },
    #[error("{field} is invalid: {reason}")]
    InvalidParameter { field: &'static str, reason: String },
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("upstream returned {status}: {message}")]
    UpstreamHttp { status: u16, message: String },
    #[error("upstream is rate limiting (status {status})")]
    RateLimited {
        status: u16,
        retry_after_secs: Option<u64>,
    },
    #[error("upstream unreachable: {0}")]
    Unreachable(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

/// Proxied operations. Every method takes the caller's identity; required
/// parameters arrive as `Option` so the service can report which is missing.
#[async_trait::async_trait]
pub trait MusicService: Send + Sync {
    async fn profile(&self, user: UserId) -> Result<Value, ProxyError>;
    async fn top_tracks(&self, user: UserId, time_range: Option<&str>)
    -> Result<Value, ProxyError>;
    async fn top_artists(&self, user: UserId, time_range: Option<&str>)
    -> Result<Value, ProxyError>;
    async fn play_track(&self, user: UserId, track_uri: Option<&str>) -> Result<Value, ProxyError>;
    async fn artist(&self, user: UserId, artist_id: Option<&str>) -> Result<Value, ProxyError>;
    async fn artist_albums(&self, user: UserId, artist_id: Option<&str>)
    -> Result<Value, ProxyError>;
    async fn my_playlists(&self, user: UserId) -> Result<Value, ProxyError>;
    async fn recently_played(&self, user: UserId) -> Result<Value, ProxyError>;
    async fn search_tracks(&self, user: UserId, q: Option<&str>) -> Result<Value, ProxyError>;
    async fn next_page(&self, user: UserId, url: Option<&str>) -> Result<Value, ProxyError>;
    async fn lastfm_artist_info(&self, artist_name: Option<&str>) -> Result<Value, ProxyError>;
    async fn lastfm_artist_top_tracks(&self, artist_name: Option<&str>)
    -> Result<Value, ProxyError>;
    async fn similar_artist_link(&self, artist_mbid: Option<&str>) -> Result<Value, ProxyError>;
    async fn track_url(
        &self,
        user: UserId,
        artist_name: Option<&str>,
        track_name: Option<&str>,
    ) -> Result<Value, ProxyError>;
}
