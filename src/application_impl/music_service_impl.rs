use super::cache_policy;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;

const TIME_RANGES: &[&str] = &["short_term", "medium_term", "long_term"];
const DEFAULT_TIME_RANGE: &str = "medium_term";
const TOP_LIMIT: &str = "20";
const SPOTIFY_ARTIST_LINK: &str = "open.spotify.com/artist/";
// Last.fm reports failures inside a 200 body.
const LASTFM_INVALID_PARAMS: i64 = 6;
const LASTFM_RATE_LIMITED: i64 = 29;

#[derive(Clone)]
pub struct UpstreamEndpoints {
    /// e.g. `https://api.spotify.com/v1`
    pub spotify_api_url: String,
    /// e.g. `https://ws.audioscrobbler.com/2.0/`
    pub lastfm_api_url: String,
    pub lastfm_api_key: String,
    /// e.g. `https://musicbrainz.org/ws/2`
    pub musicbrainz_api_url: String,
    /// MusicBrainz turns away clients without a descriptive agent.
    pub musicbrainz_user_agent: String,
}

/// Result of an upstream fetch, tagged so negative answers get their own TTL.
struct Fetched {
    value: Value,
    negative: bool,
}

impl Fetched {
    fn found(value: Value) -> Self {
        Fetched {
            value,
            negative: false,
        }
    }

    fn link(url: Option<String>) -> Self {
        Fetched {
            negative: url.is_none(),
            value: json!({ "spotify_url": url }),
        }
    }
}

pub struct RealMusicService {
    lifecycle: Arc<dyn TokenLifecycle>,
    cache: Arc<dyn ResponseCache>,
    upstream: Arc<dyn UpstreamClient>,
    endpoints: UpstreamEndpoints,
    spotify_base: url::Url,
}

impl RealMusicService {
    pub fn new(
        lifecycle: Arc<dyn TokenLifecycle>,
        cache: Arc<dyn ResponseCache>,
        upstream: Arc<dyn UpstreamClient>,
        mut endpoints: UpstreamEndpoints,
    ) -> Result<Self, url::ParseError> {
        endpoints.spotify_api_url = endpoints.spotify_api_url.trim_end_matches('/').to_string();
        let spotify_base = url::Url::parse(&format!("{}/", endpoints.spotify_api_url))?;
        Ok(RealMusicService {
            lifecycle,
            cache,
            upstream,
            endpoints,
            spotify_base,
        })
    }

    fn spotify_url(&self, path: &str) -> String {
        format!("{}{}", self.endpoints.spotify_api_url, path)
    }

    async fn access_token(&self, user: UserId) -> Result<UpstreamAccessToken, ProxyError> {
        Ok(self.lifecycle.get_valid_access_token(user).await?)
    }

    /// Cache check, then at most one upstream fetch whose result is stored.
    /// Cache failures degrade to a miss; they never fail the request.
    async fn read_through<F>(
        &self,
        operation: Operation,
        caller: Option<UserId>,
        params: &[&str],
        fetch: F,
    ) -> Result<Value, ProxyError>
    where
        F: Future<Output = Result<Fetched, ProxyError>> + Send,
    {
        if !cache_policy::is_cacheable(operation) {
            return Ok(fetch.await?.value);
        }
        let scope = caller.filter(|_| operation.is_user_scoped());
        let key = cache_policy::compute_key(operation, scope, params);
        match self.cache.get(&key).await {
            Ok(Some(hit)) => {
                debug!(%key, "cache hit");
                return Ok(hit);
            }
            Ok(None) => debug!(%key, "cache miss"),
            Err(e) => warn!(%key, "cache read failed, treating as miss: {}", e),
        }

        let fetched = fetch.await?;
        let ttl = if fetched.negative {
            cache_policy::negative_ttl_for(operation)
                .unwrap_or_else(|| cache_policy::ttl_for(operation))
        } else {
            cache_policy::ttl_for(operation)
        };
        if let Err(e) = self.cache.set(&key, &fetched.value, ttl).await {
            warn!(%key, "cache write failed: {}", e);
        }
        Ok(fetched.value)
    }

    async fn call(&self, request: UpstreamRequest) -> Result<UpstreamResponse, ProxyError> {
        self.upstream
            .send(request)
            .await
            .map_err(|UpstreamError::Unreachable(e)| ProxyError::Unreachable(e))
    }

    /// Spotify call whose successful body is passed through untouched.
    async fn spotify(&self, request: UpstreamRequest) -> Result<Fetched, ProxyError> {
        let response = self.call(request).await?;
        Ok(Fetched::found(pass_through(response)?))
    }

    async fn lastfm(&self, method: &str, artist_name: &str) -> Result<Fetched, ProxyError> {
        let request = UpstreamRequest::get(self.endpoints.lastfm_api_url.clone())
            .query("method", method)
            .query("artist", artist_name)
            .query("api_key", self.endpoints.lastfm_api_key.clone())
            .query("format", "json")
            .query("autocorrect", "1");
        let response = self.call(request).await?;
        if let Some(error) = lastfm_error(&response) {
            return Err(error);
        }
        Ok(Fetched::found(pass_through(response)?))
    }

    async fn spotify_artist_link(&self, artist_mbid: &str) -> Result<Fetched, ProxyError> {
        let url = format!(
            "{}/artist/{}",
            self.endpoints.musicbrainz_api_url.trim_end_matches('/'),
            artist_mbid
        );
        let request = UpstreamRequest::get(url)
            .query("inc", "url-rels")
            .query("fmt", "json")
            .header("User-Agent", self.endpoints.musicbrainz_user_agent.clone())
            .header("Accept", "application/json");
        let response = self.call(request).await?;
        // MusicBrainz answers 503 when a client exceeds its request budget.
        if response.status == 503 {
            return Err(ProxyError::RateLimited {
                status: response.status,
                retry_after_secs: response.retry_after_secs,
            });
        }
        let body = pass_through(response)?;
        Ok(Fetched::link(spotify_link_from_relations(&body)))
    }

    async fn spotify_track_link(
        &self,
        token: &UpstreamAccessToken,
        artist_name: &str,
        track_name: &str,
    ) -> Result<Fetched, ProxyError> {
        let request = UpstreamRequest::get(self.spotify_url("/search"))
            .bearer(token.as_str())
            .query("q", format!("track:{} artist:{}", track_name, artist_name))
            .query("type", "track")
            .query("limit", "1");
        let body = pass_through(self.call(request).await?)?;
        let url = body
            .pointer("/tracks/items/0/external_urls/spotify")
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(Fetched::link(url))
    }

    fn check_next_page(&self, url: &str) -> Result<(), ProxyError> {
        let parsed = url::Url::parse(url).map_err(|e| ProxyError::InvalidParameter {
            field: "url",
            reason: e.to_string(),
        })?;
        let same_origin = parsed.origin() == self.spotify_base.origin();
        if !same_origin || !parsed.path().starts_with(self.spotify_base.path()) {
            return Err(ProxyError::InvalidParameter {
                field: "url",
                reason: "must point at the Spotify Web API".to_string(),
            });
        }
        Ok(())
    }

    async fn top_items(
        &self,
        operation: Operation,
        kind: &str,
        user: UserId,
        time_range: Option<&str>,
    ) -> Result<Value, ProxyError> {
        let time_range = time_range_or_default(time_range)?;
        let token = self.access_token(user).await?;
        let request = UpstreamRequest::get(self.spotify_url(&format!("/me/top/{}", kind)))
            .bearer(token.as_str())
            .query("time_range", time_range)
            .query("limit", TOP_LIMIT);
        self.read_through(operation, Some(user), &[time_range], self.spotify(request))
            .await
    }
}

fn required<'a>(field: &'static str, value: Option<&'a str>) -> Result<&'a str, ProxyError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ProxyError::MissingParameter { field }),
    }
}

/// Values that end up inside an upstream URL path.
fn required_id<'a>(field: &'static str, value: Option<&'a str>) -> Result<&'a str, ProxyError> {
    let value = required(field, value)?;
    if !value
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-')
    {
        return Err(ProxyError::InvalidParameter {
            field,
            reason: "must be an identifier".to_string(),
        });
    }
    Ok(value)
}

fn time_range_or_default(value: Option<&str>) -> Result<&'static str, ProxyError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(DEFAULT_TIME_RANGE),
        Some(v) => TIME_RANGES
            .iter()
            .find(|allowed| **allowed == v)
            .copied()
            .ok_or_else(|| ProxyError::InvalidParameter {
                field: "time_range",
                reason: format!("expected one of {}", TIME_RANGES.join(", ")),
            }),
    }
}

fn acknowledgement() -> Value {
    json!({ "ok": true })
}

/// Maps an upstream response onto the proxy contract: success bodies pass
/// through, empty successes become an acknowledgement, failures carry the
/// upstream status.
fn pass_through(response: UpstreamResponse) -> Result<Value, ProxyError> {
    if response.status == 429 {
        return Err(ProxyError::RateLimited {
            status: response.status,
            retry_after_secs: response.retry_after_secs,
        });
    }
    if !response.is_success() {
        return Err(ProxyError::UpstreamHttp {
            status: response.status,
            message: response
                .error_message()
                .unwrap_or_else(|| "upstream request failed".to_string()),
        });
    }
    Ok(response.body.unwrap_or_else(acknowledgement))
}

fn lastfm_error(response: &UpstreamResponse) -> Option<ProxyError> {
    let body = response.body.as_ref()?;
    let code = body.get("error")?.as_i64()?;
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("Last.fm request failed")
        .to_string();
    Some(match code {
        LASTFM_RATE_LIMITED => ProxyError::RateLimited {
            status: 429,
            retry_after_secs: response.retry_after_secs,
        },
        LASTFM_INVALID_PARAMS => ProxyError::UpstreamHttp {
            status: 404,
            message,
        },
        _ => ProxyError::UpstreamHttp {
            status: 502,
            message,
        },
    })
}

fn spotify_link_from_relations(body: &Value) -> Option<String> {
    body.get("relations")?
        .as_array()?
        .iter()
        .filter_map(|rel| rel.pointer("/url/resource").and_then(Value::as_str))
        .find(|resource| resource.contains(SPOTIFY_ARTIST_LINK))
        .map(str::to_string)
}

#[async_trait::async_trait]
impl MusicService for RealMusicService {
    async fn profile(&self, user: UserId) -> Result<Value, ProxyError> {
        let token = self.access_token(user).await?;
        let request = UpstreamRequest::get(self.spotify_url("/me")).bearer(token.as_str());
        self.read_through(Operation::Me, Some(user), &[], self.spotify(request))
            .await
    }

    async fn top_tracks(
        &self,
        user: UserId,
        time_range: Option<&str>,
    ) -> Result<Value, ProxyError> {
        self.top_items(Operation::TopTracks, "tracks", user, time_range)
            .await
    }

    async fn top_artists(
        &self,
        user: UserId,
        time_range: Option<&str>,
    ) -> Result<Value, ProxyError> {
        self.top_items(Operation::TopArtists, "artists", user, time_range)
            .await
    }

    async fn play_track(&self, user: UserId, track_uri: Option<&str>) -> Result<Value, ProxyError> {
        let track_uri = required("track_uri", track_uri)?;
        let token = self.access_token(user).await?;
        let request = UpstreamRequest::new(UpstreamMethod::Put, self.spotify_url("/me/player/play"))
            .bearer(token.as_str())
            .json(json!({ "uris": [track_uri] }));
        info!(%user, "starting playback");
        self.read_through(Operation::PlayTrack, Some(user), &[], self.spotify(request))
            .await
    }

    async fn artist(&self, user: UserId, artist_id: Option<&str>) -> Result<Value, ProxyError> {
        let artist_id = required_id("artist_id", artist_id)?;
        let token = self.access_token(user).await?;
        let request = UpstreamRequest::get(self.spotify_url(&format!("/artists/{}", artist_id)))
            .bearer(token.as_str());
        self.read_through(Operation::Artist, Some(user), &[artist_id], self.spotify(request))
            .await
    }

    async fn artist_albums(
        &self,
        user: UserId,
        artist_id: Option<&str>,
    ) -> Result<Value, ProxyError> {
        let artist_id = required_id("artist_id", artist_id)?;
        let token = self.access_token(user).await?;
        let request =
            UpstreamRequest::get(self.spotify_url(&format!("/artists/{}/albums", artist_id)))
                .bearer(token.as_str())
                .query("include_groups", "album,single")
                .query("limit", "50");
        self.read_through(
            Operation::ArtistAlbums,
            Some(user),
            &[artist_id],
            self.spotify(request),
        )
        .await
    }

    async fn my_playlists(&self, user: UserId) -> Result<Value, ProxyError> {
        let token = self.access_token(user).await?;
        let request =
            UpstreamRequest::get(self.spotify_url("/me/playlists")).bearer(token.as_str());
        self.read_through(Operation::MyPlaylists, Some(user), &[], self.spotify(request))
            .await
    }

    async fn recently_played(&self, user: UserId) -> Result<Value, ProxyError> {
        let token = self.access_token(user).await?;
        let request = UpstreamRequest::get(self.spotify_url("/me/player/recently-played"))
            .bearer(token.as_str())
            .query("limit", "50");
        self.read_through(
            Operation::RecentlyPlayed,
            Some(user),
            &[],
            self.spotify(request),
        )
        .await
    }

    async fn search_tracks(&self, user: UserId, q: Option<&str>) -> Result<Value, ProxyError> {
        let q = required("q", q)?;
        let token = self.access_token(user).await?;
        let request = UpstreamRequest::get(self.spotify_url("/search"))
            .bearer(token.as_str())
            .query("q", q)
            .query("type", "track")
            .query("limit", TOP_LIMIT);
        self.read_through(Operation::SearchTracks, Some(user), &[q], self.spotify(request))
            .await
    }

    async fn next_page(&self, user: UserId, url: Option<&str>) -> Result<Value, ProxyError> {
        let url = required("url", url)?;
        self.check_next_page(url)?;
        let token = self.access_token(user).await?;
        let request = UpstreamRequest::get(url).bearer(token.as_str());
        self.read_through(Operation::NextPage, Some(user), &[url], self.spotify(request))
            .await
    }

    async fn lastfm_artist_info(&self, artist_name: Option<&str>) -> Result<Value, ProxyError> {
        let artist_name = required("artist_name", artist_name)?;
        self.read_through(
            Operation::LastFmArtistInfo,
            None,
            &[artist_name],
            self.lastfm("artist.getinfo", artist_name),
        )
        .await
    }

    async fn lastfm_artist_top_tracks(
        &self,
        artist_name: Option<&str>,
    ) -> Result<Value, ProxyError> {
        let artist_name = required("artist_name", artist_name)?;
        self.read_through(
            Operation::LastFmArtistTopTracks,
            None,
            &[artist_name],
            self.lastfm("artist.gettoptracks", artist_name),
        )
        .await
    }

    async fn similar_artist_link(&self, artist_mbid: Option<&str>) -> Result<Value, ProxyError> {
        let artist_mbid = required_id("artist_mbid", artist_mbid)?;
        self.read_through(
            Operation::SimilarArtistLink,
            None,
            &[artist_mbid],
            self.spotify_artist_link(artist_mbid),
        )
        .await
    }

    async fn track_url(
        &self,
        user: UserId,
        artist_name: Option<&str>,
        track_name: Option<&str>,
    ) -> Result<Value, ProxyError> {
        let artist_name = required("artist_name", artist_name)?;
        let track_name = required("track_name", track_name)?;
        let token = self.access_token(user).await?;
        self.read_through(
            Operation::TrackUrl,
            Some(user),
            &[artist_name, track_name],
            self.spotify_track_link(&token, artist_name, track_name),
        )
        .await
    }
}
