use super::error::*;
use crate::application_port::*;
use crate::domain_model::UserId;
use crate::logger::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use warp::http::Uri;
use warp::{self, reject};

/// Envelope for failures. Successful proxy payloads are returned as the
/// upstream sent them so the frontend can consume them directly.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn err(failure: &ApiFailure) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code: failure.code,
                message: failure.message.clone(),
                status: failure.status.as_u16(),
            }),
        }
    }
}

fn reply(result: Result<Value, ProxyError>) -> Result<warp::reply::Json, warp::Rejection> {
    result
        .map(|payload| warp::reply::json(&payload))
        .map_err(ApiFailure::from)
        .map_err(reject::custom)
}

fn redirect_to(target: String) -> Result<impl warp::Reply, warp::Rejection> {
    let uri: Uri = target
        .parse()
        .map_err(ApiFailure::internal)
        .map_err(reject::custom)?;
    Ok(warp::redirect::found(uri))
}

// region auth

pub async fn spotify_login(
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    redirect_to(auth_service.authorize_url())
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
}

fn frontend_location(
    frontend_url: &str,
    path: &str,
    params: &[(&str, String)],
) -> Result<String, url::ParseError> {
    let base = format!("{}{}", frontend_url.trim_end_matches('/'), path);
    Ok(url::Url::parse_with_params(&base, params)?.to_string())
}

/// Browser-facing: every outcome is a redirect to the frontend, never an
/// error body.
pub async fn spotify_callback(
    query: CallbackQuery,
    auth_service: Arc<dyn AuthService>,
    frontend_url: Arc<str>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let input = CallbackInput {
        code: query.code,
        error: query.error,
    };
    let location = match auth_service.complete_login(input).await {
        Ok(login) => frontend_location(
            &frontend_url,
            "/dashboard",
            &[
                ("access", login.tokens.access_token.0),
                ("refresh", login.tokens.refresh_token.0),
            ],
        ),
        Err(e) => {
            warn!("login callback failed: {}", e);
            frontend_location(&frontend_url, "", &e.redirect_marker())
        }
    }
    .map_err(ApiFailure::internal)
    .map_err(reject::custom)?;

    redirect_to(location)
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access: String,
    pub refresh: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

pub async fn refresh_session(
    body: RefreshRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let tokens = auth_service
        .refresh_session(&body.refresh)
        .await
        .map_err(ApiFailure::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&RefreshResponse {
        access: tokens.access_token.0,
        refresh: tokens.refresh_token.0,
        access_expires_at: tokens.access_token_expires_at,
        refresh_expires_at: tokens.refresh_token_expires_at,
    }))
}

/// Sessions are stateless; the client drops its tokens.
pub async fn logout() -> Result<impl warp::Reply, warp::Rejection> {
    Ok(warp::reply::json(
        &json!({ "message": "Logged out successfully" }),
    ))
}

pub async fn me(
    user_id: UserId,
    music_service: Arc<dyn MusicService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    reply(music_service.profile(user_id).await)
}

// endregion

// region spotify

#[derive(Debug, Deserialize)]
pub struct TimeRangeQuery {
    pub time_range: Option<String>,
}

pub async fn top_tracks(
    user_id: UserId,
    query: TimeRangeQuery,
    music_service: Arc<dyn MusicService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    reply(
        music_service
            .top_tracks(user_id, query.time_range.as_deref())
            .await,
    )
}

pub async fn top_artists(
    user_id: UserId,
    query: TimeRangeQuery,
    music_service: Arc<dyn MusicService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    reply(
        music_service
            .top_artists(user_id, query.time_range.as_deref())
            .await,
    )
}

#[derive(Debug, Deserialize)]
pub struct PlayTrackRequest {
    pub track_uri: Option<String>,
}

pub async fn play_track(
    user_id: UserId,
    body: PlayTrackRequest,
    music_service: Arc<dyn MusicService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    reply(
        music_service
            .play_track(user_id, body.track_uri.as_deref())
            .await,
    )
}

#[derive(Debug, Deserialize)]
pub struct ArtistQuery {
    pub artist_id: Option<String>,
}

pub async fn artist(
    user_id: UserId,
    query: ArtistQuery,
    music_service: Arc<dyn MusicService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    reply(music_service.artist(user_id, query.artist_id.as_deref()).await)
}

pub async fn artist_albums(
    user_id: UserId,
    query: ArtistQuery,
    music_service: Arc<dyn MusicService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    reply(
        music_service
            .artist_albums(user_id, query.artist_id.as_deref())
            .await,
    )
}

pub async fn my_playlists(
    user_id: UserId,
    music_service: Arc<dyn MusicService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    reply(music_service.my_playlists(user_id).await)
}

pub async fn recently_played(
    user_id: UserId,
    music_service: Arc<dyn MusicService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    reply(music_service.recently_played(user_id).await)
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

pub async fn search_tracks(
    user_id: UserId,
    query: SearchQuery,
    music_service: Arc<dyn MusicService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    reply(music_service.search_tracks(user_id, query.q.as_deref()).await)
}

#[derive(Debug, Deserialize)]
pub struct NextPageQuery {
    pub url: Option<String>,
}

pub async fn next_page(
    user_id: UserId,
    query: NextPageQuery,
    music_service: Arc<dyn MusicService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    reply(music_service.next_page(user_id, query.url.as_deref()).await)
}

// endregion

// region metadata

#[derive(Debug, Deserialize)]
pub struct ArtistNameQuery {
    pub artist_name: Option<String>,
}

pub async fn lastfm_artist_info(
    _user_id: UserId,
    query: ArtistNameQuery,
    music_service: Arc<dyn MusicService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    reply(
        music_service
            .lastfm_artist_info(query.artist_name.as_deref())
            .await,
    )
}

pub async fn lastfm_artist_top_tracks(
    _user_id: UserId,
    query: ArtistNameQuery,
    music_service: Arc<dyn MusicService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    reply(
        music_service
            .lastfm_artist_top_tracks(query.artist_name.as_deref())
            .await,
    )
}

#[derive(Debug, Deserialize)]
pub struct SimilarArtistQuery {
    pub artist_mbid: Option<String>,
}

pub async fn similar_artist_links(
    _user_id: UserId,
    query: SimilarArtistQuery,
    music_service: Arc<dyn MusicService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    reply(
        music_service
            .similar_artist_link(query.artist_mbid.as_deref())
            .await,
    )
}

#[derive(Debug, Deserialize)]
pub struct TrackUrlQuery {
    pub artist_name: Option<String>,
    pub track_name: Option<String>,
}

pub async fn track_url(
    user_id: UserId,
    query: TrackUrlQuery,
    music_service: Arc<dyn MusicService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    reply(
        music_service
            .track_url(
                user_id,
                query.artist_name.as_deref(),
                query.track_name.as_deref(),
            )
            .await,
    )
}

// endregion
