use super::error::*;
use super::handler;
use crate::application_port::AuthService;
use crate::domain_model::UserId;
use crate::server::*;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, http, reject};

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    auth_routes(server.clone())
        .or(spotify_routes(server.clone()))
        .or(metadata_routes(server))
}

/// Allows the configured frontend origin to call the API from the browser.
pub fn cors(frontend_origin: &str) -> warp::filters::cors::Builder {
    warp::cors()
        .allow_origin(frontend_origin)
        .allow_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_headers(vec!["authorization", "content-type"])
}

fn auth_routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let login = warp::path!("auth" / "spotify" / "login")
        .and(warp::get())
        .and(with(server.auth_service.clone()))
        .and_then(handler::spotify_login);

    let callback = warp::path!("auth" / "spotify" / "callback")
        .and(warp::get())
        .and(warp::query::<handler::CallbackQuery>())
        .and(with(server.auth_service.clone()))
        .and(with(server.frontend_url.clone()))
        .and_then(handler::spotify_callback);

    let me = warp::path!("auth" / "spotify" / "me")
        .and(warp::get())
        .and(with_session(server.auth_service.clone()))
        .and(with(server.music_service.clone()))
        .and_then(handler::me);

    let refresh = warp::path!("auth" / "token" / "refresh")
        .and(warp::post())
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and_then(handler::refresh_session);

    let logout = warp::path("logout")
        .and(warp::path::end())
        .and(warp::post())
        .and_then(handler::logout);

    login.or(callback).or(me).or(refresh).or(logout)
}

fn spotify_routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let session = with_session(server.auth_service.clone());
    let music = with(server.music_service.clone());

    let top_tracks = warp::path("top_tracks")
        .and(warp::path::end())
        .and(warp::get())
        .and(session.clone())
        .and(warp::query::<handler::TimeRangeQuery>())
        .and(music.clone())
        .and_then(handler::top_tracks);

    let top_artists = warp::path("top_artists")
        .and(warp::path::end())
        .and(warp::get())
        .and(session.clone())
        .and(warp::query::<handler::TimeRangeQuery>())
        .and(music.clone())
        .and_then(handler::top_artists);

    let play_track = warp::path("play_track")
        .and(warp::path::end())
        .and(warp::post())
        .and(session.clone())
        .and(warp::body::json())
        .and(music.clone())
        .and_then(handler::play_track);

    let artist = warp::path("get_artist")
        .and(warp::path::end())
        .and(warp::get())
        .and(session.clone())
        .and(warp::query::<handler::ArtistQuery>())
        .and(music.clone())
        .and_then(handler::artist);

    let artist_albums = warp::path("get_artist_albums")
        .and(warp::path::end())
        .and(warp::get())
        .and(session.clone())
        .and(warp::query::<handler::ArtistQuery>())
        .and(music.clone())
        .and_then(handler::artist_albums);

    let my_playlists = warp::path("get_my_playlists")
        .and(warp::path::end())
        .and(warp::get())
        .and(session.clone())
        .and(music.clone())
        .and_then(handler::my_playlists);

    let recently_played = warp::path("recently_played")
        .and(warp::path::end())
        .and(warp::get())
        .and(session.clone())
        .and(music.clone())
        .and_then(handler::recently_played);

    let search_tracks = warp::path("search_tracks")
        .and(warp::path::end())
        .and(warp::get())
        .and(session.clone())
        .and(warp::query::<handler::SearchQuery>())
        .and(music.clone())
        .and_then(handler::search_tracks);

    let next_page = warp::path("next_page")
        .and(warp::path::end())
        .and(warp::get())
        .and(session)
        .and(warp::query::<handler::NextPageQuery>())
        .and(music)
        .and_then(handler::next_page);

    top_tracks
        .or(top_artists)
        .or(play_track)
        .or(artist)
        .or(artist_albums)
        .or(my_playlists)
        .or(recently_played)
        .or(search_tracks)
        .or(next_page)
}

fn metadata_routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let session = with_session(server.auth_service.clone());
    let music = with(server.music_service.clone());

    let artist_info = warp::path("get_artist_info_via_last_fm")
        .and(warp::path::end())
        .and(warp::get())
        .and(session.clone())
        .and(warp::query::<handler::ArtistNameQuery>())
        .and(music.clone())
        .and_then(handler::lastfm_artist_info);

    let artist_top_tracks = warp::path("get_artist_top_tracks_via_last_fm")
        .and(warp::path::end())
        .and(warp::get())
        .and(session.clone())
        .and(warp::query::<handler::ArtistNameQuery>())
        .and(music.clone())
        .and_then(handler::lastfm_artist_top_tracks);

    let similar_artist_links = warp::path("get_similar_artist_links")
        .and(warp::path::end())
        .and(warp::get())
        .and(session.clone())
        .and(warp::query::<handler::SimilarArtistQuery>())
        .and(music.clone())
        .and_then(handler::similar_artist_links);

    let track_url = warp::path("get_track_url")
        .and(warp::path::end())
        .and(warp::get())
        .and(session)
        .and(warp::query::<handler::TrackUrlQuery>())
        .and(music)
        .and_then(handler::track_url);

    artist_info
        .or(artist_top_tracks)
        .or(similar_artist_links)
        .or(track_url)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

/// Resolves the session bearer token to a user. Every route matches its path
/// and method first so unknown routes still answer 404, then checks the
/// session before reading its query or body.
fn with_session(
    auth_service: Arc<dyn AuthService>,
) -> impl Filter<Extract = (UserId,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>(http::header::AUTHORIZATION.as_str()).and_then(
        move |header: Option<String>| {
            let auth_service = auth_service.clone();
            async move {
                let token = header
                    .as_deref()
                    .and_then(|h| h.strip_prefix("Bearer "))
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| reject::custom(ApiFailure::not_authenticated()))?;
                let user_id = auth_service
                    .verify_token(token)
                    .await
                    .map_err(ApiFailure::from)
                    .map_err(reject::custom)?;
                Ok::<_, warp::Rejection>(user_id)
            }
        },
    )
}
