//! Test doubles shared by the unit tests.

use crate::domain_port::*;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

pub fn ok(body: Value) -> UpstreamResponse {
    status(200, body)
}

pub fn status(code: u16, body: Value) -> UpstreamResponse {
    UpstreamResponse {
        status: code,
        body: Some(body),
        retry_after_secs: None,
    }
}

pub fn no_content() -> UpstreamResponse {
    UpstreamResponse {
        status: 204,
        body: None,
        retry_after_secs: None,
    }
}

enum Scripted {
    Respond(UpstreamResponse),
    Unreachable,
}

/// Upstream client answering from a per-URL script and recording every
/// request. The last scripted answer for a URL repeats once the queue drains;
/// unscripted URLs get a 404.
#[derive(Default)]
pub struct ScriptedUpstream {
    script: Mutex<HashMap<String, VecDeque<Scripted>>>,
    requests: Mutex<Vec<UpstreamRequest>>,
}

impl ScriptedUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, url: &str, response: UpstreamResponse) -> &Self {
        self.push(url, Scripted::Respond(response));
        self
    }

    pub fn unreachable(&self, url: &str) -> &Self {
        self.push(url, Scripted::Unreachable);
        self
    }

    pub fn requests(&self) -> Vec<UpstreamRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url == url)
            .count()
    }

    fn push(&self, url: &str, answer: Scripted) {
        self.script
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(answer);
    }
}

#[async_trait::async_trait]
impl UpstreamClient for ScriptedUpstream {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, UpstreamError> {
        let url = request.url.clone();
        self.requests.lock().unwrap().push(request);

        let mut script = self.script.lock().unwrap();
        let Some(queue) = script.get_mut(&url) else {
            return Ok(status(404, json!({"error": "not scripted"})));
        };
        let answer = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().map(|a| match a {
                Scripted::Respond(r) => Scripted::Respond(r.clone()),
                Scripted::Unreachable => Scripted::Unreachable,
            })
        };
        match answer {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Unreachable) => Err(UpstreamError::Unreachable(format!(
                "connection refused: {}",
                url
            ))),
            None => Ok(status(404, json!({"error": "not scripted"}))),
        }
    }
}

pub const TOKEN_URL: &str = "https://accounts.test/api/token";
pub const API: &str = "https://api.test/v1";
pub const ME_URL: &str = "https://api.test/v1/me";
pub const LASTFM: &str = "https://lastfm.test/2.0/";
pub const MUSICBRAINZ: &str = "https://musicbrainz.test/ws/2";

pub fn spotify_config() -> crate::application_impl::SpotifyConfig {
    crate::application_impl::SpotifyConfig {
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        redirect_uri: "https://bff.test/api/v1/auth/spotify/callback".to_string(),
        accounts_url: "https://accounts.test".to_string(),
        api_url: API.to_string(),
        scopes: vec!["user-read-email".to_string(), "user-top-read".to_string()],
    }
}
