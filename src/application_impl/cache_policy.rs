//! Cache keys and TTLs for proxied responses.
//!
//! A key is `operation[:u.<user>][:p.<value>|:h.<digest>]*`. Short,
//! identifier-like parameters are embedded as-is; anything else (free text,
//! URLs, long values) is replaced by a truncated SHA-256 digest so keys stay
//! bounded and a parameter can never smuggle in a `:` separator.

use crate::domain_model::{Operation, UserId};
use sha2::{Digest, Sha256};
use std::time::Duration;

const MAX_INLINE_PARAM_LEN: usize = 64;
// 128 bits
const DIGEST_HEX_LEN: usize = 32;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

pub fn compute_key(operation: Operation, scope: Option<UserId>, params: &[&str]) -> String {
    let mut key = String::from(operation.name());
    if let Some(user) = scope {
        key.push_str(":u.");
        key.push_str(&user.to_string());
    }
    for param in params {
        key.push(':');
        if is_inline_param(param) {
            key.push_str("p.");
            key.push_str(param);
        } else {
            key.push_str("h.");
            key.push_str(&digest(param));
        }
    }
    key
}

/// TTL for a successful upstream payload.
pub fn ttl_for(operation: Operation) -> Duration {
    let secs = match operation {
        Operation::TopTracks => 30 * MINUTE,
        Operation::Me | Operation::TopArtists | Operation::MyPlaylists | Operation::Artist => DAY,
        Operation::ArtistAlbums
        | Operation::LastFmArtistInfo
        | Operation::LastFmArtistTopTracks
        | Operation::SimilarArtistLink => 3 * DAY,
        Operation::RecentlyPlayed | Operation::NextPage => 10 * MINUTE,
        Operation::SearchTracks => HOUR,
        Operation::TrackUrl => 120 * DAY,
        Operation::PlayTrack => 0,
    };
    Duration::from_secs(secs)
}

/// TTL for a "known to have no answer" result, for operations that produce one.
pub fn negative_ttl_for(operation: Operation) -> Option<Duration> {
    match operation {
        Operation::SimilarArtistLink | Operation::TrackUrl => Some(Duration::from_secs(DAY)),
        _ => None,
    }
}

pub fn is_cacheable(operation: Operation) -> bool {
    !ttl_for(operation).is_zero()
}

fn is_inline_param(param: &str) -> bool {
    !param.is_empty()
        && param.len() <= MAX_INLINE_PARAM_LEN
        && param
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

fn digest(param: &str) -> String {
    let hash = Sha256::digest(param.as_bytes());
    let mut hex = hex::encode(hash);
    hex.truncate(DIGEST_HEX_LEN);
    hex
}
