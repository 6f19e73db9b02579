use serde::{Deserialize, Serialize};
use std::fmt;

/// Local identity of a Spotify account.
///
/// Derived deterministically from the provider's user id, so the same account
/// always maps to the same `UserId` across logins and deployments.
#[derive(Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct UserId(pub uuid::Uuid);

impl UserId {
    pub fn from_provider_id(provider_user_id: &str) -> Self {
        let name = format!("https://open.spotify.com/user/{}", provider_user_id);
        UserId(uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_URL, name.as_bytes()))
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::from_str(s).map(UserId)
    }
}

/// Subset of `GET /v1/me` needed to resolve a local identity.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderProfile {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}
