use super::UserId;
use chrono::{DateTime, Duration, Utc};
use std::fmt;

pub const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;
/// Upper bound applied to provider-reported lifetimes.
pub const MAX_EXPIRES_IN_SECS: i64 = 365 * 24 * 3600;

/// Bearer credential for the Spotify Web API.
#[derive(Clone, PartialEq, Eq)]
pub struct UpstreamAccessToken(pub String);

impl UpstreamAccessToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for UpstreamAccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UpstreamAccessToken(***)")
    }
}

/// What the token endpoint hands back for either grant type.
#[derive(Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

impl TokenGrant {
    pub fn expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::seconds(self.expires_in.clamp(1, MAX_EXPIRES_IN_SECS))
    }
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("refresh_token", &self.refresh_token.is_some())
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

/// The single upstream token pair held for a user.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub owner: UserId,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Applies a refresh grant. The stored refresh token survives unless the
    /// provider rotated it.
    pub fn refreshed(self, grant: TokenGrant, now: DateTime<Utc>) -> TokenRecord {
        let expires_at = grant.expires_at(now);
        TokenRecord {
            owner: self.owner,
            access_token: grant.access_token,
            refresh_token: grant.refresh_token.unwrap_or(self.refresh_token),
            expires_at,
        }
    }

    pub fn access_token(&self) -> UpstreamAccessToken {
        UpstreamAccessToken(self.access_token.clone())
    }
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("owner", &self.owner)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(expires_at: DateTime<Utc>) -> TokenRecord {
        TokenRecord {
            owner: UserId::from_provider_id("u1"),
            access_token: "old-access".to_string(),
            refresh_token: "old-refresh".to_string(),
            expires_at,
        }
    }

    #[test]
    fn expiry_boundary_counts_as_expired() {
        let now = Utc::now();
        assert!(record(now).is_expired_at(now));
        assert!(!record(now + Duration::seconds(1)).is_expired_at(now));
    }

    #[test]
    fn refresh_keeps_refresh_token_when_provider_does_not_rotate() {
        let now = Utc::now();
        let grant = TokenGrant {
            access_token: "new-access".to_string(),
            refresh_token: None,
            expires_in: 3600,
        };
        let next = record(now - Duration::seconds(5)).refreshed(grant, now);
        assert_eq!(next.access_token, "new-access");
        assert_eq!(next.refresh_token, "old-refresh");
        assert_eq!(next.expires_at, now + Duration::seconds(3600));
    }

    #[test]
    fn refresh_takes_rotated_refresh_token() {
        let now = Utc::now();
        let grant = TokenGrant {
            access_token: "new-access".to_string(),
            refresh_token: Some("new-refresh".to_string()),
            expires_in: 60,
        };
        let next = record(now).refreshed(grant, now);
        assert_eq!(next.refresh_token, "new-refresh");
    }

    #[test]
    fn provider_lifetime_is_clamped() {
        let now = Utc::now();
        let grant = |expires_in| TokenGrant {
            access_token: "a".to_string(),
            refresh_token: None,
            expires_in,
        };
        assert_eq!(
            grant(9_000_000_000_000_000_000).expires_at(now),
            now + Duration::seconds(MAX_EXPIRES_IN_SECS)
        );
        assert_eq!(grant(i64::MIN).expires_at(now), now + Duration::seconds(1));
        assert_eq!(grant(0).expires_at(now), now + Duration::seconds(1));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let out = format!("{:?}", record(Utc::now()));
        assert!(!out.contains("old-access"));
        assert!(!out.contains("old-refresh"));
    }
}
