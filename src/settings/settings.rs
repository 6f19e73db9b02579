use anyhow::{Result, anyhow};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::fmt;

/// Configuration value that must never reach the logs.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"<redacted>\"")
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub http: Http,
    pub log: Log,
    pub frontend: Frontend,
    pub session: Session,
    pub spotify: Spotify,
    pub lastfm: LastFm,
    pub musicbrainz: MusicBrainz,
    pub storage: Storage,
    pub cache: Cache,
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub address: String,
    /// TLS is enabled when both paths are set.
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,
}

fn default_upstream_timeout_secs() -> u64 {
    15
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Debug, Deserialize)]
pub struct Frontend {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct Session {
    pub issuer: String,
    pub audience: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    pub signing_key: Secret,
}

#[derive(Debug, Deserialize)]
pub struct Spotify {
    pub client_id: String,
    pub client_secret: Secret,
    pub redirect_uri: String,
    pub accounts_url: String,
    pub api_url: String,
    /// Falls back to the full scope set the dashboard needs.
    #[serde(default)]
    pub scopes: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct LastFm {
    pub api_key: Secret,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct MusicBrainz {
    pub user_agent: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
    pub backend: String, // "memory" or "mysql"
    pub dsn: Option<Secret>,
}

#[derive(Debug, Deserialize)]
pub struct Cache {
    pub backend: String, // "memory", "redis" or "none"
    pub dsn: Option<Secret>,
    pub prefix: String,
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

/// Loads the TOML file, then applies `TUNEBRIDGE__SECTION__KEY` environment
/// overrides on top.
pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(
            Environment::with_prefix("TUNEBRIDGE")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dev_settings_load() {
        let settings = parse_settings(Some("settings/dev.toml")).unwrap();
        assert_eq!(settings.storage.backend, "memory");
        assert!(settings.http.cert_path.is_none());
        assert!(settings.session.access_ttl_secs > 0);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(parse_settings(Some("settings/does-not-exist.toml")).is_err());
    }

    #[test]
    fn secrets_are_redacted_in_debug_output() {
        let settings = parse_settings(Some("settings/dev.toml")).unwrap();
        let printed = format!("{:?}", settings);
        assert!(!printed.contains(settings.session.signing_key.expose()));
        assert!(printed.contains("<redacted>"));
    }
}
