//! Configuration for the token lifecycle.
//!
//! Values come from the process environment. A `.env` file in the local data
//! directory (`<data_local_dir>/spotify-auth/.env`) is read first so users can
//! keep credentials out of their shell profile; variables already present in
//! the environment take precedence over the file.
//!
//! Required:
//! - `SPOTIFY_CLIENT_ID`
//! - `SPOTIFY_CLIENT_SECRET`
//! - `SPOTIFY_REDIRECT_URI` (loopback http, e.g. `http://127.0.0.1:8888/callback`)
//!
//! Optional overrides: `SPOTIFY_AUTH_URL`, `SPOTIFY_TOKEN_URL`,
//! `SPOTIFY_AUTH_SCOPE`.

use std::{
    env,
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
    path::PathBuf,
    time::Duration,
};

use reqwest::Url;

use crate::{error::AuthError, server::ListenerConfig, types::ClientCredentials};

pub const CLIENT_ID_VAR: &str = "SPOTIFY_CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "SPOTIFY_CLIENT_SECRET";
pub const REDIRECT_URI_VAR: &str = "SPOTIFY_REDIRECT_URI";
pub const AUTH_URL_VAR: &str = "SPOTIFY_AUTH_URL";
pub const TOKEN_URL_VAR: &str = "SPOTIFY_TOKEN_URL";
pub const SCOPE_VAR: &str = "SPOTIFY_AUTH_SCOPE";

pub const DEFAULT_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Scopes needed by the playback, search, playlist and profile tools.
pub const DEFAULT_SCOPES: &[&str] = &[
    "user-read-private",
    "user-read-email",
    "user-read-playback-state",
    "user-modify-playback-state",
    "user-read-currently-playing",
    "user-read-recently-played",
    "user-top-read",
    "user-library-read",
    "user-library-modify",
    "playlist-read-private",
    "playlist-modify-private",
    "playlist-modify-public",
];

/// Tokens expiring within this window are refreshed before use.
pub const REFRESH_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Loads `<data_local_dir>/spotify-auth/.env` into the environment.
///
/// A missing file is not an error. Existing variables are never overwritten.
pub fn load_env() -> Result<(), String> {
    let path = env_file_path();
    if !path.is_file() {
        return Ok(());
    }

    dotenv::from_path(&path).map_err(|e| format!("cannot parse {}: {}", path.display(), e))
}

pub fn env_file_path() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("spotify-auth/.env");
    path
}

impl ClientCredentials {
    /// Reads the client identity from the process environment.
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the client identity through `lookup`, failing if any value is
    /// absent or blank.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AuthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| AuthError::Configuration(format!("{key} must be set")))
        };

        Ok(ClientCredentials {
            client_id: required(CLIENT_ID_VAR)?,
            client_secret: required(CLIENT_SECRET_VAR)?,
            redirect_uri: required(REDIRECT_URI_VAR)?,
        })
    }
}

/// Endpoints, scopes and listener settings derived from the environment and
/// the registered redirect URI.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub authorize_url: Url,
    pub token_url: Url,
    pub scopes: Vec<String>,
    pub listener: ListenerConfig,
    pub refresh_window: Duration,
}

impl AuthSettings {
    pub fn from_env(credentials: &ClientCredentials) -> Result<Self, AuthError> {
        Self::from_lookup(credentials, |key| env::var(key).ok())
    }

    pub fn from_lookup<F>(credentials: &ClientCredentials, lookup: F) -> Result<Self, AuthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let authorize_url = parse_endpoint(
            AUTH_URL_VAR,
            &optional(AUTH_URL_VAR).unwrap_or_else(|| DEFAULT_AUTH_URL.to_string()),
        )?;
        let token_url = parse_endpoint(
            TOKEN_URL_VAR,
            &optional(TOKEN_URL_VAR).unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
        )?;

        let scopes = match optional(SCOPE_VAR) {
            Some(raw) => raw.split_whitespace().map(str::to_string).collect(),
            None => DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
        };

        Ok(AuthSettings {
            authorize_url,
            token_url,
            scopes,
            listener: listener_from_redirect(&credentials.redirect_uri)?,
            refresh_window: REFRESH_WINDOW,
        })
    }
}

fn parse_endpoint(key: &str, raw: &str) -> Result<Url, AuthError> {
    Url::parse(raw).map_err(|e| AuthError::Configuration(format!("{key} is not a valid URL: {e}")))
}

/// Derives the callback listener address and path from the redirect URI.
///
/// The URI must be plain `http` on a loopback host, since the listener binds
/// exactly that socket. Without an explicit port the http default 80 is used.
///
/// `localhost` binds `127.0.0.1` only. Browsers that resolve `localhost` to
/// `::1` first reach the listener through their IPv4 fallback; register
/// `http://[::1]:<port>/...` to listen on IPv6 instead.
pub fn listener_from_redirect(redirect_uri: &str) -> Result<ListenerConfig, AuthError> {
    let invalid = |reason: &str| {
        AuthError::Configuration(format!("{REDIRECT_URI_VAR} {reason}: {redirect_uri}"))
    };

    let url = Url::parse(redirect_uri).map_err(|_| invalid("is not a valid URL"))?;
    if url.scheme() != "http" {
        return Err(invalid("must use http"));
    }

    let ip = match url.host_str() {
        Some("127.0.0.1") | Some("localhost") => IpAddr::V4(Ipv4Addr::LOCALHOST),
        Some("[::1]") => IpAddr::V6(Ipv6Addr::LOCALHOST),
        _ => return Err(invalid("must point at a loopback host")),
    };
    let port = url
        .port_or_known_default()
        .ok_or_else(|| invalid("must include a port"))?;

    Ok(ListenerConfig {
        ip,
        port,
        path: url.path().to_string(),
        ..ListenerConfig::default()
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn full_env() -> Vec<(&'static str, &'static str)> {
        vec![
            (CLIENT_ID_VAR, "client"),
            (CLIENT_SECRET_VAR, "secret"),
            (REDIRECT_URI_VAR, "http://127.0.0.1:8888/callback"),
        ]
    }

    #[test]
    fn credentials_from_complete_environment() {
        let creds = ClientCredentials::from_lookup(lookup(&full_env())).unwrap();
        assert_eq!(creds.client_id, "client");
        assert_eq!(creds.client_secret, "secret");
        assert_eq!(creds.redirect_uri, "http://127.0.0.1:8888/callback");
    }

    #[test]
    fn missing_or_blank_values_fail() {
        for key in [CLIENT_ID_VAR, CLIENT_SECRET_VAR, REDIRECT_URI_VAR] {
            let without: Vec<_> = full_env().into_iter().filter(|(k, _)| *k != key).collect();
            let err = ClientCredentials::from_lookup(lookup(&without)).unwrap_err();
            assert!(matches!(err, AuthError::Configuration(ref m) if m.contains(key)));

            let blank: Vec<_> = full_env()
                .into_iter()
                .map(|(k, v)| if k == key { (k, "  ") } else { (k, v) })
                .collect();
            assert!(ClientCredentials::from_lookup(lookup(&blank)).is_err());
        }
    }

    #[test]
    fn listener_follows_redirect_uri() {
        let config = listener_from_redirect("http://localhost:9090/auth/callback").unwrap();
        assert_eq!(config.ip, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.port, 9090);
        assert_eq!(config.path, "/auth/callback");

        let v6 = listener_from_redirect("http://[::1]:8888/callback").unwrap();
        assert_eq!(v6.ip, IpAddr::V6(Ipv6Addr::LOCALHOST));
    }

    #[test]
    fn redirect_uri_must_be_loopback_http() {
        assert!(listener_from_redirect("http://example.com:8888/callback").is_err());
        assert!(listener_from_redirect("https://127.0.0.1:8888/callback").is_err());
        assert!(listener_from_redirect("http://0.0.0.0:8888/callback").is_err());
        assert!(listener_from_redirect("not a url").is_err());
    }

    #[test]
    fn default_http_port_is_accepted() {
        let explicit = listener_from_redirect("http://127.0.0.1:80/callback").unwrap();
        assert_eq!(explicit.port, 80);

        let implied = listener_from_redirect("http://127.0.0.1/callback").unwrap();
        assert_eq!(implied.port, 80);
        assert_eq!(implied.path, "/callback");
    }

    #[test]
    fn localhost_binds_ipv4_loopback_only() {
        let config = listener_from_redirect("http://localhost:8888/callback").unwrap();
        assert_eq!(config.ip, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert!(!config.ip.is_ipv6());
    }

    #[test]
    fn settings_use_defaults_and_overrides() {
        let creds = ClientCredentials::from_lookup(lookup(&full_env())).unwrap();

        let defaults = AuthSettings::from_lookup(&creds, lookup(&[])).unwrap();
        assert_eq!(defaults.token_url.as_str(), DEFAULT_TOKEN_URL);
        assert_eq!(defaults.scopes.len(), DEFAULT_SCOPES.len());
        assert_eq!(defaults.refresh_window, REFRESH_WINDOW);

        let custom = AuthSettings::from_lookup(
            &creds,
            lookup(&[
                (TOKEN_URL_VAR, "http://127.0.0.1:1234/api/token"),
                (SCOPE_VAR, "user-read-private  playlist-read-private"),
            ]),
        )
        .unwrap();
        assert_eq!(custom.token_url.as_str(), "http://127.0.0.1:1234/api/token");
        assert_eq!(custom.scopes, vec!["user-read-private", "playlist-read-private"]);

        assert!(AuthSettings::from_lookup(&creds, lookup(&[(AUTH_URL_VAR, "::nope")])).is_err());
    }
}
