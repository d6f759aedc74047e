//! Error taxonomy for the token lifecycle.
//!
//! Every failure the manager can raise is an [`AuthError`]. Callers that only
//! need to tell the user what went wrong use [`AuthError::kind`] and
//! [`AuthError::user_message`]; the `Display` output carries the diagnostic
//! detail and is meant for logs, where it passes through the redactor.

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use thiserror::Error;

/// Failures raised while acquiring or serving an access token.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Client credentials or endpoints are missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The token file could not be read or written.
    #[error("token storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The callback port is already in use.
    #[error("cannot bind callback listener on {addr}: {source}")]
    ListenerBind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The authorization server rejected a token exchange or answered with
    /// something unusable.
    #[error("token exchange failed: {0}")]
    Exchange(#[from] ExchangeFailure),

    /// The browser redirect ended the session without a usable code.
    #[error("authorization callback rejected: {0}")]
    Protocol(#[from] ProtocolViolation),

    /// No callback arrived before the listener gave up.
    #[error("no authorization response within {} seconds", .0.as_secs())]
    Timeout(Duration),

    /// The listener stopped without producing a result.
    #[error("callback listener stopped before the authorization completed")]
    CallbackAborted,
}

/// Why a token endpoint call failed.
#[derive(Debug, Error)]
pub enum ExchangeFailure {
    /// Network error, connect failure or request timeout.
    #[error("token endpoint unreachable: {0}")]
    Transport(#[source] reqwest::Error),

    /// Non-success HTTP status. `error_code` is the OAuth `error` field when
    /// the body carried one.
    #[error("token endpoint answered with status {status}")]
    Rejected {
        status: u16,
        error_code: Option<String>,
    },

    /// Success status but the body lacked a usable token or lifetime.
    #[error("malformed token response: {0}")]
    Malformed(String),
}

impl ExchangeFailure {
    /// Whether a retry could plausibly succeed. Revoked or invalid grants are
    /// answered with 4xx and are not worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            ExchangeFailure::Transport(_) => true,
            ExchangeFailure::Rejected { status, .. } => *status >= 500,
            ExchangeFailure::Malformed(_) => false,
        }
    }
}

/// Callback requests that end the authorization session as a failure.
///
/// Per-request rejections (foreign origin, unknown path, quota) are answered
/// by the listener and never reach this type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    #[error("state parameter missing or mismatched")]
    StateMismatch,

    #[error("authorization code missing from callback")]
    MissingCode,

    #[error("authorization server returned error `{0}`")]
    Denied(String),
}

/// Closed set of failure categories surfaced to tool callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    Configuration,
    Storage,
    ListenerBind,
    Exchange,
    Protocol,
    Timeout,
}

impl AuthError {
    pub fn kind(&self) -> AuthErrorKind {
        match self {
            AuthError::Configuration(_) => AuthErrorKind::Configuration,
            AuthError::Storage { .. } => AuthErrorKind::Storage,
            AuthError::ListenerBind { .. } => AuthErrorKind::ListenerBind,
            AuthError::Exchange(_) => AuthErrorKind::Exchange,
            AuthError::Protocol(_) | AuthError::CallbackAborted => AuthErrorKind::Protocol,
            AuthError::Timeout(_) => AuthErrorKind::Timeout,
        }
    }

    /// Generic message safe to show an end user. Never includes server
    /// response bodies, token values or paths.
    pub fn user_message(&self) -> &'static str {
        match self.kind() {
            AuthErrorKind::Configuration => {
                "Spotify client credentials are missing or invalid. Check SPOTIFY_CLIENT_ID, SPOTIFY_CLIENT_SECRET and SPOTIFY_REDIRECT_URI."
            }
            AuthErrorKind::Storage => "Could not read or write the stored Spotify login.",
            AuthErrorKind::ListenerBind => {
                "The local login callback port is already in use. Free it and try again."
            }
            AuthErrorKind::Exchange => "Spotify rejected the login. Please authorize again.",
            AuthErrorKind::Protocol => "The Spotify login did not complete. Please try again.",
            AuthErrorKind::Timeout => "No response from the Spotify login within 5 minutes.",
        }
    }

    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AuthError::Storage {
            path: path.into(),
            source,
        }
    }
}
