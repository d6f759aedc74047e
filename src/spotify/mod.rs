//! # Spotify Accounts Integration
//!
//! Calls against the Spotify Accounts service, the OAuth 2.0 authorization
//! server in front of the Web API.
//!
//! [`auth`] builds the browser-facing authorization URL and performs the two
//! token-bearing requests against the token endpoint:
//!
//! ```text
//! authorization_code grant   code          -> access + refresh token
//! refresh_token grant        refresh token -> access (+ rotated refresh) token
//! ```
//!
//! The application is a confidential client: both grants authenticate with
//! the client id and secret over HTTP Basic, so no PKCE verifier is involved.
//! Token endpoint bodies are validated at the boundary and turned into a
//! [`crate::types::TokenRecord`]; anything unusable becomes an
//! [`crate::error::ExchangeFailure`].

pub mod auth;
