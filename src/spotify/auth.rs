use std::time::Duration;

use reqwest::{Client, Url};
use tracing::{debug, warn};

use crate::{
    error::{AuthError, ExchangeFailure},
    redact,
    types::{ClientCredentials, OAuthErrorBody, TokenRecord, TokenResponse},
    utils,
};

/// Per-request timeout for token endpoint calls.
pub const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(15);

/// Builds the browser-navigable authorization URL.
///
/// Pure function of the endpoint, the client identity, the requested scopes
/// and the per-attempt `state`.
pub fn authorization_url(
    authorize_url: &Url,
    credentials: &ClientCredentials,
    scopes: &[String],
    state: &str,
) -> Url {
    let mut url = authorize_url.clone();
    url.query_pairs_mut()
        .append_pair("client_id", &credentials.client_id)
        .append_pair("response_type", "code")
        .append_pair("redirect_uri", &credentials.redirect_uri)
        .append_pair("scope", &scopes.join(" "))
        .append_pair("state", state);
    url
}

/// Builds the HTTP client used for token exchanges.
pub fn build_client() -> Result<Client, AuthError> {
    Client::builder()
        .timeout(EXCHANGE_TIMEOUT)
        .build()
        .map_err(|e| AuthError::Configuration(format!("cannot build HTTP client: {e}")))
}

/// Performs the two token-bearing calls against the token endpoint.
///
/// The client authenticates with HTTP Basic credentials, as a confidential
/// client.
#[derive(Debug, Clone)]
pub struct TokenExchanger {
    client: Client,
    credentials: ClientCredentials,
    token_url: Url,
}

impl TokenExchanger {
    pub fn new(client: Client, credentials: ClientCredentials, token_url: Url) -> Self {
        Self {
            client,
            credentials,
            token_url,
        }
    }

    /// Trades a freshly received authorization code for a token record.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenRecord, AuthError> {
        let response = self
            .post(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.credentials.redirect_uri.as_str()),
            ])
            .await?;

        let refresh_token = response.refresh_token.filter(|t| !t.is_empty()).ok_or_else(|| {
            ExchangeFailure::Malformed("authorization grant returned no refresh_token".into())
        })?;

        Ok(TokenRecord::issued_at(
            utils::now_millis(),
            response.access_token,
            refresh_token,
            response.expires_in,
        ))
    }

    /// Obtains a new access token with `refresh_token`. When the server does
    /// not rotate the refresh token, the one passed in is kept.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenRecord, AuthError> {
        let response = self
            .post(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await?;

        let refresh_token = response
            .refresh_token
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| refresh_token.to_string());

        Ok(TokenRecord::issued_at(
            utils::now_millis(),
            response.access_token,
            refresh_token,
            response.expires_in,
        ))
    }

    async fn post(&self, form: &[(&str, &str)]) -> Result<TokenResponse, ExchangeFailure> {
        let grant = form
            .iter()
            .find(|(k, _)| *k == "grant_type")
            .map(|(_, v)| *v)
            .unwrap_or_default();

        let res = self
            .client
            .post(self.token_url.clone())
            .basic_auth(&self.credentials.client_id, Some(&self.credentials.client_secret))
            .form(form)
            .send()
            .await
            .map_err(|e| {
                warn!(grant, error = %e, "token endpoint request failed");
                ExchangeFailure::Transport(e)
            })?;

        let status = res.status();
        let body = res.text().await.map_err(ExchangeFailure::Transport)?;

        if !status.is_success() {
            let error_code = serde_json::from_str::<OAuthErrorBody>(&body)
                .ok()
                .map(|b| b.error);
            warn!(
                grant,
                status = status.as_u16(),
                error_code = error_code.as_deref().unwrap_or("-"),
                "token endpoint rejected the request"
            );
            debug!(grant, body = %redact::redact(&body), "rejected token response body");
            return Err(ExchangeFailure::Rejected {
                status: status.as_u16(),
                error_code,
            });
        }

        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            let reason = redact::redact(&e.to_string());
            warn!(grant, %reason, "token endpoint returned an unusable body");
            ExchangeFailure::Malformed(reason)
        })?;

        if parsed.access_token.is_empty() {
            return Err(ExchangeFailure::Malformed("empty access_token".into()));
        }

        debug!(grant, expires_in = parsed.expires_in, "token endpoint answered");
        Ok(parsed)
    }
}
