use std::{fmt, sync::Arc, time::Duration};

use reqwest::Url;
use tokio::sync::{Mutex, OnceCell};
use tracing::{info, warn};

use crate::{
    config::AuthSettings,
    error::AuthError,
    management::TokenStore,
    server::start_callback_server,
    spotify::auth::{TokenExchanger, authorization_url, build_client},
    types::{ClientCredentials, TokenRecord, TokenStatus},
    utils,
};

/// Pause before the single retry of a transiently failed refresh.
pub const REFRESH_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Sends the user to the authorization URL.
pub trait BrowserLauncher: Send + Sync {
    fn launch(&self, url: &Url);
}

impl<F> BrowserLauncher for F
where
    F: Fn(&Url) + Send + Sync,
{
    fn launch(&self, url: &Url) {
        self(url)
    }
}

/// Opens the system browser, printing the URL to stderr when that fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn launch(&self, url: &Url) {
        if let Err(e) = webbrowser::open(url.as_str()) {
            warn!(error = %e, "could not open a browser");
            eprintln!("Open this URL in your browser to authorize Spotify access:\n{url}");
        }
    }
}

#[derive(Default)]
struct TokenCache {
    loaded: bool,
    record: Option<TokenRecord>,
}

/// Hands out usable access tokens, logging in or refreshing as needed.
///
/// This is the only entry point tool code uses. It owns the in-memory record,
/// the HTTP client (created on first use) and the authorization session.
/// Calls are single-flight: concurrent callers queue on one lock, so at most
/// one login or refresh runs and later callers reuse its result.
pub struct TokenManager {
    credentials: ClientCredentials,
    settings: AuthSettings,
    store: TokenStore,
    launcher: Arc<dyn BrowserLauncher>,
    exchanger: OnceCell<TokenExchanger>,
    cache: Mutex<TokenCache>,
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("credentials", &self.credentials)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    pub fn new(credentials: ClientCredentials, settings: AuthSettings, store: TokenStore) -> Self {
        Self {
            credentials,
            settings,
            store,
            launcher: Arc::new(SystemBrowser),
            exchanger: OnceCell::new(),
            cache: Mutex::new(TokenCache::default()),
        }
    }

    /// Builds a manager from the environment and the default token location.
    pub fn from_env() -> Result<Self, AuthError> {
        let credentials = ClientCredentials::from_env()?;
        let settings = AuthSettings::from_env(&credentials)?;
        Ok(Self::new(credentials, settings, TokenStore::default_location()))
    }

    pub fn with_launcher(mut self, launcher: impl BrowserLauncher + 'static) -> Self {
        self.launcher = Arc::new(launcher);
        self
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Returns an access token that is valid for at least the refresh window.
    pub async fn usable_credential(&self) -> Result<String, AuthError> {
        let mut cache = self.cache.lock().await;
        if !cache.loaded {
            cache.record = self.store.load().await?;
            cache.loaded = true;
        }

        if let Some(record) = cache.record.clone() {
            if !record.needs_refresh(utils::now_millis(), self.settings.refresh_window) {
                return Ok(record.access_token);
            }

            info!("access token expires soon, refreshing");
            match self.refresh_with_retry(&record.refresh_token).await {
                Ok(refreshed) => {
                    self.store.save(&refreshed).await?;
                    let token = refreshed.access_token.clone();
                    cache.record = Some(refreshed);
                    return Ok(token);
                }
                Err(e) => {
                    warn!(error = %e, "refresh failed, starting a new login");
                    cache.record = None;
                }
            }
        }

        let record = self.authorize().await?;
        self.store.save(&record).await?;
        let token = record.access_token.clone();
        cache.record = Some(record);
        Ok(token)
    }

    /// Forgets the login in memory and on disk.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let mut cache = self.cache.lock().await;
        self.store.clear().await?;
        cache.record = None;
        cache.loaded = true;
        info!("stored login removed");
        Ok(())
    }

    /// Redacted view of the current login, `None` when nobody is logged in.
    pub async fn status(&self) -> Result<Option<TokenStatus>, AuthError> {
        let mut cache = self.cache.lock().await;
        if !cache.loaded {
            cache.record = self.store.load().await?;
            cache.loaded = true;
        }

        Ok(cache.record.as_ref().map(|r| TokenStatus {
            expires_at: r.expires_at_utc(),
            refresh_due: r.needs_refresh(utils::now_millis(), self.settings.refresh_window),
            has_refresh_token: !r.refresh_token.is_empty(),
        }))
    }

    /// Runs one interactive authorization: listener, browser, code exchange.
    async fn authorize(&self) -> Result<TokenRecord, AuthError> {
        let exchanger = self.exchanger().await?;
        let state = utils::generate_state();
        let handle = start_callback_server(&self.settings.listener, &state).await?;

        let url = authorization_url(
            &self.settings.authorize_url,
            &self.credentials,
            &self.settings.scopes,
            &state,
        );
        info!("waiting for Spotify authorization in the browser");
        self.launcher.launch(&url);

        let code = handle.wait().await?;
        let record = exchanger.exchange_code(&code).await?;
        info!("authorization completed");
        Ok(record)
    }

    /// Refreshes once, retrying a single time after a transient failure.
    async fn refresh_with_retry(&self, refresh_token: &str) -> Result<TokenRecord, AuthError> {
        let exchanger = self.exchanger().await?;
        match exchanger.refresh(refresh_token).await {
            Err(AuthError::Exchange(failure)) if failure.is_transient() => {
                warn!(error = %failure, "transient refresh failure, retrying once");
                tokio::time::sleep(REFRESH_RETRY_DELAY).await;
                exchanger.refresh(refresh_token).await
            }
            other => other,
        }
    }

    async fn exchanger(&self) -> Result<&TokenExchanger, AuthError> {
        self.exchanger
            .get_or_try_init(|| async {
                Ok::<_, AuthError>(TokenExchanger::new(
                    build_client()?,
                    self.credentials.clone(),
                    self.settings.token_url.clone(),
                ))
            })
            .await
    }
}
