use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use axum::{Extension, Router};
use tokio::{
    net::TcpListener,
    sync::{Mutex, Notify, oneshot},
    task::JoinHandle,
    time::Instant,
};
use tracing::{debug, info, warn};

use crate::{
    api::{self, AuthorizationSession, CallbackResult, SharedSession},
    error::AuthError,
};

pub const DEFAULT_CALLBACK_PORT: u16 = 8888;
pub const DEFAULT_CALLBACK_PATH: &str = "/callback";
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_MAX_REQUESTS: u32 = 5;

/// How long in-flight responses may take to drain before the server task is
/// aborted.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Where and how long the callback listener runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerConfig {
    /// Must be a loopback address.
    pub ip: IpAddr,
    /// `0` picks an ephemeral port.
    pub port: u16,
    pub path: String,
    pub timeout: Duration,
    pub max_requests: u32,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_CALLBACK_PORT,
            path: DEFAULT_CALLBACK_PATH.to_string(),
            timeout: DEFAULT_CALLBACK_TIMEOUT,
            max_requests: DEFAULT_MAX_REQUESTS,
        }
    }
}

/// Starts the callback listener for one authorization attempt.
///
/// Fails with [`AuthError::ListenerBind`] when the port is taken; the caller
/// should not retry.
pub async fn start_callback_server(
    config: &ListenerConfig,
    expected_state: &str,
) -> Result<CallbackHandle, AuthError> {
    if !config.ip.is_loopback() {
        return Err(AuthError::Configuration(format!(
            "callback listener must bind a loopback address, got {}",
            config.ip
        )));
    }

    let addr = SocketAddr::new(config.ip, config.port);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| AuthError::ListenerBind { addr, source })?;
    let local_addr = listener
        .local_addr()
        .map_err(|source| AuthError::ListenerBind { addr, source })?;
    let deadline = Instant::now() + config.timeout;

    let (result_tx, result_rx) = oneshot::channel();
    let shutdown = Arc::new(Notify::new());
    let session: SharedSession = Arc::new(Mutex::new(AuthorizationSession::new(
        expected_state,
        &config.path,
        config.max_requests,
        result_tx,
        Arc::clone(&shutdown),
    )));

    let app = Router::new()
        .fallback(api::callback)
        .layer(Extension(Arc::clone(&session)));

    let signal = Arc::clone(&shutdown);
    let server = tokio::spawn(async move {
        let serve = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { signal.notified().await });

        if let Err(e) = serve.await {
            warn!(error = %e, "callback listener stopped with an error");
        }
    });

    info!(addr = %local_addr, path = %config.path, "callback listener started");

    Ok(CallbackHandle {
        local_addr,
        timeout: config.timeout,
        deadline,
        result_rx,
        session,
        shutdown,
        server,
    })
}

/// A running callback listener.
///
/// [`CallbackHandle::wait`] yields the single resolution and only returns
/// once the port has been released. Dropping the handle without waiting
/// aborts the listener.
#[derive(Debug)]
pub struct CallbackHandle {
    local_addr: SocketAddr,
    timeout: Duration,
    deadline: Instant,
    result_rx: oneshot::Receiver<CallbackResult>,
    session: SharedSession,
    shutdown: Arc<Notify>,
    server: JoinHandle<()>,
}

impl CallbackHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn is_resolved(&self) -> bool {
        self.session.lock().await.is_resolved()
    }

    /// Waits for the authorization code, an ending violation, or the timeout.
    /// The timeout counts from the moment the port was bound, not from this
    /// call.
    pub async fn wait(mut self) -> Result<String, AuthError> {
        let outcome = match tokio::time::timeout_at(self.deadline, &mut self.result_rx).await {
            Ok(Ok(Ok(code))) => Ok(code),
            Ok(Ok(Err(violation))) => Err(AuthError::Protocol(violation)),
            Ok(Err(_)) => Err(AuthError::CallbackAborted),
            Err(_) => {
                warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "no authorization callback before timeout"
                );
                Err(AuthError::Timeout(self.timeout))
            }
        };

        self.session.lock().await.close();
        self.stop().await;
        outcome
    }

    async fn stop(&mut self) {
        self.shutdown.notify_one();
        if tokio::time::timeout(DRAIN_TIMEOUT, &mut self.server)
            .await
            .is_err()
        {
            debug!("callback listener did not drain in time, aborting");
            self.server.abort();
            let _ = (&mut self.server).await;
        }
        debug!(addr = %self.local_addr, "callback listener stopped");
    }
}

impl Drop for CallbackHandle {
    fn drop(&mut self) {
        self.shutdown.notify_one();
        self.server.abort();
    }
}
