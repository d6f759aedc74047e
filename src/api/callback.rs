use std::{
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
    sync::Arc,
    time::Instant,
};

use axum::{
    Extension,
    extract::ConnectInfo,
    http::{Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use reqwest::Url;
use tokio::sync::{Mutex, Notify, oneshot};
use tracing::{debug, info, warn};

use crate::{error::ProtocolViolation, html, utils};

/// What the listener eventually hands back: the authorization code, or the
/// violation that ended the session.
pub type CallbackResult = Result<String, ProtocolViolation>;

pub type SharedSession = Arc<Mutex<AuthorizationSession>>;

/// State of one interactive login attempt.
///
/// The one-shot `resolver` is consumed by the first resolution, which makes a
/// second resolution impossible; once it is gone every request is answered
/// with 410 while the server winds down.
#[derive(Debug)]
pub struct AuthorizationSession {
    expected_state: String,
    callback_path: String,
    max_requests: u32,
    request_count: u32,
    created_at: Instant,
    resolver: Option<oneshot::Sender<CallbackResult>>,
    shutdown: Arc<Notify>,
}

/// Status and HTML body for one callback request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackReply {
    pub status: StatusCode,
    pub body: String,
}

impl CallbackReply {
    fn new(status: StatusCode, body: String) -> Self {
        Self { status, body }
    }
}

impl IntoResponse for CallbackReply {
    fn into_response(self) -> Response {
        (
            self.status,
            [
                (header::CONTENT_TYPE, "text/html; charset=utf-8"),
                (header::CACHE_CONTROL, "no-store"),
                (header::CONNECTION, "close"),
            ],
            self.body,
        )
            .into_response()
    }
}

#[derive(Debug, Default)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

impl CallbackParams {
    fn parse(query: Option<&str>) -> Self {
        let mut params = CallbackParams::default();
        let Some(query) = query else {
            return params;
        };
        let Ok(url) = Url::parse(&format!("http://127.0.0.1/?{query}")) else {
            return params;
        };

        for (key, value) in url.query_pairs() {
            let slot = match key.as_ref() {
                "code" => &mut params.code,
                "state" => &mut params.state,
                "error" => &mut params.error,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        params
    }
}

impl AuthorizationSession {
    pub fn new(
        expected_state: &str,
        callback_path: &str,
        max_requests: u32,
        resolver: oneshot::Sender<CallbackResult>,
        shutdown: Arc<Notify>,
    ) -> Self {
        Self {
            expected_state: expected_state.to_string(),
            callback_path: callback_path.to_string(),
            max_requests,
            request_count: 0,
            created_at: Instant::now(),
            resolver: Some(resolver),
            shutdown,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolver.is_none()
    }

    pub fn request_count(&self) -> u32 {
        self.request_count
    }

    /// Ends the session without a result (timeout or caller gave up).
    pub fn close(&mut self) {
        if self.resolver.take().is_some() {
            self.shutdown.notify_one();
        }
    }

    /// Runs one request through the session state machine.
    pub fn handle(
        &mut self,
        peer: IpAddr,
        method: &Method,
        path: &str,
        query: Option<&str>,
    ) -> CallbackReply {
        if self.is_resolved() {
            return CallbackReply::new(StatusCode::GONE, html::gone());
        }

        self.request_count += 1;
        if self.request_count > self.max_requests {
            warn!(
                count = self.request_count,
                max = self.max_requests,
                "callback request quota exceeded"
            );
            return CallbackReply::new(StatusCode::TOO_MANY_REQUESTS, html::too_many_requests());
        }

        if !is_loopback_peer(peer) {
            warn!(%peer, "rejected callback request from non-loopback peer");
            return CallbackReply::new(StatusCode::FORBIDDEN, html::forbidden());
        }

        if path != self.callback_path {
            debug!(path, "callback listener: unknown path");
            return CallbackReply::new(StatusCode::NOT_FOUND, html::not_found());
        }

        if *method != Method::GET {
            return CallbackReply::new(StatusCode::METHOD_NOT_ALLOWED, html::not_found());
        }

        let params = CallbackParams::parse(query);

        if let Some(error) = params.error {
            warn!(error = %error, "authorization server returned an error");
            let body = html::denied(&error);
            self.resolve(Err(ProtocolViolation::Denied(error)));
            return CallbackReply::new(StatusCode::BAD_REQUEST, body);
        }

        let state_ok = params
            .state
            .as_deref()
            .is_some_and(|s| utils::states_match(s, &self.expected_state));
        if !state_ok {
            warn!("callback state missing or mismatched, possible CSRF");
            self.resolve(Err(ProtocolViolation::StateMismatch));
            return CallbackReply::new(
                StatusCode::BAD_REQUEST,
                html::failed("The login response could not be verified."),
            );
        }

        match params.code.filter(|c| !c.is_empty()) {
            Some(code) => {
                self.resolve(Ok(code));
                CallbackReply::new(StatusCode::OK, html::success())
            }
            None => {
                warn!("callback carried no authorization code");
                self.resolve(Err(ProtocolViolation::MissingCode));
                CallbackReply::new(
                    StatusCode::BAD_REQUEST,
                    html::failed("No authorization code was received."),
                )
            }
        }
    }

    fn resolve(&mut self, result: CallbackResult) {
        let Some(resolver) = self.resolver.take() else {
            return;
        };
        info!(
            ok = result.is_ok(),
            elapsed_ms = self.created_at.elapsed().as_millis() as u64,
            "authorization session resolved"
        );
        // The receiver may already be gone if the caller stopped waiting.
        let _ = resolver.send(result);
        self.shutdown.notify_one();
    }
}

/// Accepts exactly the loopback forms `127.0.0.1`, `::1` and
/// `::ffff:127.0.0.1`.
pub fn is_loopback_peer(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4 == Ipv4Addr::LOCALHOST,
        IpAddr::V6(v6) => {
            v6 == Ipv6Addr::LOCALHOST || v6.to_ipv4_mapped() == Some(Ipv4Addr::LOCALHOST)
        }
    }
}

/// Axum entry point for every path on the callback listener.
pub async fn callback(
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Extension(session): Extension<SharedSession>,
    method: Method,
    uri: Uri,
) -> CallbackReply {
    session
        .lock()
        .await
        .handle(peer.ip(), &method, uri.path(), uri.query())
}
