use std::{net::TcpListener, time::Duration};

use reqwest::{Client, StatusCode};
use spotify_auth::{
    AuthError, AuthErrorKind,
    error::ProtocolViolation,
    server::{ListenerConfig, start_callback_server},
};

const STATE: &str = "state-for-tests";

fn config(timeout: Duration) -> ListenerConfig {
    ListenerConfig {
        port: 0,
        timeout,
        ..ListenerConfig::default()
    }
}

fn client() -> Client {
    Client::builder().no_proxy().build().unwrap()
}

#[tokio::test]
async fn test_valid_callback_yields_code() {
    let handle = start_callback_server(&config(Duration::from_secs(10)), STATE)
        .await
        .unwrap();
    let url = format!("http://{}/callback", handle.local_addr());
    let waiter = tokio::spawn(handle.wait());

    let res = client()
        .get(&url)
        .query(&[("code", "ABC"), ("state", STATE)])
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["cache-control"], "no-store");
    assert!(
        res.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/html")
    );
    assert!(res.text().await.unwrap().contains("Authentication successful"));

    assert_eq!(waiter.await.unwrap().unwrap(), "ABC");
}

#[tokio::test]
async fn test_state_mismatch_ends_session() {
    let handle = start_callback_server(&config(Duration::from_secs(10)), STATE)
        .await
        .unwrap();
    let url = format!("http://{}/callback", handle.local_addr());
    let waiter = tokio::spawn(handle.wait());

    let res = client()
        .get(&url)
        .query(&[("code", "ABC"), ("state", "forged")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let err = waiter.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        AuthError::Protocol(ProtocolViolation::StateMismatch)
    ));
}

#[tokio::test]
async fn test_error_parameter_is_escaped() {
    let handle = start_callback_server(&config(Duration::from_secs(10)), STATE)
        .await
        .unwrap();
    let url = format!("http://{}/callback", handle.local_addr());
    let waiter = tokio::spawn(handle.wait());

    let res = client()
        .get(&url)
        .query(&[("error", "<script>alert(1)</script>"), ("state", STATE)])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body = res.text().await.unwrap();
    assert!(!body.contains("<script>"));
    assert!(body.contains("&lt;script&gt;"));

    let err = waiter.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        AuthError::Protocol(ProtocolViolation::Denied(ref e)) if e == "<script>alert(1)</script>"
    ));
}

#[tokio::test]
async fn test_request_quota_is_enforced() {
    let handle = start_callback_server(&config(Duration::from_secs(10)), STATE)
        .await
        .unwrap();
    let base = format!("http://{}", handle.local_addr());
    let client = client();

    for _ in 0..5 {
        let res = client.get(format!("{base}/favicon.ico")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    // Even a valid callback is refused once the quota is spent
    let res = client
        .get(format!("{base}/callback"))
        .query(&[("code", "ABC"), ("state", STATE)])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(!handle.is_resolved().await);
}

#[tokio::test]
async fn test_non_get_is_rejected_without_resolving() {
    let handle = start_callback_server(&config(Duration::from_secs(10)), STATE)
        .await
        .unwrap();
    let url = format!("http://{}/callback", handle.local_addr());

    let res = client()
        .post(&url)
        .query(&[("code", "ABC"), ("state", STATE)])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(!handle.is_resolved().await);
}

#[tokio::test]
async fn test_timeout_releases_port() {
    let handle = start_callback_server(&config(Duration::from_millis(200)), STATE)
        .await
        .unwrap();
    let addr = handle.local_addr();

    let err = handle.wait().await.unwrap_err();
    assert_eq!(err.kind(), AuthErrorKind::Timeout);

    // The same port can be bound again right away
    let again = ListenerConfig {
        port: addr.port(),
        ..config(Duration::from_millis(200))
    };
    let handle = start_callback_server(&again, STATE).await.unwrap();
    assert_eq!(handle.local_addr(), addr);
}

#[tokio::test]
async fn test_timeout_counts_from_bind() {
    let handle = start_callback_server(&config(Duration::from_millis(300)), STATE)
        .await
        .unwrap();

    // Time spent before waiting (opening the browser) is part of the budget
    tokio::time::sleep(Duration::from_millis(400)).await;

    let started = std::time::Instant::now();
    let err = handle.wait().await.unwrap_err();
    assert_eq!(err.kind(), AuthErrorKind::Timeout);
    assert!(started.elapsed() < Duration::from_millis(250));
}

#[tokio::test]
async fn test_port_in_use_is_a_bind_error() {
    let taken = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();

    let busy = ListenerConfig {
        port,
        ..config(Duration::from_secs(1))
    };
    let err = start_callback_server(&busy, STATE).await.unwrap_err();
    assert_eq!(err.kind(), AuthErrorKind::ListenerBind);
}
