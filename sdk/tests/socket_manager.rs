//! Socket manager behaviour against a loopback gateway.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use refundly_sdk::cache::{CacheKey, InvalidationRouter, QueryCache};
use refundly_sdk::ws::{ConnectionState, ServerMessage, Signal, SocketManager, WsConfig, WsError};
use refundly_sdk::{DomainEvent, Identity, RefundStatus, Role};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;

const VALID_TOKEN: &str = "good-token";

#[derive(Debug, Clone)]
enum Command {
    Push(DomainEvent),
    Kick,
}

struct FakeGateway {
    url: String,
    accepted: Arc<AtomicUsize>,
    admitting: Arc<AtomicBool>,
    commands: broadcast::Sender<Command>,
}

impl FakeGateway {
    async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let accepted = Arc::new(AtomicUsize::new(0));
        let admitting = Arc::new(AtomicBool::new(true));
        let (commands, _) = broadcast::channel(16);

        let accepted_counter = Arc::clone(&accepted);
        let admit = Arc::clone(&admitting);
        let command_tx = commands.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                if !admit.load(Ordering::SeqCst) {
                    drop(stream);
                    continue;
                }
                let accepted = Arc::clone(&accepted_counter);
                let mut commands = command_tx.subscribe();

                tokio::spawn(async move {
                    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                        let expected = format!("Bearer {}", VALID_TOKEN);
                        let presented = request
                            .headers()
                            .get("authorization")
                            .and_then(|value| value.to_str().ok());
                        if presented == Some(expected.as_str()) {
                            Ok(response)
                        } else {
                            let mut rejection = ErrorResponse::new(Some("unauthorized".to_string()));
                            *rejection.status_mut() = StatusCode::UNAUTHORIZED;
                            Err(rejection)
                        }
                    };

                    let Ok(mut ws) = accept_hdr_async(stream, callback).await else {
                        return;
                    };
                    accepted.fetch_add(1, Ordering::SeqCst);

                    let ack = ServerMessage::connected(&Identity::new("u-1", Role::Student));
                    let ack = serde_json::to_string(&ack).expect("serialize ack");
                    if ws.send(Message::Text(ack.into())).await.is_err() {
                        return;
                    }

                    loop {
                        tokio::select! {
                            command = commands.recv() => match command {
                                Ok(Command::Push(event)) => {
                                    let frame = serde_json::to_string(&ServerMessage::event(event))
                                        .expect("serialize event");
                                    if ws.send(Message::Text(frame.into())).await.is_err() {
                                        return;
                                    }
                                }
                                Ok(Command::Kick) | Err(_) => {
                                    let _ = ws.send(Message::Close(None)).await;
                                    return;
                                }
                            },
                            frame = ws.next() => match frame {
                                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                                Some(Ok(_)) => {}
                            },
                        }
                    }
                });
            }
        });

        Self {
            url: format!("ws://{}/ws", addr),
            accepted,
            admitting,
            commands,
        }
    }

    /// Drops new TCP connections before the upgrade.
    fn refuse(&self) {
        self.admitting.store(false, Ordering::SeqCst);
    }

    fn admit(&self) {
        self.admitting.store(true, Ordering::SeqCst);
    }

    fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    fn push(&self, event: DomainEvent) {
        let _ = self.commands.send(Command::Push(event));
    }

    fn kick(&self) {
        let _ = self.commands.send(Command::Kick);
    }

    fn config(&self) -> WsConfig {
        WsConfig::new(self.url.clone())
            .with_reconnect_delay(Duration::from_millis(50))
            .with_max_reconnect_delay(Duration::from_millis(100))
            .with_max_reconnect_attempts(3)
            .with_handshake_timeout(Duration::from_secs(2))
    }
}

/// Accepts TCP connections and never answers the upgrade.
async fn silent_gateway() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    format!("ws://{}/ws", addr)
}

async fn wait_for_state(manager: &SocketManager, wanted: ConnectionState) {
    let mut states = manager.watch_state();
    timeout(Duration::from_secs(5), async {
        while *states.borrow_and_update() != wanted {
            if states.changed().await.is_err() {
                break;
            }
        }
    })
    .await
    .expect("state reached before timeout");
}

#[tokio::test]
async fn test_connect_twice_opens_one_socket() {
    let gateway = FakeGateway::spawn().await;
    let manager = SocketManager::new(gateway.config()).expect("manager");

    manager.connect(VALID_TOKEN).await.expect("first connect");
    manager.connect(VALID_TOKEN).await.expect("second connect");

    assert!(manager.is_connected());
    assert_eq!(gateway.accepted(), 1);

    manager.disconnect().await;
}

#[tokio::test]
async fn test_invalid_token_never_connects() {
    let gateway = FakeGateway::spawn().await;
    let manager = SocketManager::new(gateway.config()).expect("manager");
    let mut states = manager.watch_state();

    let result = manager.connect("stolen-token").await;

    assert_eq!(result, Err(WsError::Unauthorized));
    assert_eq!(manager.state(), ConnectionState::Reauthenticating);
    assert_eq!(gateway.accepted(), 0);

    // No Connected state was ever published.
    let mut seen_connected = false;
    while states.has_changed().unwrap_or(false) {
        seen_connected |= states.borrow_and_update().is_connected();
    }
    assert!(!seen_connected);
}

#[tokio::test]
async fn test_pushed_event_invalidates_cache() {
    let gateway = FakeGateway::spawn().await;
    let manager = SocketManager::new(gateway.config()).expect("manager");

    let (cache, mut refetch) = QueryCache::new();
    cache.store(CacheKey::refund("R123"), serde_json::json!({"status": "APPROVED"}));
    cache.store(CacheKey::Refunds, serde_json::json!([]));
    let _detail = cache.observe(CacheKey::refund("R123"));

    let router = InvalidationRouter::new(Arc::new(cache));
    let listener = router.attach(&manager);

    manager.connect(VALID_TOKEN).await.expect("connect");
    gateway.push(DomainEvent::refund_updated("R123", "u-1", RefundStatus::Paid));

    let key = timeout(Duration::from_secs(5), refetch.recv())
        .await
        .expect("refetch before timeout");
    assert_eq!(key, Some(CacheKey::refund("R123")));
    assert!(router.target().is_stale(&CacheKey::Refunds));

    listener.detach().await;
    manager.disconnect().await;
    assert_eq!(manager.listener_count(), 0);
}

#[tokio::test]
async fn test_no_delivery_after_disconnect() {
    let gateway = FakeGateway::spawn().await;
    let manager = SocketManager::new(gateway.config()).expect("manager");
    let mut subscription = manager.subscribe();

    manager.connect(VALID_TOKEN).await.expect("connect");
    gateway.push(DomainEvent::notification_new("n-1", "u-1"));
    tokio::time::sleep(Duration::from_millis(100)).await;

    manager.disconnect().await;
    assert_eq!(manager.state(), ConnectionState::Disconnected);

    let received = timeout(Duration::from_millis(300), subscription.recv()).await;
    assert!(received.is_err(), "unexpected signal: {:?}", received);
}

#[tokio::test]
async fn test_reconnect_after_drop_requests_resync() {
    let gateway = FakeGateway::spawn().await;
    let manager = SocketManager::new(gateway.config()).expect("manager");
    let mut subscription = manager.subscribe();

    manager.connect(VALID_TOKEN).await.expect("connect");
    gateway.kick();

    let signal = timeout(Duration::from_secs(5), subscription.recv())
        .await
        .expect("signal before timeout");
    assert_eq!(signal, Some(Signal::Resync));

    wait_for_state(&manager, ConnectionState::Connected).await;
    assert_eq!(gateway.accepted(), 2);

    manager.disconnect().await;
}

#[tokio::test]
async fn test_reconnection_attempts_are_bounded() {
    let unused = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = unused.local_addr().expect("local addr");
    drop(unused);

    let config = WsConfig::new(format!("ws://{}/ws", addr))
        .with_reconnect_delay(Duration::from_millis(10))
        .with_max_reconnect_delay(Duration::from_millis(20))
        .with_max_reconnect_attempts(2);
    let manager = SocketManager::new(config).expect("manager");

    let result = manager.connect(VALID_TOKEN).await;
    assert!(matches!(result, Err(ref err) if err.is_retryable()));

    let mut states = manager.watch_state();
    let mut highest_attempt = 0;
    timeout(Duration::from_secs(5), async {
        loop {
            let state = *states.borrow_and_update();
            if let ConnectionState::Connecting { attempt } = state {
                highest_attempt = highest_attempt.max(attempt);
            }
            if state == ConnectionState::Disconnected || states.changed().await.is_err() {
                break;
            }
        }
    })
    .await
    .expect("retries exhausted before timeout");

    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert!(highest_attempt <= 2);
}

#[tokio::test]
async fn test_stalled_handshake_times_out() {
    let config = WsConfig::new(silent_gateway().await)
        .with_handshake_timeout(Duration::from_millis(200))
        .with_reconnect_delay(Duration::from_millis(10))
        .with_max_reconnect_delay(Duration::from_millis(20))
        .with_max_reconnect_attempts(1);
    let manager = SocketManager::new(config).expect("manager");

    let result = timeout(Duration::from_secs(3), manager.connect(VALID_TOKEN))
        .await
        .expect("connect bounded by the handshake timeout");
    assert!(matches!(result, Err(WsError::Connection(_))));

    // The background retry is bounded by the same deadline.
    wait_for_state(&manager, ConnectionState::Disconnected).await;
}

#[tokio::test]
async fn test_disconnect_cancels_stalled_handshake() {
    let config =
        WsConfig::new(silent_gateway().await).with_handshake_timeout(Duration::from_secs(30));
    let manager = Arc::new(SocketManager::new(config).expect("manager"));

    let attempt = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move { manager.connect(VALID_TOKEN).await }
    });
    wait_for_state(&manager, ConnectionState::Connecting { attempt: 0 }).await;

    timeout(Duration::from_secs(2), manager.disconnect())
        .await
        .expect("disconnect does not wait for the handshake");

    let result = timeout(Duration::from_secs(2), attempt)
        .await
        .expect("connect returns once cancelled")
        .expect("connect task");
    assert_eq!(result, Err(WsError::Superseded));
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_manual_reconnect_after_outage_requests_resync() {
    let gateway = FakeGateway::spawn().await;
    let manager =
        SocketManager::new(gateway.config().with_max_reconnect_attempts(2)).expect("manager");
    let mut subscription = manager.subscribe();

    manager.connect(VALID_TOKEN).await.expect("connect");
    // The first session has nothing to reconcile.
    let first = timeout(Duration::from_millis(200), subscription.recv()).await;
    assert!(first.is_err(), "unexpected signal: {:?}", first);

    gateway.refuse();
    gateway.kick();
    wait_for_state(&manager, ConnectionState::Disconnected).await;

    gateway.admit();
    manager.connect(VALID_TOKEN).await.expect("manual reconnect");

    let signal = timeout(Duration::from_secs(2), subscription.recv())
        .await
        .expect("signal before timeout");
    assert_eq!(signal, Some(Signal::Resync));
    assert_eq!(gateway.accepted(), 2);

    manager.disconnect().await;
}
