use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

use super::{BusClient, ConnectionState};
use crate::message::{Payload, QoS};
use crate::network::LinkFlag;
use crate::subscription::Handler;
use crate::transport::{MemoryBus, MemoryTransport, SessionOptions, TransportError};
use crate::utils::error::BusError;

type Received = Arc<Mutex<Vec<(String, Payload)>>>;

fn client(bus: &MemoryBus, id: &str) -> BusClient<MemoryTransport> {
    BusClient::new(
        bus.transport(),
        SessionOptions::new("bus.local", 1883).with_client_id(id),
    )
}

fn recorder() -> (Handler, Received) {
    let received: Received = Arc::default();
    let sink = received.clone();
    let handler = Handler::new(move |topic, payload| {
        sink.lock().unwrap().push((topic.to_string(), payload.clone()));
        Ok(())
    });
    (handler, received)
}

fn counter() -> (Handler, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let count = calls.clone();
    let handler = Handler::new(move |_, _| {
        count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    (handler, calls)
}

#[tokio::test]
async fn test_connect_is_idempotent() {
    let bus = MemoryBus::new();
    let mut client = client(&bus, "sensor-1");
    assert_eq!(client.state(), ConnectionState::Disconnected);

    client.connect().await.unwrap();
    client.connect().await.unwrap();

    assert!(client.is_connected());
    assert_eq!(bus.handshakes(), 1);
    assert_eq!(bus.open_sessions(), 1);
}

#[tokio::test]
async fn test_disconnect_when_disconnected_is_noop() {
    let bus = MemoryBus::new();
    let mut client = client(&bus, "sensor-1");
    client.disconnect().await.unwrap();
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(bus.handshakes(), 0);
}

#[tokio::test]
async fn test_publish_round_trip() {
    let bus = MemoryBus::new();
    let mut listener = client(&bus, "listener");
    let mut publisher = client(&bus, "publisher");
    let (handler, received) = recorder();

    listener.subscribe("a/b", handler, QoS::AtMostOnce).await.unwrap();
    publisher
        .publish("a/b", json!({"k": 1}), false, QoS::AtMostOnce)
        .await
        .unwrap();

    assert!(listener.check_messages().await.unwrap());
    assert!(!listener.check_messages().await.unwrap());

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].0, "a/b");
    assert_eq!(received[0].1, Payload::Json(json!({"k": 1})));
}

#[tokio::test]
async fn test_publish_when_disconnected_closes_session() {
    let bus = MemoryBus::new();
    let mut publisher = client(&bus, "publisher");

    publisher
        .publish("sensors/temp", 21.5, false, QoS::AtMostOnce)
        .await
        .unwrap();

    assert_eq!(bus.handshakes(), 1);
    assert_eq!(bus.open_sessions(), 0);
    assert_eq!(publisher.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_publish_when_connected_keeps_session() {
    let bus = MemoryBus::new();
    let mut publisher = client(&bus, "publisher");
    publisher.connect().await.unwrap();

    publisher
        .publish("sensors/temp", "warm", false, QoS::AtMostOnce)
        .await
        .unwrap();
    publisher
        .publish("sensors/temp", "hot", false, QoS::AtMostOnce)
        .await
        .unwrap();

    assert!(publisher.is_connected());
    assert_eq!(bus.handshakes(), 1);
    assert_eq!(bus.open_sessions(), 1);
}

#[tokio::test]
async fn test_failed_publish_still_closes_session() {
    let bus = MemoryBus::new();
    let mut publisher = client(&bus, "publisher");
    bus.fail_publishes(true);

    let err = publisher
        .publish("a/b", "x", false, QoS::AtMostOnce)
        .await
        .unwrap_err();

    assert!(matches!(err, BusError::Transport(TransportError::Rejected(_))));
    assert_eq!(bus.open_sessions(), 0);
    assert_eq!(publisher.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_scalar_payloads_are_sent_as_json_text() {
    let bus = MemoryBus::new();
    let mut publisher = client(&bus, "publisher");

    publisher.publish("flag", true, true, QoS::AtMostOnce).await.unwrap();
    publisher.publish("level", 42, true, QoS::AtMostOnce).await.unwrap();
    publisher.publish("name", "porch", true, QoS::AtMostOnce).await.unwrap();

    assert_eq!(bus.retained("flag").as_deref(), Some(&b"true"[..]));
    assert_eq!(bus.retained("level").as_deref(), Some(&b"42"[..]));
    assert_eq!(bus.retained("name").as_deref(), Some(&b"porch"[..]));
}

#[tokio::test]
async fn test_publish_serialized() {
    #[derive(serde::Serialize)]
    struct Reading {
        celsius: f64,
    }

    let bus = MemoryBus::new();
    let mut publisher = client(&bus, "publisher");
    publisher
        .publish_serialized("sensors/temp", &Reading { celsius: 20.0 }, true, QoS::AtMostOnce)
        .await
        .unwrap();

    let stored = bus.retained("sensors/temp").unwrap();
    let value: serde_json::Value = serde_json::from_slice(&stored).unwrap();
    assert_eq!(value, json!({"celsius": 20.0}));
}

#[tokio::test]
async fn test_exact_and_wildcard_each_fire_once() {
    let bus = MemoryBus::new();
    let mut listener = client(&bus, "listener");
    let (exact, exact_calls) = counter();
    let (wildcard, wildcard_calls) = counter();

    listener
        .subscribe("sensors/temp", exact, QoS::AtMostOnce)
        .await
        .unwrap();
    listener
        .subscribe("sensors/+", wildcard, QoS::AtMostOnce)
        .await
        .unwrap();

    assert_eq!(listener.dispatch(b"sensors/temp", b"21"), 2);
    assert_eq!(exact_calls.load(Ordering::SeqCst), 1);
    assert_eq!(wildcard_calls.load(Ordering::SeqCst), 1);

    assert_eq!(listener.dispatch(b"sensors/humidity", b"40"), 1);
    assert_eq!(exact_calls.load(Ordering::SeqCst), 1);
    assert_eq!(wildcard_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_dispatch_without_match() {
    let bus = MemoryBus::new();
    let listener = client(&bus, "listener");
    assert_eq!(listener.dispatch(b"nobody/listens", b"{}"), 0);
}

#[tokio::test]
async fn test_failing_handlers_do_not_stop_dispatch() {
    let bus = MemoryBus::new();
    let mut listener = client(&bus, "listener");
    let failing = Handler::new(|_, _| Err("bad reading".into()));
    let panicking = Handler::new(|_, _| panic!("handler blew up"));
    let (healthy, calls) = counter();

    listener.subscribe("alerts", failing, QoS::AtMostOnce).await.unwrap();
    listener.subscribe("alerts", panicking, QoS::AtMostOnce).await.unwrap();
    listener.subscribe("alerts", healthy, QoS::AtMostOnce).await.unwrap();

    assert_eq!(listener.dispatch(b"alerts", b"fire"), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // The client stays usable afterwards.
    assert_eq!(listener.dispatch(b"alerts", b"fire"), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_dispatch_decodes_non_utf8_payload() {
    let bus = MemoryBus::new();
    let mut listener = client(&bus, "listener");
    let (handler, received) = recorder();
    listener.subscribe("raw", handler, QoS::AtMostOnce).await.unwrap();

    listener.dispatch(b"raw", &[0xff, 0xfe, 0x00]);

    let received = received.lock().unwrap();
    assert_eq!(received[0].1, Payload::Raw(vec![0xff, 0xfe, 0x00]));
}

#[tokio::test]
async fn test_wait_for_messages_requires_connection() {
    let bus = MemoryBus::new();
    let mut listener = client(&bus, "listener");
    let err = listener.wait_for_messages(async {}).await.unwrap_err();
    assert!(matches!(err, BusError::NotConnected));
}

#[tokio::test]
async fn test_check_messages_when_disconnected() {
    let bus = MemoryBus::new();
    let mut listener = client(&bus, "listener");
    assert!(!listener.check_messages().await.unwrap());
}

#[tokio::test]
async fn test_wait_for_messages_dispatches_until_shutdown() {
    let bus = MemoryBus::new();
    let mut listener = client(&bus, "listener");
    let (handler, received) = recorder();
    listener.subscribe("status/+", handler, QoS::AtMostOnce).await.unwrap();

    assert_eq!(bus.inject("status/door", b"open"), 1);
    assert_eq!(bus.inject("status/window", b"closed"), 1);
    assert_eq!(bus.inject("sensors/temp", b"21"), 0);

    listener
        .wait_for_messages(tokio::time::sleep(Duration::from_millis(50)))
        .await
        .unwrap();

    assert!(listener.is_connected());
    let topics: Vec<String> = received
        .lock()
        .unwrap()
        .iter()
        .map(|(topic, _)| topic.clone())
        .collect();
    assert_eq!(topics, vec!["status/door", "status/window"]);
}

#[tokio::test]
async fn test_lost_session_ends_wait_loop() {
    let bus = MemoryBus::new();
    let mut listener = client(&bus, "listener");
    listener.connect().await.unwrap();

    bus.drop_sessions();
    let err = listener
        .wait_for_messages(std::future::pending())
        .await
        .unwrap_err();

    assert!(matches!(err, BusError::Transport(TransportError::Closed)));
    assert_eq!(listener.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_lost_session_in_check_messages() {
    let bus = MemoryBus::new();
    let mut listener = client(&bus, "listener");
    listener.connect().await.unwrap();

    bus.drop_sessions();
    assert!(listener.check_messages().await.is_err());
    assert_eq!(listener.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_handshake_refused() {
    let bus = MemoryBus::new();
    bus.refuse_handshakes(true);
    let mut client = client(&bus, "sensor-1");

    let err = client.connect().await.unwrap_err();
    match err {
        BusError::Handshake { address, .. } => assert_eq!(address, "bus.local:1883"),
        other => panic!("expected handshake error, got {other:?}"),
    }
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(bus.handshakes(), 1);
}

#[tokio::test]
async fn test_connect_times_out_without_network() {
    let bus = MemoryBus::new();
    let link = LinkFlag::new(false);
    let mut client = BusClient::with_network(
        bus.transport(),
        link,
        SessionOptions::new("bus.local", 1883),
    )
    .connect_timeout(Duration::from_millis(50))
    .poll_interval(Duration::from_millis(5));

    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, BusError::NetworkUnreachable(_)));
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(bus.handshakes(), 0);
}

#[tokio::test]
async fn test_publish_times_out_without_network() {
    let bus = MemoryBus::new();
    let mut client = BusClient::with_network(
        bus.transport(),
        || false,
        SessionOptions::new("bus.local", 1883),
    )
    .connect_timeout(Duration::from_millis(20))
    .poll_interval(Duration::from_millis(5));

    let err = client
        .publish("a/b", "x", false, QoS::AtMostOnce)
        .await
        .unwrap_err();
    assert!(matches!(err, BusError::NetworkUnreachable(_)));
    assert_eq!(bus.handshakes(), 0);
}

#[tokio::test]
async fn test_connect_waits_for_link() {
    let bus = MemoryBus::new();
    let link = LinkFlag::new(false);
    let driver = link.clone();
    let mut client = BusClient::with_network(
        bus.transport(),
        link,
        SessionOptions::new("bus.local", 1883),
    )
    .connect_timeout(Duration::from_secs(5))
    .poll_interval(Duration::from_millis(5));

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        driver.set_up();
    });

    client.connect().await.unwrap();
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_reconnect_restores_subscriptions() {
    let bus = MemoryBus::new();
    let mut listener = client(&bus, "listener");
    let (handler, calls) = counter();
    listener
        .subscribe("sensors/+", handler, QoS::AtLeastOnce)
        .await
        .unwrap();

    listener.disconnect().await.unwrap();
    assert_eq!(bus.subscribers("sensors/+"), 0);

    listener.connect().await.unwrap();
    assert_eq!(bus.subscribers("sensors/+"), 1);

    bus.inject("sensors/temp", b"19");
    assert!(listener.check_messages().await.unwrap());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unsubscribe_unknown_is_noop() {
    let bus = MemoryBus::new();
    let mut listener = client(&bus, "listener");
    let (handler, _) = counter();

    listener.unsubscribe("never/subscribed", None).await;
    listener.unsubscribe("never/subscribed", Some(&handler)).await;
    assert!(listener.subscriptions().is_empty());
}

#[tokio::test]
async fn test_unsubscribe_last_handler_drops_broker_subscription() {
    let bus = MemoryBus::new();
    let mut listener = client(&bus, "listener");
    let (first, first_calls) = counter();
    let (second, second_calls) = counter();

    listener.subscribe("a/b", first.clone(), QoS::AtMostOnce).await.unwrap();
    listener.subscribe("a/b", second.clone(), QoS::AtMostOnce).await.unwrap();

    listener.unsubscribe("a/b", Some(&first)).await;
    assert_eq!(bus.subscribers("a/b"), 1);
    assert_eq!(listener.dispatch(b"a/b", b"1"), 1);
    assert_eq!(first_calls.load(Ordering::SeqCst), 0);
    assert_eq!(second_calls.load(Ordering::SeqCst), 1);

    listener.unsubscribe("a/b", Some(&second)).await;
    assert_eq!(bus.subscribers("a/b"), 0);
    assert!(!listener.subscriptions().contains("a/b"));
    assert_eq!(listener.dispatch(b"a/b", b"1"), 0);
}

#[tokio::test]
async fn test_retained_status_is_replayed() {
    let bus = MemoryBus::new();
    let mut device = client(&bus, "door-controller");
    let mut dashboard = client(&bus, "dashboard");
    let (handler, received) = recorder();

    device
        .publish_status("door", "open", true, QoS::AtLeastOnce)
        .await
        .unwrap();
    assert_eq!(device.state(), ConnectionState::Disconnected);

    dashboard
        .subscribe_to_status(Some("door"), handler, QoS::AtLeastOnce)
        .await
        .unwrap();
    assert!(dashboard.check_messages().await.unwrap());

    let received = received.lock().unwrap();
    assert_eq!(received[0].0, "status/door");
    let body = received[0].1.as_json().unwrap();
    assert_eq!(body["device"], "door");
    assert_eq!(body["status"], "open");
    assert!(body["timestamp"].is_i64());
}

#[tokio::test]
async fn test_sensor_data_helpers() {
    let bus = MemoryBus::new();
    let mut device = client(&bus, "weather-station");
    let mut dashboard = client(&bus, "dashboard");
    let (handler, received) = recorder();

    dashboard
        .subscribe_to_sensor(None, handler, QoS::AtMostOnce)
        .await
        .unwrap();
    assert!(dashboard.subscriptions().contains("sensors/+"));

    device
        .publish_sensor_data("temp", json!({"celsius": 21.5}), false, QoS::AtMostOnce)
        .await
        .unwrap();
    assert!(dashboard.check_messages().await.unwrap());

    let received = received.lock().unwrap();
    assert_eq!(received[0].0, "sensors/temp");
    let body = received[0].1.as_json().unwrap();
    assert_eq!(body["sensor"], "temp");
    assert_eq!(body["data"], json!({"celsius": 21.5}));
    assert!(body["timestamp"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_from_settings() {
    let mut settings = crate::config::Settings::default();
    settings.broker.client_id = Some("configured".to_string());
    settings.network.connect_timeout_ms = 10;

    let bus = MemoryBus::new();
    let client = BusClient::from_settings(bus.transport(), LinkFlag::new(true), &settings);
    assert_eq!(client.options().client_id, "configured");
    assert_eq!(client.options().address(), "127.0.0.1:8080");
}
