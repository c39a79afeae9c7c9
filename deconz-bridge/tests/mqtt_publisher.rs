//! MqttPublisher against a minimal in-process broker.

use std::time::Duration;

use deconz_bridge::{BrokerConfig, MqttPublisher, PublishError, Publisher};
use deconz_events::PublishMessage;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

const CONNACK_ACCEPTED: [u8; 4] = [0x20, 0x02, 0x00, 0x00];

/// Accept one client, answer its CONNECT and return the socket.
async fn accept_session(listener: &TcpListener) -> TcpStream {
    let (mut socket, _) = listener.accept().await.unwrap();
    let mut connect = [0u8; 256];
    let read = socket.read(&mut connect).await.unwrap();
    assert!(read > 0);
    assert_eq!(connect[0] >> 4, 1, "expected a CONNECT packet");
    socket.write_all(&CONNACK_ACCEPTED).await.unwrap();
    socket
}

async fn broker() -> (TcpListener, BrokerConfig) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = BrokerConfig {
        host: "127.0.0.1".to_string(),
        port: listener.local_addr().unwrap().port(),
        ..Default::default()
    }
    .with_client_id("deconz-bridge-test");
    (listener, config)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

#[tokio::test]
async fn test_publish_reaches_broker() {
    let (listener, config) = broker().await;
    let (received_tx, received_rx) = oneshot::channel();

    tokio::spawn(async move {
        let mut socket = accept_session(&listener).await;
        let mut received = Vec::new();
        let mut buf = [0u8; 512];
        while !contains(&received, b"21.500000") {
            let read = socket.read(&mut buf).await.unwrap();
            if read == 0 {
                break;
            }
            received.extend_from_slice(&buf[..read]);
        }
        let _ = received_tx.send(received);
    });

    let mut publisher = MqttPublisher::connect(config).await.unwrap();
    publisher
        .publish(&PublishMessage::new("deconz/sensor/7/temperature", "21.500000"))
        .await
        .unwrap();

    let received = tokio::time::timeout(Duration::from_secs(5), received_rx)
        .await
        .unwrap()
        .unwrap();

    // PUBLISH, QoS 0, not retained
    let publish_at = received
        .iter()
        .position(|byte| *byte == 0x30)
        .expect("no PUBLISH packet");
    assert!(contains(&received[publish_at..], b"deconz/sensor/7/temperature"));
    assert!(contains(&received[publish_at..], b"21.500000"));

    publisher.disconnect().await;
    publisher.disconnect().await;

    let result = publisher
        .publish(&PublishMessage::new("deconz/sensor/7/temperature", "22.000000"))
        .await;
    assert!(matches!(result, Err(PublishError::ConnectionLost)));
}

#[tokio::test]
async fn test_publish_after_broker_hangs_up() {
    let (listener, config) = broker().await;

    tokio::spawn(async move {
        let socket = accept_session(&listener).await;
        drop(socket);
    });

    let mut publisher = MqttPublisher::connect(config).await.unwrap();
    let message = PublishMessage::new("deconz/sensor/3/presence", "true");

    let mut result = publisher.publish(&message).await;
    for _ in 0..50 {
        if matches!(result, Err(PublishError::ConnectionLost)) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        result = publisher.publish(&message).await;
    }

    assert!(matches!(result, Err(PublishError::ConnectionLost)));
    publisher.disconnect().await;
}
