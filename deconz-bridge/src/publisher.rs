//! Outbound side of the bridge: the broker connection.
//!
//! [`Publisher`] is the seam the translator publishes through. The
//! production implementation, [`MqttPublisher`], owns a rumqttc client whose
//! event loop is driven by one spawned task.

use async_trait::async_trait;
use deconz_events::PublishMessage;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, trace, warn};

use crate::config::BrokerConfig;
use crate::error::{BridgeError, PublishError, Result};

/// Something the translator can hand publish messages to.
#[async_trait]
pub trait Publisher: Send {
    /// Publish one message at most once, not retained.
    ///
    /// Returns once the message has been handed to the network.
    async fn publish(&mut self, message: &PublishMessage) -> std::result::Result<(), PublishError>;

    /// Close the broker connection. Calling it again does nothing.
    async fn disconnect(&mut self);
}

/// Publisher backed by a persistent MQTT connection.
pub struct MqttPublisher {
    client: AsyncClient,
    /// One notice per PUBLISH packet the event loop has written
    sent: mpsc::UnboundedReceiver<()>,
    /// Notices still due for publishes that timed out
    owed: usize,
    driver: Option<JoinHandle<()>>,
    config: BrokerConfig,
}

impl MqttPublisher {
    /// Connect to the broker and wait for it to accept the session.
    ///
    /// Fails with [`BridgeError::Config`] for an invalid configuration and
    /// with [`BridgeError::PublisherConnect`] if the broker refuses the
    /// connection or does not answer within the connect timeout.
    pub async fn connect(config: BrokerConfig) -> Result<Self> {
        config.validate()?;

        let mut options = MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
        options.set_keep_alive(config.keep_alive);
        options.set_clean_session(true);

        let (client, mut eventloop) = AsyncClient::new(options, config.request_capacity);

        debug!(broker = %config.address(), client_id = %config.client_id, "connecting to MQTT broker");

        match timeout(config.connect_timeout, wait_for_connack(&mut eventloop)).await {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => {
                return Err(BridgeError::PublisherConnect {
                    broker: config.address(),
                    reason,
                })
            }
            Err(_) => {
                return Err(BridgeError::PublisherConnect {
                    broker: config.address(),
                    reason: format!("no answer within {:?}", config.connect_timeout),
                })
            }
        }

        info!(broker = %config.address(), "connected to MQTT broker");

        let (sent_tx, sent) = mpsc::unbounded_channel();
        let driver = tokio::spawn(drive_event_loop(eventloop, sent_tx));

        Ok(Self::with_driver(client, sent, driver, config))
    }

    fn with_driver(
        client: AsyncClient,
        sent: mpsc::UnboundedReceiver<()>,
        driver: JoinHandle<()>,
        config: BrokerConfig,
    ) -> Self {
        Self {
            client,
            sent,
            owed: 0,
            driver: Some(driver),
            config,
        }
    }

    fn is_connected(&self) -> bool {
        self.driver.as_ref().is_some_and(|driver| !driver.is_finished())
    }
}

#[async_trait]
impl Publisher for MqttPublisher {
    async fn publish(&mut self, message: &PublishMessage) -> std::result::Result<(), PublishError> {
        if !self.is_connected() {
            return Err(PublishError::ConnectionLost);
        }

        // Notices for publishes that timed out arrive before this one's
        while self.owed > 0 && self.sent.try_recv().is_ok() {
            self.owed -= 1;
        }

        let publish_timeout = self.config.publish_timeout;
        let deadline = Instant::now() + publish_timeout;

        let queued = self.client.publish(
            message.topic.as_str(),
            QoS::AtMostOnce,
            false,
            message.payload.as_bytes().to_vec(),
        );
        match timeout_at(deadline, queued).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(PublishError::Client(e.to_string())),
            Err(_) => return Err(PublishError::Timeout(publish_timeout)),
        }

        loop {
            match timeout_at(deadline, self.sent.recv()).await {
                Ok(Some(())) if self.owed > 0 => self.owed -= 1,
                Ok(Some(())) => return Ok(()),
                Ok(None) => return Err(PublishError::ConnectionLost),
                Err(_) => {
                    self.owed += 1;
                    return Err(PublishError::Timeout(publish_timeout));
                }
            }
        }
    }

    async fn disconnect(&mut self) {
        let Some(driver) = self.driver.take() else {
            return;
        };

        if !driver.is_finished() {
            if let Err(e) = self.client.try_disconnect() {
                debug!(error = %e, "disconnect request not queued");
            }
        }

        let abort = driver.abort_handle();
        if timeout(self.config.publish_timeout, driver).await.is_err() {
            abort.abort();
        }

        info!(broker = %self.config.address(), "disconnected from MQTT broker");
    }
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> std::result::Result<(), String> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
            Ok(_) => {}
            Err(e) => return Err(e.to_string()),
        }
    }
}

/// Poll the event loop until the connection ends.
///
/// There is no reconnection: once this returns, later publishes fail with
/// [`PublishError::ConnectionLost`].
async fn drive_event_loop(mut eventloop: EventLoop, sent: mpsc::UnboundedSender<()>) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Outgoing(Outgoing::Publish(_))) => {
                if sent.send(()).is_err() {
                    break;
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("MQTT disconnect sent");
                break;
            }
            Ok(Event::Incoming(Packet::PingResp)) => {
                trace!("MQTT ping answered");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "MQTT connection lost");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = BrokerConfig {
            host: "127.0.0.1".to_string(),
            port,
            ..Default::default()
        };

        match MqttPublisher::connect(config).await {
            Err(BridgeError::PublisherConnect { broker, .. }) => {
                assert_eq!(broker, format!("127.0.0.1:{port}"));
            }
            other => panic!("expected PublisherConnect, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_connect_times_out_without_connack() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let silent_broker = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let config = BrokerConfig {
            host: "127.0.0.1".to_string(),
            port,
            ..Default::default()
        }
        .with_timeouts(Duration::from_millis(200), Duration::from_secs(1));

        let result = MqttPublisher::connect(config).await;
        assert!(matches!(result, Err(BridgeError::PublisherConnect { .. })));
        silent_broker.abort();
    }

    #[tokio::test]
    async fn test_sub_second_keep_alive_is_rejected() {
        let config = BrokerConfig::default().with_keep_alive(Duration::from_millis(500));

        let result = MqttPublisher::connect(config).await;
        assert!(matches!(result, Err(BridgeError::Config(_))));
    }

    #[tokio::test]
    async fn test_late_notice_is_not_taken_for_the_next_publish() {
        let options = MqttOptions::new("deconz-bridge-test", "127.0.0.1", 1883);
        let (client, _eventloop) = AsyncClient::new(options, 10);
        let (sent_tx, sent) = mpsc::unbounded_channel();
        let driver = tokio::spawn(std::future::pending::<()>());
        let config = BrokerConfig::default()
            .with_timeouts(Duration::from_secs(1), Duration::from_millis(50));
        let mut publisher = MqttPublisher::with_driver(client, sent, driver, config);
        let message = PublishMessage::new("deconz/sensor/3/presence", "true");

        assert!(matches!(
            publisher.publish(&message).await,
            Err(PublishError::Timeout(_))
        ));

        // Written after its publish gave up; must not complete the next one
        sent_tx.send(()).unwrap();
        assert!(matches!(
            publisher.publish(&message).await,
            Err(PublishError::Timeout(_))
        ));

        // The second publish's notice, then the third's
        sent_tx.send(()).unwrap();
        sent_tx.send(()).unwrap();
        assert!(publisher.publish(&message).await.is_ok());
        assert_eq!(publisher.owed, 0);
    }
}
