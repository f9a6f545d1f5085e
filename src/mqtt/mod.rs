use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnAck, Event, EventLoop, MqttOptions, Packet, Publish, QoS};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{config::Config, error::BridgeError, ports::CommandBus, relay::BusMessage};

/// Pause after a connection error before polling again; the next poll
/// reconnects.
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

pub fn client(config: &Config) -> (AsyncClient, EventLoop) {
    let mut options = MqttOptions::new(&config.mqtt_client_id, &config.mqtt_host, config.mqtt_port);
    options.set_keep_alive(Duration::from_secs(30));
    // Keep the broker-side session so the subscription survives reconnects.
    options.set_clean_session(false);
    AsyncClient::new(options, 16)
}

/// Publishing half of the command bus.
#[derive(Clone)]
pub struct MqttBus {
    client: AsyncClient,
}

impl MqttBus {
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CommandBus for MqttBus {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), BridgeError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload.as_bytes().to_vec())
            .await?;
        Ok(())
    }
}

/// Whether a ConnAck needs a (re)subscribe. Only the first connection and
/// sessions the broker dropped do.
fn needs_subscribe(first_connect: bool, ack: &ConnAck) -> bool {
    first_connect || !ack.session_present
}

/// Queue a subscribe without waiting. The request channel is drained only by
/// the event loop, so a full channel is reported instead of awaited.
fn request_subscription(client: &AsyncClient, topic: &str) -> bool {
    match client.try_subscribe(topic, QoS::AtLeastOnce) {
        Ok(()) => {
            info!(topic = %topic, "Subscription requested");
            true
        }
        Err(e) => {
            warn!(topic = %topic, error = %e, "Subscribe not queued; will retry");
            false
        }
    }
}

/// Pass an incoming publish to the serial forwarder without blocking the
/// event loop. A full queue drops the message.
fn hand_off(messages: &mpsc::Sender<BusMessage>, publish: Publish) -> bool {
    let message = BusMessage {
        topic: publish.topic,
        payload: publish.payload.to_vec(),
    };
    match messages.try_send(message) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(message)) => {
            warn!(topic = %message.topic, "Serial forward queue full; message dropped");
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("Serial forwarder gone; message dropped");
            false
        }
    }
}

/// Drives the MQTT event loop until `cancel` fires.
///
/// On the first ConnAck it subscribes to `topic` and fires `connected`, which
/// starts the plant-record watch exactly once. Incoming publishes go to
/// `messages`. Nothing in here awaits anything but the event loop itself.
pub async fn drive(
    mut eventloop: EventLoop,
    client: AsyncClient,
    topic: String,
    messages: mpsc::Sender<BusMessage>,
    connected: oneshot::Sender<()>,
    cancel: CancellationToken,
) {
    let mut connected = Some(connected);
    let mut subscribe_pending = false;
    info!("MQTT event loop started");

    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = eventloop.poll() => event,
        };

        match event {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                info!(session_present = ack.session_present, "MQTT connected");
                subscribe_pending |= needs_subscribe(connected.is_some(), &ack);
                if let Some(tx) = connected.take() {
                    let _ = tx.send(());
                }
            }
            Ok(Event::Incoming(Packet::SubAck(ack))) => {
                info!(return_codes = ?ack.return_codes, "Subscription acknowledged");
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                hand_off(&messages, publish);
            }
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, "MQTT connection error");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                }
                continue;
            }
        }

        if subscribe_pending {
            subscribe_pending = !request_subscription(&client, &topic);
        }
    }

    if let Err(e) = client.try_disconnect() {
        warn!(error = %e, "MQTT disconnect failed");
    }
    info!("MQTT event loop stopped");
}
