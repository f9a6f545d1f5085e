use anyhow::{Context, Result};
use futures::{Stream, StreamExt};
use mongodb::bson::Bson;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    db::models::ChangeEvent,
    error::BridgeError,
    ports::{CommandBus, SerialSink},
};

const CARE_NEEDED_FIELD: &str = "careNeeded";

/// Bus payload for a care flag.
pub fn care_payload(care_needed: bool) -> &'static str {
    if care_needed {
        "1"
    } else {
        "0"
    }
}

/// Loose truthiness so a flag stored as `1`/`"yes"` still reads as set.
fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(f) => *f != 0.0 && !f.is_nan(),
        Bson::String(s) => !s.is_empty(),
        Bson::Null | Bson::Undefined => false,
        _ => true,
    }
}

/// A message taken off the command bus, waiting to go to the serial port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Carries the care signal both ways: plant-record changes out to the
/// command bus, and command-bus messages down to the sensor board.
///
/// The two directions share no state.
pub struct CareRelay<B, S> {
    bus: B,
    serial: S,
    topic: String,
}

impl<B: CommandBus, S: SerialSink> CareRelay<B, S> {
    pub fn new(bus: B, serial: S, topic: impl Into<String>) -> Self {
        Self {
            bus,
            serial,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish the new `careNeeded` value if `event` changed it.
    /// Returns the payload that was published, if any.
    pub async fn on_plant_change(&self, event: &ChangeEvent) -> Result<Option<&'static str>> {
        info!(
            operation = ?event.operation,
            document_key = ?event.document_key,
            updated_fields = ?event.updated_fields,
            "Plant change detected"
        );

        let Some(value) = event.updated_field(CARE_NEEDED_FIELD) else {
            return Ok(None);
        };

        let payload = care_payload(is_truthy(value));
        info!(care_needed = %value, payload, "careNeeded changed");

        self.bus
            .publish(&self.topic, payload)
            .await
            .with_context(|| format!("failed to publish on {}", self.topic))?;
        Ok(Some(payload))
    }

    /// Forward a bus message to the serial port verbatim.
    ///
    /// Messages on other topics are dropped. Write failures are logged, not
    /// returned: nothing waits for an acknowledgement.
    pub async fn on_bus_message(&self, topic: &str, payload: &[u8]) {
        if topic != self.topic {
            debug!(topic = %topic, "Ignoring message on unrelated topic");
            return;
        }

        let text = String::from_utf8_lossy(payload);
        info!(payload = %text, "Forwarding command to serial port");

        match self.serial.write_text(&text).await {
            Ok(()) => info!("Command written to serial port"),
            Err(e) => error!(error = %e, "Failed to write command to serial port"),
        }
    }

    /// Writes queued bus messages to the serial port in arrival order until
    /// the queue closes or `cancel` fires.
    ///
    /// Runs apart from the MQTT event loop so a slow serial write never holds
    /// up keep-alives or outgoing publishes.
    pub async fn forward_to_serial(
        &self,
        mut messages: mpsc::Receiver<BusMessage>,
        cancel: CancellationToken,
    ) {
        info!("Serial forwarder started");
        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => break,
                message = messages.recv() => message,
            };
            let Some(message) = message else { break };
            self.on_bus_message(&message.topic, &message.payload).await;
        }
        info!("Serial forwarder stopped");
    }

    /// Relays plant changes until the stream ends or `cancel` fires.
    pub async fn watch_plants<St>(&self, mut events: St, cancel: CancellationToken)
    where
        St: Stream<Item = Result<ChangeEvent, BridgeError>> + Unpin,
    {
        info!(topic = %self.topic, "Care signal relay started");
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => break,
                next = events.next() => next,
            };

            match next {
                Some(Ok(event)) => {
                    if let Err(e) = self.on_plant_change(&event).await {
                        error!(error = %e, "Failed to relay care signal");
                    }
                }
                Some(Err(e)) => error!(error = %e, "Plant change stream error"),
                None => {
                    warn!("Plant change stream closed");
                    break;
                }
            }
        }
        info!("Care signal relay stopped");
    }
}
