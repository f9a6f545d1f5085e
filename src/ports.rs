//! Seams between the relay services and the outside world.
//!
//! MongoDB, MQTT and the serial port each implement one of these; the
//! services are generic over them so tests can swap in recording fakes.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::{
    db::models::{PlantId, SensorReading},
    error::BridgeError,
};

/// Result of a partial write to a plant record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Updated,
    /// The record exists but already held these values.
    Unchanged,
    NotFound,
}

#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// Distinct sensor names of every device attached to `plant_id`.
    async fn sensor_names(&self, plant_id: &PlantId) -> Result<HashSet<String>, BridgeError>;
}

#[async_trait]
pub trait PlantStore: Send + Sync {
    /// `$set` the three numeric reading fields on the plant record.
    async fn set_readings(
        &self,
        plant_id: &PlantId,
        reading: SensorReading,
    ) -> Result<WriteOutcome, BridgeError>;
}

#[async_trait]
pub trait CommandBus: Send + Sync {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), BridgeError>;
}

#[async_trait]
pub trait SerialSink: Send + Sync {
    /// Write `payload` to the sensor board verbatim.
    async fn write_text(&self, payload: &str) -> Result<(), BridgeError>;
}
