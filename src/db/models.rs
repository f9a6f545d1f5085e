use std::{fmt, str::FromStr};

use mongodb::{
    bson::{oid::ObjectId, Bson, Document},
    change_stream::event::{ChangeStreamEvent, OperationType},
};
use serde::Deserialize;

use crate::error::BridgeError;

/// Sensor kinds the plant record stores a value for.
///
/// The string form matches both the `name` field of `userdevices` rows and
/// the numeric field names on `userplants`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Temperature,
    Humidity,
    SoilMoisture,
}

impl FromStr for SensorKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "temperature" => Ok(Self::Temperature),
            "humidity" => Ok(Self::Humidity),
            "soil_moisture" => Ok(Self::SoilMoisture),
            other => Err(anyhow::anyhow!("unknown sensor kind: {other:?}")),
        }
    }
}

/// Latest values reported by the sensor board. Missing values are 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorReading {
    pub soil_moisture: i64,
    pub humidity: i64,
    pub temperature: i64,
}

impl SensorReading {
    pub fn value(&self, kind: SensorKind) -> i64 {
        match kind {
            SensorKind::Temperature => self.temperature,
            SensorKind::Humidity => self.humidity,
            SensorKind::SoilMoisture => self.soil_moisture,
        }
    }
}

/// Plant identifier exactly as it appeared in the device registry.
///
/// Device rows may hold the id either as an ObjectId or as its hex string;
/// the value is kept as-is so registry queries match the stored form.
#[derive(Debug, Clone, PartialEq)]
pub struct PlantId(Bson);

impl PlantId {
    pub fn new(value: Bson) -> Self {
        Self(value)
    }

    pub fn as_bson(&self) -> &Bson {
        &self.0
    }

    /// The `_id` of the plant record this id refers to.
    pub fn to_object_id(&self) -> Result<ObjectId, BridgeError> {
        match &self.0 {
            Bson::ObjectId(oid) => Ok(*oid),
            Bson::String(s) => {
                ObjectId::parse_str(s).map_err(|_| BridgeError::InvalidPlantId(s.clone()))
            }
            other => Err(BridgeError::InvalidPlantId(other.to_string())),
        }
    }
}

impl fmt::Display for PlantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Bson::String(s) => f.write_str(s),
            Bson::ObjectId(oid) => write!(f, "{oid}"),
            other => write!(f, "{other}"),
        }
    }
}

/// Projection of a `userdevices` row; only the sensor name matters here.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceRecord {
    pub name: Option<String>,
}

/// The parts of a change-stream notification the services look at.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub operation: OperationType,
    pub document_key: Option<Document>,
    pub updated_fields: Option<Document>,
}

impl ChangeEvent {
    /// New value of `field` if this is an update that touched it.
    pub fn updated_field(&self, field: &str) -> Option<&Bson> {
        if self.operation != OperationType::Update {
            return None;
        }
        self.updated_fields.as_ref()?.get(field)
    }
}

impl From<ChangeStreamEvent<Document>> for ChangeEvent {
    fn from(event: ChangeStreamEvent<Document>) -> Self {
        Self {
            operation: event.operation_type,
            document_key: event.document_key,
            updated_fields: event.update_description.map(|d| d.updated_fields),
        }
    }
}
