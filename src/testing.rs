//! Recording fakes for the port traits.
//!
//! Each fake keeps a call log so tests can assert on exactly what the
//! services asked the outside world to do.

use std::{
    collections::HashSet,
    io,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use mongodb::{
    bson::{Bson, Document},
    change_stream::event::OperationType,
};
use tracing::{subscriber::DefaultGuard, Level};

use crate::{
    db::models::{ChangeEvent, PlantId, SensorReading},
    error::BridgeError,
    ports::{CommandBus, DeviceRegistry, PlantStore, SerialSink, WriteOutcome},
};

pub fn io_error(msg: &str) -> BridgeError {
    BridgeError::Io(std::io::Error::other(msg.to_owned()))
}

pub fn plant(id: &str) -> PlantId {
    PlantId::new(Bson::String(id.to_owned()))
}

pub fn names(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

pub fn update_event(updated_fields: Document) -> ChangeEvent {
    ChangeEvent {
        operation: OperationType::Update,
        document_key: None,
        updated_fields: Some(updated_fields),
    }
}

// ── Log capture ───────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Route this thread's events at or above `level` into a buffer until the
/// guard is dropped. Works with the current-thread `#[tokio::test]` runtime.
pub fn capture_logs(level: Level) -> (DefaultGuard, CapturedLogs) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    (tracing::subscriber::set_default(subscriber), logs)
}

pub fn logged(logs: &CapturedLogs) -> String {
    String::from_utf8_lossy(&logs.0.lock().unwrap()).into_owned()
}

// ── DeviceRegistry ────────────────────────────────────────────

/// Answers every query with the same result.
#[derive(Clone, Default)]
pub struct FakeRegistry {
    names: Arc<Mutex<Option<HashSet<String>>>>,
    pub queries: Arc<Mutex<Vec<PlantId>>>,
}

impl FakeRegistry {
    pub fn with_names(items: &[&str]) -> Self {
        let registry = Self::default();
        registry.set_names(Some(names(items)));
        registry
    }

    /// `None` makes the next queries fail.
    pub fn set_names(&self, value: Option<HashSet<String>>) {
        *self.names.lock().unwrap() = value;
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl DeviceRegistry for FakeRegistry {
    async fn sensor_names(&self, plant_id: &PlantId) -> Result<HashSet<String>, BridgeError> {
        self.queries.lock().unwrap().push(plant_id.clone());
        self.names
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| io_error("registry offline"))
    }
}

// ── PlantStore ────────────────────────────────────────────────

#[derive(Clone)]
pub struct FakePlantStore {
    outcome: Arc<Mutex<Option<WriteOutcome>>>,
    pub writes: Arc<Mutex<Vec<(PlantId, SensorReading)>>>,
}

impl FakePlantStore {
    pub fn new(outcome: WriteOutcome) -> Self {
        Self {
            outcome: Arc::new(Mutex::new(Some(outcome))),
            writes: Arc::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            outcome: Arc::default(),
            writes: Arc::default(),
        }
    }

    pub fn writes(&self) -> Vec<(PlantId, SensorReading)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlantStore for FakePlantStore {
    async fn set_readings(
        &self,
        plant_id: &PlantId,
        reading: SensorReading,
    ) -> Result<WriteOutcome, BridgeError> {
        self.writes.lock().unwrap().push((plant_id.clone(), reading));
        self.outcome
            .lock()
            .unwrap()
            .ok_or_else(|| io_error("write rejected"))
    }
}

// ── CommandBus ────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct RecordingBus {
    pub published: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingBus {
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandBus for RecordingBus {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), BridgeError> {
        self.published
            .lock()
            .unwrap()
            .push((topic.to_owned(), payload.to_owned()));
        Ok(())
    }
}

// ── SerialSink ────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct RecordingSerial {
    pub written: Arc<Mutex<Vec<String>>>,
    pub fail: bool,
}

impl RecordingSerial {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn written(&self) -> Vec<String> {
        self.written.lock().unwrap().clone()
    }
}

#[async_trait]
impl SerialSink for RecordingSerial {
    async fn write_text(&self, payload: &str) -> Result<(), BridgeError> {
        if self.fail {
            return Err(io_error("port unplugged"));
        }
        self.written.lock().unwrap().push(payload.to_owned());
        Ok(())
    }
}
