use thiserror::Error;

/// Errors surfaced by the database, bus and serial adapters.
///
/// Services never let these cross a task boundary: each event or tick logs
/// the error and moves on.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("plant id {0} is not a valid ObjectId")]
    InvalidPlantId(String),

    #[error("command bus error: {0}")]
    Bus(#[from] rumqttc::ClientError),

    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("serial i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serial port lock poisoned")]
    PortPoisoned,

    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
