use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{reading_cache::ReadingCache, sensors::frame::parse_frame};

/// Feeds lines from the sensor board into the shared `ReadingCache`.
pub struct SensorService {
    cache: ReadingCache,
}

impl SensorService {
    pub fn new(cache: ReadingCache) -> Self {
        Self { cache }
    }

    /// Parse `line` and, if it is a complete frame, replace the cached
    /// reading. Returns whether the cache changed.
    pub async fn ingest(&self, line: &str) -> bool {
        let Some(reading) = parse_frame(line) else {
            debug!(line = %line.trim(), "Ignoring non-frame serial line");
            return false;
        };

        self.cache.replace(reading).await;
        debug!(
            soil_moisture = reading.soil_moisture,
            humidity = reading.humidity,
            temperature = reading.temperature,
            "Sensor reading received"
        );
        true
    }

    /// Consumes serial lines until the channel closes or `cancel` fires.
    pub async fn run(self, mut lines: mpsc::Receiver<String>, cancel: CancellationToken) {
        info!("Sensor ingest loop started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                line = lines.recv() => match line {
                    Some(line) => {
                        self.ingest(&line).await;
                    }
                    None => break,
                },
            }
        }
        info!("Sensor ingest loop stopped");
    }
}
