use std::sync::Arc;

use tokio::sync::RwLock;

use crate::db::models::SensorReading;

/// In-memory copy of the most recent `SensorReading` from the sensor board.
///
/// Wrapped in `Arc` so it can be cheaply cloned and shared across tasks.
/// The reading is always replaced as a whole under the write lock, so a
/// reader never sees fields from two different frames.
#[derive(Clone, Default)]
pub struct ReadingCache {
    inner: Arc<RwLock<SensorReading>>,
}

impl ReadingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite all three values with `reading`.
    pub async fn replace(&self, reading: SensorReading) {
        *self.inner.write().await = reading;
    }

    pub async fn latest(&self) -> SensorReading {
        *self.inner.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(soil_moisture: i64, humidity: i64, temperature: i64) -> SensorReading {
        SensorReading {
            soil_moisture,
            humidity,
            temperature,
        }
    }

    #[tokio::test]
    async fn starts_zeroed() {
        let cache = ReadingCache::new();
        assert_eq!(cache.latest().await, SensorReading::default());
    }

    #[tokio::test]
    async fn replace_overwrites_every_field() {
        let cache = ReadingCache::new();
        cache.replace(reading(40, 55, 21)).await;
        cache.replace(reading(0, 60, 0)).await;

        assert_eq!(cache.latest().await, reading(0, 60, 0));
    }

    #[tokio::test]
    async fn clone_shares_state() {
        let cache = ReadingCache::new();
        let clone = cache.clone();

        cache.replace(reading(33, 44, 22)).await;

        // Clone sees the same data
        assert_eq!(clone.latest().await.humidity, 44);
    }
}
