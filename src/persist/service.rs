use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    binding::BindingState,
    persist::policy::{self, Availability},
    ports::{PlantStore, WriteOutcome},
    reading_cache::ReadingCache,
};

/// Periodically copies the cached sensor reading onto the bound plant record.
pub struct PersistService<P> {
    store: P,
    cache: ReadingCache,
    binding: BindingState,
    interval: Duration,
}

impl<P: PlantStore> PersistService<P> {
    pub fn new(store: P, cache: ReadingCache, binding: BindingState, interval_secs: u64) -> Self {
        Self {
            store,
            cache,
            binding,
            interval: Duration::from_secs(interval_secs),
        }
    }

    /// Runs the persist loop until `cancel` fires. The first write happens
    /// one full interval after start.
    /// Spawn this via `tokio::spawn`.
    pub async fn run(self, cancel: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Persist loop started");
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if let Err(e) = self.run_once().await {
                error!(error = %e, "Persist iteration failed");
            }
        }
        info!("Persist loop stopped");
    }

    pub async fn run_once(&self) -> Result<()> {
        let binding = self.binding.snapshot().await;
        let Some(plant_id) = binding.plant_id else {
            debug!("No active plant yet; skipping persist");
            return Ok(());
        };

        let available = Availability::from_names(&binding.sensor_names);
        let Some(reading) = policy::select(available, self.cache.latest().await) else {
            debug!(plant_id = %plant_id, "No known sensors attached; skipping persist");
            return Ok(());
        };

        let outcome = self
            .store
            .set_readings(&plant_id, reading)
            .await
            .with_context(|| format!("failed to update sensor data for plant {plant_id}"))?;

        match outcome {
            WriteOutcome::Updated => info!(
                plant_id = %plant_id,
                temperature = reading.temperature,
                humidity = reading.humidity,
                soil_moisture = reading.soil_moisture,
                "Sensor data updated"
            ),
            WriteOutcome::Unchanged => info!(plant_id = %plant_id, "No changes made to plant"),
            WriteOutcome::NotFound => info!(plant_id = %plant_id, "Plant not found"),
        }
        Ok(())
    }
}
