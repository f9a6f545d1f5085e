use anyhow::{Context, Result};
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    binding::BindingState,
    db::models::{ChangeEvent, PlantId},
    error::BridgeError,
    ports::DeviceRegistry,
};

const PLANT_ID_FIELD: &str = "plant_id";

/// Follows device-registry updates and keeps `BindingState` pointed at the
/// plant the devices were last attached to.
pub struct BindingTracker<R> {
    registry: R,
    state: BindingState,
}

impl<R: DeviceRegistry> BindingTracker<R> {
    pub fn new(registry: R, state: BindingState) -> Self {
        Self { registry, state }
    }

    /// Apply one device-registry change.
    ///
    /// Events that did not touch `plant_id` are ignored. Otherwise the plant
    /// id is switched first and the sensor set is rebuilt from a fresh
    /// registry query; if that query fails the previous sensor set stays.
    pub async fn handle(&self, event: &ChangeEvent) -> Result<()> {
        let Some(value) = event.updated_field(PLANT_ID_FIELD) else {
            debug!(operation = ?event.operation, "Device change without plant_id; ignored");
            return Ok(());
        };

        let plant_id = PlantId::new(value.clone());
        self.state.set_plant(plant_id.clone()).await;
        info!(plant_id = %plant_id, "Active plant changed");

        let sensor_names = self
            .registry
            .sensor_names(&plant_id)
            .await
            .with_context(|| format!("failed to list sensors for plant {plant_id}"))?;

        info!(plant_id = %plant_id, sensors = ?sensor_names, "Sensor set refreshed");
        self.state.replace_sensors(sensor_names).await;
        Ok(())
    }

    /// Applies events in arrival order until the stream ends or `cancel`
    /// fires. Dropping the stream on return closes the watch.
    pub async fn run<S>(self, mut events: S, cancel: CancellationToken)
    where
        S: Stream<Item = Result<ChangeEvent, BridgeError>> + Unpin,
    {
        info!("Binding tracker started");
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => break,
                next = events.next() => next,
            };

            match next {
                Some(Ok(event)) => {
                    if let Err(e) = self.handle(&event).await {
                        error!(error = %e, "Failed to refresh device binding");
                    }
                }
                Some(Err(e)) => error!(error = %e, "Device change stream error"),
                None => {
                    warn!("Device change stream closed");
                    break;
                }
            }
        }
        info!("Binding tracker stopped");
    }
}
