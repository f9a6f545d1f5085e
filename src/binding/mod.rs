pub mod service;

use std::{collections::HashSet, sync::Arc};

use tokio::sync::RwLock;

use crate::db::models::PlantId;

pub use service::BindingTracker;

/// Which plant the sensor board currently reports for, and which sensors
/// that plant has attached.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActiveBinding {
    pub plant_id: Option<PlantId>,
    pub sensor_names: HashSet<String>,
}

/// Shared handle to the process-wide `ActiveBinding`.
#[derive(Clone, Default)]
pub struct BindingState {
    inner: Arc<RwLock<ActiveBinding>>,
}

impl BindingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> ActiveBinding {
        self.inner.read().await.clone()
    }

    /// Point the binding at `plant_id`. The sensor set is left as is until
    /// [`replace_sensors`](Self::replace_sensors) is called.
    pub async fn set_plant(&self, plant_id: PlantId) {
        self.inner.write().await.plant_id = Some(plant_id);
    }

    /// Replace the sensor set wholesale.
    pub async fn replace_sensors(&self, sensor_names: HashSet<String>) {
        self.inner.write().await.sensor_names = sensor_names;
    }
}
