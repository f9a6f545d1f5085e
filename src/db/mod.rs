pub mod models;

use std::collections::HashSet;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{stream::BoxStream, StreamExt, TryStreamExt};
use mongodb::{
    bson::{doc, Document},
    Client, Collection,
};
use tracing::info;

use crate::{
    config::Config,
    error::BridgeError,
    ports::{DeviceRegistry, PlantStore, WriteOutcome},
};

use self::models::{ChangeEvent, DeviceRecord, PlantId, SensorReading};

/// A change stream reduced to [`ChangeEvent`]s.
pub type ChangeEvents = BoxStream<'static, Result<ChangeEvent, BridgeError>>;

pub async fn connect(uri: &str) -> Result<Client> {
    let client = Client::with_uri_str(uri)
        .await
        .context("failed to create MongoDB client")?;
    client
        .database("admin")
        .run_command(doc! { "ping": 1 })
        .await
        .context("MongoDB did not answer ping")?;
    Ok(client)
}

/// Handles to the two collections the bridge touches.
///
/// The driver client pools its connections, so one `MongoStore` is shared by
/// the short-lived writes and the long-lived watches.
#[derive(Debug, Clone)]
pub struct MongoStore {
    devices: Collection<Document>,
    plants: Collection<Document>,
}

impl MongoStore {
    pub fn new(client: &Client, config: &Config) -> Self {
        let db = client.database(&config.mongodb_database);
        Self {
            devices: db.collection(&config.devices_collection),
            plants: db.collection(&config.plants_collection),
        }
    }

    /// Watch the device registry for updates only.
    pub async fn watch_devices(&self) -> Result<ChangeEvents, BridgeError> {
        let stream = self
            .devices
            .watch()
            .pipeline([doc! { "$match": { "operationType": "update" } }])
            .await?;
        info!(collection = %self.devices.name(), "Watching device registry");
        Ok(stream.map_ok(ChangeEvent::from).err_into::<BridgeError>().boxed())
    }

    /// Watch every change on the plant records.
    pub async fn watch_plants(&self) -> Result<ChangeEvents, BridgeError> {
        let stream = self.plants.watch().await?;
        info!(collection = %self.plants.name(), "Watching plant records");
        Ok(stream.map_ok(ChangeEvent::from).err_into::<BridgeError>().boxed())
    }
}

#[async_trait]
impl DeviceRegistry for MongoStore {
    async fn sensor_names(&self, plant_id: &PlantId) -> Result<HashSet<String>, BridgeError> {
        let mut cursor = self
            .devices
            .clone_with_type::<DeviceRecord>()
            .find(doc! { "plant_id": plant_id.as_bson().clone() })
            .await?;

        let mut names = HashSet::new();
        while let Some(device) = cursor.try_next().await? {
            if let Some(name) = device.name {
                names.insert(name);
            }
        }
        Ok(names)
    }
}

#[async_trait]
impl PlantStore for MongoStore {
    async fn set_readings(
        &self,
        plant_id: &PlantId,
        reading: SensorReading,
    ) -> Result<WriteOutcome, BridgeError> {
        let id = plant_id.to_object_id()?;
        let update = doc! {
            "$set": {
                "temperature": reading.temperature,
                "humidity": reading.humidity,
                "soil_moisture": reading.soil_moisture,
            }
        };

        let result = self.plants.update_one(doc! { "_id": id }, update).await?;

        Ok(if result.matched_count == 0 {
            WriteOutcome::NotFound
        } else if result.modified_count == 0 {
            WriteOutcome::Unchanged
        } else {
            WriteOutcome::Updated
        })
    }
}
