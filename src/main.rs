mod binding;
mod config;
mod db;
mod error;
mod mqtt;
mod persist;
mod ports;
mod reading_cache;
mod relay;
mod sensors;
mod serial;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::Result;
use tokio::{signal, sync::{mpsc, oneshot}};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::{
    binding::{BindingState, BindingTracker},
    config::Config,
    db::MongoStore,
    mqtt::MqttBus,
    persist::PersistService,
    reading_cache::ReadingCache,
    relay::CareRelay,
    sensors::SensorService,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present; env vars may also be set externally
    let _ = dotenvy::dotenv();

    // Initialise tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    // Load config
    let config = Config::from_env()?;

    // Connect to MongoDB
    let client = db::connect(&config.mongodb_uri).await?;
    let store = MongoStore::new(&client, &config);
    info!(database = %config.mongodb_database, "Database ready");

    // Serial link to the sensor board
    let (serial_link, serial_reader) = serial::open(&config.serial_port, config.serial_baud_rate)?;

    // Shared state: latest reading and the active plant binding
    let cache = ReadingCache::new();
    let binding = BindingState::new();

    let cancel = CancellationToken::new();
    let mut tasks = Vec::new();

    // Serial lines → reading cache
    {
        let (tx, rx) = mpsc::channel(64);
        serial::spawn_reader(serial_reader, tx);
        let service = SensorService::new(cache.clone());
        tasks.push(tokio::spawn(service.run(rx, cancel.clone())));
    }

    // Device registry changes → active binding
    {
        let events = store.watch_devices().await?;
        let tracker = BindingTracker::new(store.clone(), binding.clone());
        tasks.push(tokio::spawn(tracker.run(events, cancel.clone())));
    }

    // Timer → plant record
    {
        let service = PersistService::new(
            store.clone(),
            cache.clone(),
            binding.clone(),
            config.persist_interval_secs,
        );
        tasks.push(tokio::spawn(service.run(cancel.clone())));
    }

    // Plant changes → bus, bus → serial
    {
        let (mqtt_client, eventloop) = mqtt::client(&config);
        let relay = Arc::new(CareRelay::new(
            MqttBus::new(mqtt_client.clone()),
            serial_link,
            config.care_topic.clone(),
        ));
        let (connected_tx, connected_rx) = oneshot::channel();
        let (messages_tx, messages_rx) = mpsc::channel(32);

        tasks.push(tokio::spawn(mqtt::drive(
            eventloop,
            mqtt_client,
            relay.topic().to_owned(),
            messages_tx,
            connected_tx,
            cancel.clone(),
        )));

        {
            let relay = Arc::clone(&relay);
            let cancel = cancel.clone();
            tasks.push(tokio::spawn(async move {
                relay.forward_to_serial(messages_rx, cancel).await;
            }));
        }

        let store = store.clone();
        let cancel = cancel.clone();
        tasks.push(tokio::spawn(async move {
            // The plant watch starts on the first successful bus connection.
            if connected_rx.await.is_err() {
                return;
            }
            match store.watch_plants().await {
                Ok(events) => relay.watch_plants(events, cancel).await,
                Err(e) => error!(error = %e, "Failed to watch plant records"),
            }
        }));
    }

    shutdown_signal().await;
    cancel.cancel();

    for task in tasks {
        if let Err(e) = task.await {
            error!(error = %e, "Task ended abnormally");
        }
    }
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
