use anyhow::{bail, Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub mongodb_uri: String,
    pub mongodb_database: String,
    /// Device registry: one document per sensor-to-plant attachment.
    pub devices_collection: String,
    /// Plant records receiving the periodic readings.
    pub plants_collection: String,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_client_id: String,
    /// Topic carrying the single-character care command (`"1"` / `"0"`).
    pub care_topic: String,
    pub serial_port: String,
    pub serial_baud_rate: u32,
    /// Persist interval in seconds.
    pub persist_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            mongodb_uri: required("MONGODB_URI")?,
            mongodb_database: optional("MONGODB_DATABASE", "PlantHealthcare"),
            devices_collection: optional("DEVICES_COLLECTION", "userdevices"),
            plants_collection: optional("PLANTS_COLLECTION", "userplants"),
            mqtt_host: optional("MQTT_HOST", "localhost"),
            mqtt_port: optional("MQTT_PORT", "1883")
                .parse()
                .context("MQTT_PORT must be a valid port number")?,
            mqtt_client_id: optional("MQTT_CLIENT_ID", "plant-care-bridge"),
            care_topic: optional("CARE_TOPIC", "careNeeded"),
            serial_port: optional("SERIAL_PORT", "/dev/ttyUSB0"),
            serial_baud_rate: optional("SERIAL_BAUD_RATE", "9600")
                .parse()
                .context("SERIAL_BAUD_RATE must be a positive integer")?,
            persist_interval_secs: optional("PERSIST_INTERVAL_SECS", "10")
                .parse()
                .context("PERSIST_INTERVAL_SECS must be a positive integer")?,
        };

        if config.persist_interval_secs == 0 {
            bail!("PERSIST_INTERVAL_SECS must be greater than zero");
        }
        Ok(config)
    }
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required env var: {key}"))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}
