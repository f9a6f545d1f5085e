use std::{
    io::{self, BufRead, BufReader, Write},
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serialport::SerialPort;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error, info, warn};

use crate::{error::BridgeError, ports::SerialSink};

/// Read timeout of the port; bounds how long the reader takes to notice
/// shutdown.
const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Writing half of the sensor board connection.
#[derive(Clone)]
pub struct SerialLink {
    port: Arc<Mutex<Box<dyn SerialPort>>>,
}

/// Open `path` and return the writer plus a cloned handle for the reader.
pub fn open(path: &str, baud_rate: u32) -> Result<(SerialLink, Box<dyn SerialPort>)> {
    let port = serialport::new(path, baud_rate)
        .timeout(READ_TIMEOUT)
        .open()
        .with_context(|| format!("failed to open serial port {path}"))?;
    let reader = port
        .try_clone()
        .with_context(|| format!("failed to clone serial port {path}"))?;
    info!(path = %path, baud_rate, "Serial port opened");

    Ok((
        SerialLink {
            port: Arc::new(Mutex::new(port)),
        },
        reader,
    ))
}

#[async_trait]
impl SerialSink for SerialLink {
    async fn write_text(&self, payload: &str) -> Result<(), BridgeError> {
        let port = Arc::clone(&self.port);
        let bytes = payload.as_bytes().to_vec();

        tokio::task::spawn_blocking(move || {
            let mut port = port.lock().map_err(|_| BridgeError::PortPoisoned)?;
            port.write_all(&bytes)?;
            port.flush()?;
            Ok(())
        })
        .await?
    }
}

/// Read newline-delimited lines from `reader` on a blocking thread and send
/// them to `lines`.
///
/// The thread exits when the receiver is dropped, at end of stream, or on a
/// read error other than a timeout.
pub fn spawn_reader<R>(reader: R, lines: mpsc::Sender<String>) -> JoinHandle<()>
where
    R: io::Read + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();

        loop {
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => {
                    warn!("Serial port reached end of stream");
                    break;
                }
                Ok(_) if buf.ends_with(b"\n") => {
                    let line = String::from_utf8_lossy(&buf).into_owned();
                    buf.clear();
                    if lines.blocking_send(line).is_err() {
                        break;
                    }
                }
                // Partial line at end of stream; the next read returns 0.
                Ok(_) => {}
                Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::Interrupted) => {
                    if lines.is_closed() {
                        break;
                    }
                }
                Err(e) => {
                    error!(error = %e, "Serial read failed");
                    break;
                }
            }
        }

        if !buf.is_empty() {
            debug!(bytes = buf.len(), "Discarding incomplete serial line");
        }
        info!("Serial reader stopped");
    })
}
