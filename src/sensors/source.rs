//! Reading source implementations

use super::{Reading, ReadingSource};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;

/// Reads one number per channel from `<root>/<channel>`
///
/// Matches the sysfs / IIO layout where every channel is a small text file.
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl ReadingSource for FileSource {
    async fn read(&self, channel: &str) -> Reading {
        let path = self.root.join(channel);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) => {
                debug!("[SENSOR] {}: {}", path.display(), e);
                return Reading::invalid();
            }
        };

        match text.trim().parse::<f64>() {
            Ok(value) => Reading::new(value),
            Err(e) => {
                debug!("[SENSOR] {}: unparsable '{}': {}", path.display(), text.trim(), e);
                Reading::invalid()
            }
        }
    }
}

/// Generates slowly drifting values for bench runs without hardware
pub struct SimulatedSource {
    /// Reads served per channel
    counters: Mutex<HashMap<String, u64>>,
}

impl SimulatedSource {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
        }
    }

    fn base_for(channel: &str) -> (f64, f64) {
        let name = channel.to_ascii_lowercase();
        if name.contains("temp") {
            (24.0, 1.5)
        } else if name.contains("hum") {
            (55.0, 8.0)
        } else if name.contains("lux") || name.contains("light") || name.contains("bh1750") {
            (120.0, 60.0)
        } else if name.contains("tds") {
            (1400.0, 40.0)
        } else if name.contains("sonar") || name.contains("distance") || name.contains("level") {
            (4.0, 1.0)
        } else {
            (10.0, 2.0)
        }
    }
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReadingSource for SimulatedSource {
    async fn read(&self, channel: &str) -> Reading {
        let n = {
            let mut counters = match self.counters.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let counter = counters.entry(channel.to_string()).or_insert(0);
            *counter += 1;
            *counter
        };

        // Per-channel phase keeps channels from moving in lockstep
        let phase = channel.bytes().map(u64::from).sum::<u64>() as f64;
        let (base, swing) = Self::base_for(channel);
        Reading::new(base + swing * ((n as f64 + phase) / 12.0).sin())
    }
}
