//! Status board: last outcome and last values per sensor

use super::StatusSink;
use async_trait::async_trait;
use habitat_shared::{DeliveryOutcome, Field, SensorSample};
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// What the board knows about one sensor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorStatus {
    pub name: String,
    pub last_outcome: Option<DeliveryOutcome>,
    pub last_values: Option<SensorSample>,
}

impl SensorStatus {
    /// Short delivery label as shown on the device display
    pub fn label(&self) -> &'static str {
        match &self.last_outcome {
            Some(o) if o.succeeded => "POSTED!",
            Some(o) if o.attempted => "FAILED!",
            Some(_) => "SKIPPED",
            None => "-",
        }
    }
}

/// In-memory status display, optionally mirrored to a file
pub struct StatusBoard {
    entries: RwLock<Vec<SensorStatus>>,
    file: Option<PathBuf>,
}

impl StatusBoard {
    /// Create a board listing `names` in display order
    pub fn new(names: impl IntoIterator<Item = String>, file: Option<PathBuf>) -> Self {
        let entries = names
            .into_iter()
            .map(|name| SensorStatus {
                name,
                ..Default::default()
            })
            .collect();

        Self {
            entries: RwLock::new(entries),
            file,
        }
    }

    /// Current status of one sensor
    pub async fn get(&self, name: &str) -> Option<SensorStatus> {
        self.entries
            .read()
            .await
            .iter()
            .find(|e| e.name == name)
            .cloned()
    }

    /// Render the board as display lines
    pub async fn render(&self) -> Vec<String> {
        let entries = self.entries.read().await;
        let mut lines = Vec::new();

        for entry in entries.iter() {
            lines.push(entry.name.clone());
            if let Some(sample) = &entry.last_values {
                for (field, value) in sample.fields() {
                    lines.push(format_value(field, value));
                }
            }
            lines.push(entry.label().to_string());
        }

        lines
    }

    async fn entry_mut<F>(&self, name: &str, update: F)
    where
        F: FnOnce(&mut SensorStatus),
    {
        let mut entries = self.entries.write().await;
        match entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => update(entry),
            None => {
                let mut entry = SensorStatus {
                    name: name.to_string(),
                    ..Default::default()
                };
                update(&mut entry);
                entries.push(entry);
            }
        }
    }
}

fn format_value(field: Field, value: f64) -> String {
    match field {
        Field::Temperature => format!("Temp: {:.1}F", value),
        Field::Humidity => format!("Hum : {:.1}%", value),
        Field::Lux => format!("Lux : {:.1} lx", value),
        Field::Tds => format!("TDS : {:.1} ppm", value),
        Field::WaterLevel => format!("Level: {:.1}%", value),
    }
}

#[async_trait]
impl StatusSink for StatusBoard {
    async fn on_outcome(&self, outcome: &DeliveryOutcome) {
        self.entry_mut(&outcome.sample_name, |entry| {
            entry.last_outcome = Some(outcome.clone());
        })
        .await;

        let status = match outcome.status_code {
            Some(code) => code.to_string(),
            None => "-".into(),
        };
        info!(
            "[STATUS] {}: attempted={} succeeded={} status={}",
            outcome.sample_name, outcome.attempted, outcome.succeeded, status
        );
    }

    async fn on_samples(&self, samples: &[SensorSample]) {
        for sample in samples {
            self.entry_mut(&sample.name, |entry| {
                entry.last_values = Some(sample.clone());
            })
            .await;
        }

        if let Some(path) = &self.file {
            let mut text = self.render().await.join("\n");
            text.push('\n');
            if let Err(e) = tokio::fs::write(path, text).await {
                warn!("[STATUS] Cannot write {}: {}", path.display(), e);
            }
        }
    }
}
