//! Per-sensor CSV log store
//!
//! Each sensor gets `<dir>/<slug>.csv` with rows of
//! `time,sensor,temp,humidity,lux,tds,water_level`; absent measurements
//! leave their cell empty.

use habitat_shared::{Field, Record};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

/// File-friendly form of a sensor name: lowercase, runs of anything other
/// than letters and digits collapsed to `-`
pub fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if out.is_empty() {
        "unknown".into()
    } else {
        out
    }
}

/// Latest stored row of one sensor
#[derive(Debug, Clone, PartialEq)]
pub struct LatestRow {
    pub time: String,
    /// Display name when it has been seen since startup, the slug otherwise
    pub sensor: String,
    pub fields: Vec<(Field, f64)>,
}

/// Append-only CSV logs, one file per sensor
pub struct LogStore {
    dir: PathBuf,
    /// Serializes appends so rows never interleave
    write_lock: Mutex<()>,
    /// slug -> display name of every sensor that posted since startup
    labels: RwLock<HashMap<String, String>>,
}

impl LogStore {
    /// Open the store, creating the directory if needed
    pub async fn open(dir: PathBuf) -> io::Result<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
            labels: RwLock::new(HashMap::new()),
        })
    }

    fn path_for(&self, slug: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", slug))
    }

    /// Append one record; returns the sensor's slug
    pub async fn append(&self, record: &Record, time: &str) -> io::Result<String> {
        let slug = slug(&record.sensor);

        let mut line = format!("{},{}", time, slug);
        for field in Field::ALL {
            line.push(',');
            if let Some(value) = record.get(field) {
                line.push_str(&value.to_string());
            }
        }
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(&slug))
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        self.labels
            .write()
            .await
            .insert(slug.clone(), record.sensor.clone());

        Ok(slug)
    }

    /// Raw log of a sensor, `None` when nothing was stored yet
    pub async fn raw(&self, name: &str) -> io::Result<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(&slug(name))).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Most recent row of a sensor
    pub async fn latest(&self, name: &str) -> io::Result<Option<LatestRow>> {
        let text = match self.raw(name).await? {
            Some(text) => text,
            None => return Ok(None),
        };

        let Some(mut row) = text
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .and_then(parse_row)
        else {
            return Ok(None);
        };

        if let Some(label) = self.labels.read().await.get(&row.sensor) {
            row.sensor = label.clone();
        }
        Ok(Some(row))
    }
}

fn parse_row(line: &str) -> Option<LatestRow> {
    let mut cells = line.split(',');
    let time = cells.next()?.to_string();
    let sensor = cells.next()?.to_string();

    // Older rows may have fewer columns
    let fields = Field::ALL
        .into_iter()
        .zip(cells)
        .filter_map(|(field, cell)| cell.trim().parse::<f64>().ok().map(|v| (field, v)))
        .collect();

    Some(LatestRow {
        time,
        sensor,
        fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(sensor: &str) -> Record {
        Record {
            sensor: sensor.into(),
            temp: Some(72.3),
            humidity: Some(41.0),
            lux: None,
            tds: None,
            water_level: Some(80.0),
        }
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("Red Knee"), "red-knee");
        assert_eq!(slug("White Tree Frog Terrarium"), "white-tree-frog-terrarium");
        assert_eq!(slug("3D Printer"), "3d-printer");
        assert_eq!(slug("  Living   Room!! "), "living-room");
        assert_eq!(slug("../../etc/passwd"), "etc-passwd");
        assert_eq!(slug("!!!"), "unknown");
    }

    #[tokio::test]
    async fn test_append_and_latest() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::open(dir.path().join("logs")).await.unwrap();

        let slug = store
            .append(&record("Living Room"), "2025-01-01 10:00:00")
            .await
            .unwrap();
        assert_eq!(slug, "living-room");

        let mut second = record("Living Room");
        second.temp = Some(73.1);
        store.append(&second, "2025-01-01 10:00:10").await.unwrap();

        let raw = store.raw("Living Room").await.unwrap().unwrap();
        assert_eq!(
            raw.lines().next().unwrap(),
            "2025-01-01 10:00:00,living-room,72.3,41,,,80"
        );

        let latest = store.latest("living-room").await.unwrap().unwrap();
        assert_eq!(latest.time, "2025-01-01 10:00:10");
        assert_eq!(latest.sensor, "Living Room");
        assert_eq!(
            latest.fields,
            vec![
                (Field::Temperature, 73.1),
                (Field::Humidity, 41.0),
                (Field::WaterLevel, 80.0),
            ]
        );
    }

    #[tokio::test]
    async fn test_label_falls_back_to_slug_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = LogStore::open(dir.path().to_path_buf()).await.unwrap();
            store
                .append(&record("Red Knee"), "2025-01-01 10:00:00")
                .await
                .unwrap();
        }

        let reopened = LogStore::open(dir.path().to_path_buf()).await.unwrap();
        let latest = reopened.latest("red-knee").await.unwrap().unwrap();
        assert_eq!(latest.sensor, "red-knee");

        reopened
            .append(&record("Red Knee"), "2025-01-01 10:00:10")
            .await
            .unwrap();
        let latest = reopened.latest("Red Knee").await.unwrap().unwrap();
        assert_eq!(latest.sensor, "Red Knee");
    }

    #[tokio::test]
    async fn test_unknown_sensor() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::open(dir.path().to_path_buf()).await.unwrap();
        assert_eq!(store.raw("Bedroom").await.unwrap(), None);
        assert_eq!(store.latest("Bedroom").await.unwrap(), None);
    }

    #[test]
    fn test_parse_short_row() {
        let row = parse_row("2024-06-01 08:00:00,office,70.2,45.0").unwrap();
        assert_eq!(
            row.fields,
            vec![(Field::Temperature, 70.2), (Field::Humidity, 45.0)]
        );
    }
}
