//! Wire record codec
//!
//! A record is a flat JSON object:
//! ```text
//! {"sensor":"Office","temp":72.3,"humidity":41.0}
//! ```
//!
//! `sensor` is always present. Measurement keys appear in the fixed order
//! `temp`, `humidity`, `lux`, `tds`, `water_level`, and only when the
//! measurement was taken. Values carry one decimal digit.

use bytes::Bytes;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::sample::{Field, SensorSample};

/// Content type of an encoded record
pub const CONTENT_TYPE: &str = "application/json";

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Sample '{0}' has no measurements")]
    EmptySample(String),

    #[error("Record encode error: {0}")]
    Encode(serde_json::Error),

    #[error("Record decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Transport representation of one sensor sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub sensor: String,

    #[serde(default, skip_serializing_if = "Option::is_none", serialize_with = "one_decimal")]
    pub temp: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none", serialize_with = "one_decimal")]
    pub humidity: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none", serialize_with = "one_decimal")]
    pub lux: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none", serialize_with = "one_decimal")]
    pub tds: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none", serialize_with = "one_decimal")]
    pub water_level: Option<f64>,
}

impl Record {
    /// Build a record from a sample; a sample with no fields is rejected
    pub fn from_sample(sample: &SensorSample) -> Result<Self, RecordError> {
        if sample.is_empty() {
            return Err(RecordError::EmptySample(sample.name.clone()));
        }

        Ok(Self {
            sensor: sample.name.clone(),
            temp: sample.get(Field::Temperature),
            humidity: sample.get(Field::Humidity),
            lux: sample.get(Field::Lux),
            tds: sample.get(Field::Tds),
            water_level: sample.get(Field::WaterLevel),
        })
    }

    /// Value of a measurement, if present
    pub fn get(&self, field: Field) -> Option<f64> {
        match field {
            Field::Temperature => self.temp,
            Field::Humidity => self.humidity,
            Field::Lux => self.lux,
            Field::Tds => self.tds,
            Field::WaterLevel => self.water_level,
        }
    }

    /// Present measurements in record order
    pub fn fields(&self) -> impl Iterator<Item = (Field, f64)> + '_ {
        Field::ALL
            .into_iter()
            .filter_map(|field| self.get(field).map(|value| (field, value)))
    }
}

/// Round to one decimal digit
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn one_decimal<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => serializer.serialize_f64(round_one_decimal(*v)),
        None => serializer.serialize_none(),
    }
}

/// Encode a sample into a record body
pub fn encode(sample: &SensorSample) -> Result<Bytes, RecordError> {
    let record = Record::from_sample(sample)?;
    let body = serde_json::to_vec(&record).map_err(RecordError::Encode)?;
    Ok(Bytes::from(body))
}

/// Decode a record body
pub fn decode(buf: &[u8]) -> Result<Record, RecordError> {
    Ok(serde_json::from_slice(buf)?)
}
