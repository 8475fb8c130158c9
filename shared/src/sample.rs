//! Sensor samples and delivery outcomes

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A measurement a sensor can carry.
///
/// Variant order is the order fields appear in a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Temperature,
    Humidity,
    Lux,
    Tds,
    WaterLevel,
}

impl Field {
    /// All fields in record order
    pub const ALL: [Field; 5] = [
        Field::Temperature,
        Field::Humidity,
        Field::Lux,
        Field::Tds,
        Field::WaterLevel,
    ];

    /// Key used for this field on the wire
    pub fn wire_key(self) -> &'static str {
        match self {
            Field::Temperature => "temp",
            Field::Humidity => "humidity",
            Field::Lux => "lux",
            Field::Tds => "tds",
            Field::WaterLevel => "water_level",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Temperature => write!(f, "temperature"),
            Field::Humidity => write!(f, "humidity"),
            Field::Lux => write!(f, "lux"),
            Field::Tds => write!(f, "tds"),
            Field::WaterLevel => write!(f, "water_level"),
        }
    }
}

/// One reading of one named sensor, taken fresh each tick
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSample {
    pub name: String,
    fields: BTreeMap<Field, f64>,
}

impl SensorSample {
    /// Create a sample with no fields present
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder form of [`SensorSample::set`]
    pub fn with(mut self, field: Field, value: f64) -> Self {
        self.set(field, value);
        self
    }

    /// Mark a field as present with the given value
    pub fn set(&mut self, field: Field, value: f64) {
        self.fields.insert(field, value);
    }

    pub fn get(&self, field: Field) -> Option<f64> {
        self.fields.get(&field).copied()
    }

    /// Present fields in record order
    pub fn fields(&self) -> impl Iterator<Item = (Field, f64)> + '_ {
        self.fields.iter().map(|(f, v)| (*f, *v))
    }

    /// True when no field is present; such a sample is never transmitted
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

/// What happened to one sensor during one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub sample_name: String,
    /// Whether a request was actually sent
    pub attempted: bool,
    /// Status code returned by the collector, if a response arrived
    pub status_code: Option<u16>,
    pub succeeded: bool,
}

impl DeliveryOutcome {
    /// Delivery was not attempted (sensor unavailable or link down)
    pub fn skipped(sample_name: impl Into<String>) -> Self {
        Self {
            sample_name: sample_name.into(),
            attempted: false,
            status_code: None,
            succeeded: false,
        }
    }

    /// A response arrived; success only when it carries the accept code
    pub fn responded(sample_name: impl Into<String>, status_code: u16, accept: u16) -> Self {
        Self {
            sample_name: sample_name.into(),
            attempted: true,
            status_code: Some(status_code),
            succeeded: status_code == accept,
        }
    }

    /// The request was sent but no response came back (transport error, timeout)
    pub fn failed(sample_name: impl Into<String>) -> Self {
        Self {
            sample_name: sample_name.into(),
            attempted: true,
            status_code: None,
            succeeded: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_iterate_in_record_order() {
        let sample = SensorSample::new("Living Room")
            .with(Field::WaterLevel, 80.0)
            .with(Field::Temperature, 71.2)
            .with(Field::Tds, 310.0);

        let order: Vec<Field> = sample.fields().map(|(f, _)| f).collect();
        assert_eq!(order, vec![Field::Temperature, Field::Tds, Field::WaterLevel]);
        assert_eq!(sample.get(Field::Humidity), None);
    }

    #[test]
    fn test_empty_sample() {
        let sample = SensorSample::new("Bedroom");
        assert!(sample.is_empty());
        assert_eq!(sample.len(), 0);
    }

    #[test]
    fn test_outcome_constructors() {
        let skipped = DeliveryOutcome::skipped("Red Knee");
        assert!(!skipped.attempted);
        assert!(!skipped.succeeded);

        let ok = DeliveryOutcome::responded("Office", 200, 200);
        assert!(ok.succeeded);
        assert_eq!(ok.status_code, Some(200));

        let rejected = DeliveryOutcome::responded("Office", 500, 200);
        assert!(rejected.attempted);
        assert!(!rejected.succeeded);
        assert_eq!(rejected.status_code, Some(500));

        let lost = DeliveryOutcome::failed("Office");
        assert!(lost.attempted);
        assert_eq!(lost.status_code, None);
    }
}
