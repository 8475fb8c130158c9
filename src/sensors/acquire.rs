//! Assembling one sensor's sample from its channels

use super::ReadingSource;
use crate::config::{ChannelConfig, Conversion, SensorConfig};
use habitat_shared::{Field, SensorSample};
use tracing::debug;

/// Result of acquiring one sensor for one tick
#[derive(Debug, Clone, PartialEq)]
pub enum Acquisition {
    /// At least one field is present
    Ready(SensorSample),
    /// A required channel had no data
    Unavailable { field: Field, channel: String },
    /// Every channel was optional and none had data
    Empty,
}

/// Convert a raw value to the reported unit
pub fn convert(conversion: Conversion, value: f64) -> f64 {
    match conversion {
        Conversion::None => value,
        Conversion::CelsiusToFahrenheit => value * 1.8 + 32.0,
        Conversion::TdsFromAdc { vref, adc_max } => {
            let v = value * vref / adc_max;
            (133.42 * v * v * v - 255.86 * v * v + 857.39 * v) * 0.5
        }
        Conversion::WaterLevelFromDistance { tank_full_cm } => {
            (100.0 - (value / tank_full_cm) * 100.0).clamp(0.0, 100.0)
        }
    }
}

/// Read and convert one channel; `None` when there is no usable value
async fn read_channel(channel: &ChannelConfig, source: &dyn ReadingSource) -> Option<f64> {
    let reading = source.read(&channel.channel).await;
    if !reading.valid {
        return None;
    }

    let value = convert(channel.conversion, reading.value * channel.scale);
    let in_bounds = channel.min.map_or(true, |min| value >= min)
        && channel.max.map_or(true, |max| value <= max);

    (value.is_finite() && in_bounds).then_some(value)
}

/// Acquire a fresh sample for `sensor`
pub async fn acquire(sensor: &SensorConfig, source: &dyn ReadingSource) -> Acquisition {
    let mut sample = SensorSample::new(sensor.name.clone());

    for (&field, channel) in &sensor.channels {
        match read_channel(channel, source).await {
            Some(value) => sample.set(field, value),
            None if channel.is_required(field) => {
                return Acquisition::Unavailable {
                    field,
                    channel: channel.channel.clone(),
                };
            }
            None => {
                debug!("[SENSOR] {}: no {} this tick, omitting", sensor.name, field);
            }
        }
    }

    if sample.is_empty() {
        Acquisition::Empty
    } else {
        Acquisition::Ready(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::Reading;
    use async_trait::async_trait;
    use std::collections::{BTreeMap, HashMap};

    struct MapSource(HashMap<&'static str, f64>);

    #[async_trait]
    impl ReadingSource for MapSource {
        async fn read(&self, channel: &str) -> Reading {
            self.0
                .get(channel)
                .map(|v| Reading::new(*v))
                .unwrap_or_else(Reading::invalid)
        }
    }

    fn living_room() -> SensorConfig {
        let mut channels = BTreeMap::new();
        channels.insert(
            Field::Temperature,
            ChannelConfig {
                conversion: Conversion::CelsiusToFahrenheit,
                ..ChannelConfig::new("dht3_temperature")
            },
        );
        channels.insert(Field::Humidity, ChannelConfig::new("dht3_humidity"));
        channels.insert(
            Field::Tds,
            ChannelConfig {
                conversion: Conversion::TdsFromAdc {
                    vref: 3.3,
                    adc_max: 4095.0,
                },
                ..ChannelConfig::new("adc_tds")
            },
        );
        channels.insert(
            Field::WaterLevel,
            ChannelConfig {
                conversion: Conversion::WaterLevelFromDistance { tank_full_cm: 15.0 },
                ..ChannelConfig::new("sonar_cm")
            },
        );
        SensorConfig {
            name: "Living Room".into(),
            channels,
        }
    }

    #[test]
    fn test_conversions() {
        assert!((convert(Conversion::CelsiusToFahrenheit, 22.5) - 72.5).abs() < 1e-9);
        assert_eq!(convert(Conversion::None, 3.0), 3.0);

        // Full-scale ADC is 3.3V
        let tds = convert(
            Conversion::TdsFromAdc {
                vref: 3.3,
                adc_max: 4095.0,
            },
            4095.0,
        );
        let expected = (133.42 * 3.3f64.powi(3) - 255.86 * 3.3f64.powi(2) + 857.39 * 3.3) * 0.5;
        assert!((tds - expected).abs() < 1e-6);

        let level = |d| convert(Conversion::WaterLevelFromDistance { tank_full_cm: 15.0 }, d);
        assert_eq!(level(0.0), 100.0);
        assert!((level(3.0) - 80.0).abs() < 1e-9);
        assert_eq!(level(30.0), 0.0);
    }

    #[tokio::test]
    async fn test_all_channels_present() {
        let source = MapSource(HashMap::from([
            ("dht3_temperature", 22.5),
            ("dht3_humidity", 41.0),
            ("adc_tds", 0.0),
            ("sonar_cm", 3.0),
        ]));

        match acquire(&living_room(), &source).await {
            Acquisition::Ready(sample) => {
                assert_eq!(sample.name, "Living Room");
                assert_eq!(sample.len(), 4);
                assert!((sample.get(Field::Temperature).unwrap() - 72.5).abs() < 1e-9);
                assert_eq!(sample.get(Field::Humidity), Some(41.0));
                assert_eq!(sample.get(Field::Tds), Some(0.0));
                assert!((sample.get(Field::WaterLevel).unwrap() - 80.0).abs() < 1e-9);
            }
            other => panic!("expected sample, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_optional_channel_omitted() {
        let source = MapSource(HashMap::from([
            ("dht3_temperature", 22.5),
            ("dht3_humidity", 41.0),
        ]));

        match acquire(&living_room(), &source).await {
            Acquisition::Ready(sample) => {
                assert_eq!(sample.len(), 2);
                assert_eq!(sample.get(Field::Tds), None);
                assert_eq!(sample.get(Field::WaterLevel), None);
            }
            other => panic!("expected sample, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_required_channel_missing() {
        let source = MapSource(HashMap::from([
            ("dht3_temperature", f64::NAN),
            ("dht3_humidity", 41.0),
            ("adc_tds", 1200.0),
        ]));

        assert_eq!(
            acquire(&living_room(), &source).await,
            Acquisition::Unavailable {
                field: Field::Temperature,
                channel: "dht3_temperature".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_out_of_bounds_is_invalid() {
        let mut channels = BTreeMap::new();
        channels.insert(
            Field::Lux,
            ChannelConfig {
                min: Some(0.0),
                ..ChannelConfig::new("bh1750_23")
            },
        );
        let plant_tank = SensorConfig {
            name: "Plant Tank".into(),
            channels,
        };

        // The light sensor reports -1 on a failed read
        let source = MapSource(HashMap::from([("bh1750_23", -1.0)]));
        assert_eq!(acquire(&plant_tank, &source).await, Acquisition::Empty);

        let source = MapSource(HashMap::from([("bh1750_23", 12.5)]));
        assert!(matches!(
            acquire(&plant_tank, &source).await,
            Acquisition::Ready(sample) if sample.get(Field::Lux) == Some(12.5)
        ));
    }

    #[tokio::test]
    async fn test_scale_applied_before_conversion() {
        let mut channels = BTreeMap::new();
        channels.insert(
            Field::Temperature,
            ChannelConfig {
                scale: 0.001,
                conversion: Conversion::CelsiusToFahrenheit,
                ..ChannelConfig::new("in_temp_input")
            },
        );
        let sensor = SensorConfig {
            name: "Office".into(),
            channels,
        };

        // IIO reports millidegrees
        let source = MapSource(HashMap::from([("in_temp_input", 22500.0)]));
        match acquire(&sensor, &source).await {
            Acquisition::Ready(sample) => {
                assert!((sample.get(Field::Temperature).unwrap() - 72.5).abs() < 1e-9)
            }
            other => panic!("expected sample, got {:?}", other),
        }
    }
}
