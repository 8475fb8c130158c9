//! Node configuration
//!
//! Everything the core needs (credentials, collector endpoint, sensor
//! mapping, timing) is injected from here. The file format is TOML; every
//! section falls back to its default when omitted.

use anyhow::{anyhow, bail, Context, Result};
use habitat_shared::{timing, Field};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level node configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Label for this node in logs
    pub device_id: String,
    pub collector: CollectorConfig,
    pub link: LinkConfig,
    pub timing: TimingConfig,
    pub restart: RestartConfig,
    pub source: SourceConfig,
    pub status: StatusConfig,
    /// Sensors in the order they are visited each tick
    pub sensors: Vec<SensorConfig>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            device_id: "habitat-node".into(),
            collector: CollectorConfig::default(),
            link: LinkConfig::default(),
            timing: TimingConfig::default(),
            restart: RestartConfig::default(),
            source: SourceConfig::default(),
            status: StatusConfig::default(),
            sensors: vec![SensorConfig::climate("Office Sensor", "office")],
        }
    }
}

impl AgentConfig {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = Self::parse(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the agent cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.sensors.is_empty() {
            bail!("no sensors configured");
        }

        let mut names = HashSet::new();
        for sensor in &self.sensors {
            if !names.insert(sensor.name.as_str()) {
                bail!("duplicate sensor name '{}'", sensor.name);
            }
            if sensor.channels.is_empty() {
                bail!("sensor '{}' has no channels", sensor.name);
            }
            for (field, channel) in &sensor.channels {
                channel
                    .validate()
                    .with_context(|| format!("sensor '{}' {}", sensor.name, field))?;
            }
        }

        self.timing.validate()?;

        reqwest::Url::parse(&self.collector.endpoint)
            .map_err(|e| anyhow!("invalid collector endpoint '{}': {}", self.collector.endpoint, e))?;

        if let LinkConfig::Interface(iface) = &self.link {
            if iface.associate_command.is_empty() {
                bail!("link.associate_command must not be empty");
            }
        }

        Ok(())
    }
}

/// Where and how records are delivered
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Collector URL records are posted to
    pub endpoint: String,
    /// Status code that means "accepted"
    pub accept_status: u16,
    /// Upper bound for one request/response round-trip
    pub request_timeout_ms: u64,
    /// Skip TLS certificate validation
    pub accept_invalid_certs: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:5020/api/sensor".into(),
            accept_status: timing::COLLECTOR_OK,
            request_timeout_ms: timing::REQUEST_TIMEOUT_MS,
            accept_invalid_certs: false,
        }
    }
}

impl CollectorConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// How the link is observed and associated
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinkConfig {
    /// Network interface managed through sysfs and an association command
    Interface(InterfaceLinkConfig),
    /// Reachability probe against a TCP address (development, wired nodes)
    Probe(ProbeLinkConfig),
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig::Probe(ProbeLinkConfig::default())
    }
}

/// Interface link configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InterfaceLinkConfig {
    /// Interface name, e.g. `wlan0`
    pub interface: String,
    /// Where interface state files live
    pub sysfs_root: PathBuf,
    /// Network credentials, substituted into the association command
    pub ssid: String,
    pub password: String,
    /// Command that starts association; `{interface}`, `{ssid}` and
    /// `{password}` are substituted
    pub associate_command: Vec<String>,
}

impl Default for InterfaceLinkConfig {
    fn default() -> Self {
        Self {
            interface: "wlan0".into(),
            sysfs_root: PathBuf::from("/sys/class/net"),
            ssid: String::new(),
            password: String::new(),
            associate_command: vec![
                "nmcli".into(),
                "device".into(),
                "wifi".into(),
                "connect".into(),
                "{ssid}".into(),
                "password".into(),
                "{password}".into(),
                "ifname".into(),
                "{interface}".into(),
            ],
        }
    }
}

/// Probe link configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProbeLinkConfig {
    /// `host:port` that must be reachable for the link to count as up
    pub address: String,
    pub probe_timeout_ms: u64,
}

impl Default for ProbeLinkConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:5020".into(),
            probe_timeout_ms: 1_000,
        }
    }
}

/// Timing parameters, all in milliseconds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub connect_timeout_ms: u64,
    pub recover_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub tick_interval_ms: u64,
    pub sensor_pause_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: timing::CONNECT_TIMEOUT_MS,
            recover_timeout_ms: timing::RECOVER_TIMEOUT_MS,
            poll_interval_ms: timing::POLL_INTERVAL_MS,
            tick_interval_ms: timing::TICK_INTERVAL_MS,
            sensor_pause_ms: timing::SENSOR_PAUSE_MS,
        }
    }
}

impl TimingConfig {
    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("recover_timeout_ms", self.recover_timeout_ms),
            ("poll_interval_ms", self.poll_interval_ms),
            ("tick_interval_ms", self.tick_interval_ms),
        ] {
            if value == 0 {
                bail!("timing.{} must be greater than zero", name);
            }
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn recover_timeout(&self) -> Duration {
        Duration::from_millis(self.recover_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn sensor_pause(&self) -> Duration {
        Duration::from_millis(self.sensor_pause_ms)
    }
}

/// Restart escalation
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RestartConfig {
    /// Exit code handed to the supervisor when the node gives up on the link
    pub exit_code: i32,
}

impl Default for RestartConfig {
    fn default() -> Self {
        // EX_TEMPFAIL
        Self { exit_code: 75 }
    }
}

/// Where raw readings come from
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Generated values for bench runs without hardware
    #[default]
    Simulated,
    /// One file per channel holding a number (sysfs / IIO style)
    File { root: PathBuf },
}

/// Local status output
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// File the status board is rendered to after every tick
    pub file: Option<PathBuf>,
}

/// One named sensor and the channels it is assembled from
#[derive(Debug, Clone, Deserialize)]
pub struct SensorConfig {
    pub name: String,
    /// Channels keyed by the field they fill
    pub channels: BTreeMap<Field, ChannelConfig>,
}

impl SensorConfig {
    /// Temperature + humidity sensor reading `<prefix>_temperature` and
    /// `<prefix>_humidity`, reporting Fahrenheit
    pub fn climate(name: &str, prefix: &str) -> Self {
        let mut channels = BTreeMap::new();
        channels.insert(
            Field::Temperature,
            ChannelConfig {
                conversion: Conversion::CelsiusToFahrenheit,
                ..ChannelConfig::new(format!("{}_temperature", prefix))
            },
        );
        channels.insert(
            Field::Humidity,
            ChannelConfig::new(format!("{}_humidity", prefix)),
        );
        Self {
            name: name.into(),
            channels,
        }
    }
}

/// One measurement channel of a sensor
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    /// Channel id handed to the reading source
    pub channel: String,
    #[serde(default)]
    pub conversion: Conversion,
    /// Multiplier applied to the raw value before conversion
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Converted values outside `[min, max]` are treated as invalid
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    /// An invalid required channel makes the whole sensor unavailable;
    /// defaults to true for temperature and humidity
    #[serde(default)]
    pub required: Option<bool>,
}

fn default_scale() -> f64 {
    1.0
}

impl ChannelConfig {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            conversion: Conversion::None,
            scale: 1.0,
            min: None,
            max: None,
            required: None,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.channel.trim().is_empty() {
            bail!("channel id must not be empty");
        }
        if !self.scale.is_finite() || self.scale == 0.0 {
            bail!("scale must be finite and non-zero, got {}", self.scale);
        }
        for (name, bound) in [("min", self.min), ("max", self.max)] {
            if bound.is_some_and(|b| !b.is_finite()) {
                bail!("{} must be finite", name);
            }
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                bail!("min {} is above max {}", min, max);
            }
        }
        self.conversion.validate()
    }

    /// Whether an invalid value on this channel drops the whole sensor
    pub fn is_required(&self, field: Field) -> bool {
        self.required
            .unwrap_or(matches!(field, Field::Temperature | Field::Humidity))
    }
}

/// Conversion from a raw channel value to the reported unit
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Conversion {
    #[default]
    None,
    CelsiusToFahrenheit,
    /// Raw ADC count to TDS in ppm (CQRobot probe curve)
    TdsFromAdc { vref: f64, adc_max: f64 },
    /// Ultrasonic distance in cm to fill percentage
    WaterLevelFromDistance { tank_full_cm: f64 },
}

impl Conversion {
    fn validate(&self) -> Result<()> {
        match *self {
            Conversion::None | Conversion::CelsiusToFahrenheit => {}
            Conversion::TdsFromAdc { vref, adc_max } => {
                if !(vref.is_finite() && vref > 0.0) {
                    bail!("tds_from_adc.vref must be positive, got {}", vref);
                }
                if !(adc_max.is_finite() && adc_max > 0.0) {
                    bail!("tds_from_adc.adc_max must be positive, got {}", adc_max);
                }
            }
            Conversion::WaterLevelFromDistance { tank_full_cm } => {
                if !(tank_full_cm.is_finite() && tank_full_cm > 0.0) {
                    bail!(
                        "water_level_from_distance.tank_full_cm must be positive, got {}",
                        tank_full_cm
                    );
                }
            }
        }
        Ok(())
    }
}
