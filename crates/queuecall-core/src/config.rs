//! Configuration loading and typed config structures for QueueCall clients.
//!
//! The canonical configuration lives in `queuecall-config.yaml` next to the
//! binary. Every section and field has a default, so an empty file (or no
//! file at all) yields a working single-process display.

use std::path::{Path, PathBuf};

use queuecall_types::{BroadcastEventType, CONTROL_ALERTS, ClinicId, ClinicState};
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The parsed configuration is inconsistent.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level client configuration, mirroring `queuecall-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueueConfig {
    /// What this client is and what it watches.
    #[serde(default)]
    pub client: ClientConfig,

    /// Audio asset location and naming.
    #[serde(default)]
    pub audio: AudioConfig,

    /// Broadcast bus settings.
    #[serde(default)]
    pub bus: BusConfig,

    /// Clinic store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Turn prediction tuning.
    #[serde(default)]
    pub predictor: PredictorConfig,

    /// Infrastructure connection strings.
    #[serde(default)]
    pub infrastructure: InfrastructureConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl QueueConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values for infrastructure URLs:
    /// - `NATS_URL` overrides `infrastructure.nats_url`
    /// - `DRAGONFLY_URL` overrides `infrastructure.dragonfly_url`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if the sections contradict each other.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if the sections contradict each other.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.infrastructure.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.client.role == ClientRole::Patient && self.client.tracking.is_none() {
            return Err(ConfigError::Invalid(
                "client.role is patient but client.tracking is not set".to_owned(),
            ));
        }
        if !(0.0..=1.0).contains(&self.predictor.pace_smoothing) {
            return Err(ConfigError::Invalid(format!(
                "predictor.pace_smoothing must be within 0.0..=1.0, got {}",
                self.predictor.pace_smoothing
            )));
        }
        Ok(())
    }
}

/// The kind of client a process runs as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientRole {
    /// Waiting-room screen: announces calls and plays broadcasts.
    #[default]
    Display,
    /// Operator console: announces calls like a display.
    Control,
    /// A patient's own device: tracks one ticket, nothing else.
    Patient,
}

impl ClientRole {
    /// Whether this role plays ticket call-outs and broadcast audio.
    pub const fn announces_calls(self) -> bool {
        matches!(self, Self::Display | Self::Control)
    }

    /// Whether this role enters emergency mode.
    pub const fn honors_emergencies(self) -> bool {
        matches!(self, Self::Display | Self::Control)
    }

    /// Whether this role drives the video player.
    pub const fn plays_video(self) -> bool {
        matches!(self, Self::Display)
    }
}

/// Client identity and watch list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    /// Role of this client.
    #[serde(default)]
    pub role: ClientRole,

    /// Clinics this client shows and announces.
    #[serde(default)]
    pub clinics: Vec<ClinicId>,

    /// Ticket to track when running as a patient.
    #[serde(default)]
    pub tracking: Option<TrackingConfig>,
}

/// A patient's held ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TrackingConfig {
    /// Clinic the ticket was issued for.
    pub clinic_id: ClinicId,
    /// The held ticket number.
    pub ticket_number: u32,
}

/// Audio asset configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AudioConfig {
    /// Directory holding all clips.
    #[serde(default = "default_asset_dir")]
    pub asset_dir: PathBuf,

    /// Extension of numbered clips (`7.mp3`, `clinic3.mp3`).
    #[serde(default = "default_extension")]
    pub extension: String,

    /// File name of the attention chime.
    #[serde(default = "default_ding_file")]
    pub ding_file: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            asset_dir: default_asset_dir(),
            extension: default_extension(),
            ding_file: default_ding_file(),
        }
    }
}

/// Which broadcast transport to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// In-process only.
    #[default]
    Local,
    /// NATS at `infrastructure.nats_url`.
    Nats,
}

/// Broadcast bus configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BusConfig {
    /// Channel carrying operator alerts.
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Transport backend.
    #[serde(default)]
    pub transport: TransportKind,

    /// NATS subject prefix.
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,

    /// Event types this client ignores entirely.
    #[serde(default)]
    pub muted_events: Vec<BroadcastEventType>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            transport: TransportKind::default(),
            subject_prefix: default_subject_prefix(),
            muted_events: Vec::new(),
        }
    }
}

/// Which store backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// In-process store seeded from `store.seed`.
    #[default]
    Memory,
    /// `Dragonfly` at `infrastructure.dragonfly_url`.
    Dragonfly,
}

/// A clinic to provision in the in-memory store at startup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedClinic {
    /// Clinic id.
    pub clinic_id: ClinicId,
    /// Display name.
    pub display_name: String,
    /// Room number.
    pub clinic_number: u32,
}

impl SeedClinic {
    /// Fresh state for this clinic.
    pub fn to_state(&self) -> ClinicState {
        ClinicState::new(self.clinic_id, self.display_name.clone(), self.clinic_number)
    }
}

/// Clinic store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    /// Store backend.
    #[serde(default)]
    pub backend: StoreBackend,

    /// How often each watched clinic is polled.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Clinics provisioned in the memory backend.
    #[serde(default)]
    pub seed: Vec<SeedClinic>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            poll_interval_ms: default_poll_interval_ms(),
            seed: Vec::new(),
        }
    }
}

/// Turn prediction tuning.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PredictorConfig {
    /// Remaining turns at or below which the patient is "approaching".
    #[serde(default = "default_approaching_threshold")]
    pub approaching_threshold: u32,

    /// Weight of the newest sample in the call pace average (0.0 to 1.0).
    #[serde(default = "default_pace_smoothing")]
    pub pace_smoothing: f64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            approaching_threshold: default_approaching_threshold(),
            pace_smoothing: default_pace_smoothing(),
        }
    }
}

/// Infrastructure connection strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InfrastructureConfig {
    /// NATS messaging URL.
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// Dragonfly (Redis-compatible) URL.
    #[serde(default = "default_dragonfly_url")]
    pub dragonfly_url: String,
}

impl InfrastructureConfig {
    /// Override infrastructure URLs with environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("NATS_URL") {
            self.nats_url = val;
        }
        if let Ok(val) = std::env::var("DRAGONFLY_URL") {
            self.dragonfly_url = val;
        }
    }
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            nats_url: default_nats_url(),
            dragonfly_url: default_dragonfly_url(),
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_asset_dir() -> PathBuf {
    PathBuf::from("assets/audio")
}

fn default_extension() -> String {
    String::from("mp3")
}

fn default_ding_file() -> String {
    String::from("ding.mp3")
}

fn default_channel() -> String {
    String::from(CONTROL_ALERTS)
}

fn default_subject_prefix() -> String {
    String::from("queuecall")
}

const fn default_poll_interval_ms() -> u64 {
    1000
}

const fn default_approaching_threshold() -> u32 {
    3
}

const fn default_pace_smoothing() -> f64 {
    0.3
}

fn default_nats_url() -> String {
    String::from("nats://localhost:4222")
}

fn default_dragonfly_url() -> String {
    String::from("redis://localhost:6379")
}

fn default_log_level() -> String {
    String::from("info")
}
