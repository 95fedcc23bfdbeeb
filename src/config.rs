//! Configuration management for the fraud risk engine

use anyhow::{bail, Context, Result};
use config::{Config, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;

/// How detectors look up related transactions in the history
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScanStrategy {
    /// Compare every transaction against the whole history
    #[default]
    Naive,
    /// Build sender / receiver / device indexes once per batch
    Indexed,
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub nats: NatsConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming transaction submissions
    pub transaction_subject: String,
    /// Subject for incoming flag-account commands
    pub flag_subject: String,
    /// Subject for outgoing alerts
    pub alert_subject: String,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            transaction_subject: "transactions".to_string(),
            flag_subject: "accounts.flag".to_string(),
            alert_subject: "fraud.alerts".to_string(),
        }
    }
}

/// Detector thresholds and score contributions
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub scan_strategy: ScanStrategy,
    pub smurfing: SmurfingConfig,
    pub flash_laundering: FlashLaunderingConfig,
    pub mule_network: MuleNetworkConfig,
    pub modifiers: ModifierConfig,
    /// Scores above this are high risk and listed in the report
    pub high_risk_above: u8,
    /// Scores above this (and not high risk) are suspicious
    pub suspicious_above: u8,
    /// Persisted scores above this count as high risk on the dashboard
    pub dashboard_high_risk_above: u8,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            scan_strategy: ScanStrategy::Naive,
            smurfing: SmurfingConfig::default(),
            flash_laundering: FlashLaunderingConfig::default(),
            mule_network: MuleNetworkConfig::default(),
            modifiers: ModifierConfig::default(),
            high_risk_above: 70,
            suspicious_above: 40,
            dashboard_high_risk_above: 80,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SmurfingConfig {
    pub window_hours: i64,
    /// Sender activity in the window must exceed this count
    pub count_above: usize,
    /// Subject amount must be strictly below this
    pub amount_below: Decimal,
    pub score: u32,
}

impl Default for SmurfingConfig {
    fn default() -> Self {
        Self {
            window_hours: 24,
            count_above: 10,
            amount_below: Decimal::from(10_000),
            score: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FlashLaunderingConfig {
    pub window_minutes: i64,
    /// Reverse-edge activity in the window must exceed this count
    pub count_above: usize,
    /// Subject amount must be strictly above this
    pub amount_above: Decimal,
    pub score: u32,
}

impl Default for FlashLaunderingConfig {
    fn default() -> Self {
        Self {
            window_minutes: 60,
            count_above: 3,
            amount_above: Decimal::from(20_000),
            score: 40,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MuleNetworkConfig {
    /// Other-sender transactions on the device must exceed this count
    pub count_above: usize,
    pub score: u32,
}

impl Default for MuleNetworkConfig {
    fn default() -> Self {
        Self {
            count_above: 5,
            score: 25,
        }
    }
}

/// Round-amount and odd-hour modifiers
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModifierConfig {
    /// Exact amounts treated as suspicious
    pub suspicious_amounts: Vec<Decimal>,
    /// Exact multiples of this unit are suspicious
    pub round_amount_unit: Decimal,
    pub round_amount_score: u32,
    /// Hours strictly before this are odd
    pub odd_hour_before: u32,
    /// Hours strictly after this are odd
    pub odd_hour_after: u32,
    pub odd_hour_score: u32,
    /// Offset of the local clock used for the odd-hour check
    pub utc_offset_hours: i32,
}

impl Default for ModifierConfig {
    fn default() -> Self {
        Self {
            suspicious_amounts: vec![Decimal::from(9_999), Decimal::from(49_999)],
            round_amount_unit: Decimal::from(10_000),
            round_amount_score: 15,
            odd_hour_before: 6,
            odd_hour_after: 23,
            odd_hour_score: 10,
            utc_offset_hours: 0,
        }
    }
}

/// Alert raising and severity policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Any alert with a risk score above this is critical
    pub critical_above: u8,
    /// Flagged transactions above this raise a transaction-fraud alert
    pub transaction_alert_above: u8,
    /// QR artifacts above this raise a qr-steganography alert
    pub qr_alert_above: u8,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            critical_above: 80,
            transaction_alert_above: 80,
            qr_alert_above: 80,
        }
    }
}

/// Service loop configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Run a batch analysis after this many new submissions
    pub analyze_every: usize,
    /// Run a batch analysis at least this often when new data arrived
    pub analyze_interval_secs: u64,
    /// Metrics summary interval
    pub metrics_interval_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            analyze_every: 100,
            analyze_interval_secs: 30,
            metrics_interval_secs: 60,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        let config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot honour.
    pub fn validate(&self) -> Result<()> {
        let detection = &self.detection;
        if detection.smurfing.window_hours <= 0 {
            bail!("detection.smurfing.window_hours must be positive");
        }
        if detection.flash_laundering.window_minutes <= 0 {
            bail!("detection.flash_laundering.window_minutes must be positive");
        }
        if detection.modifiers.round_amount_unit <= Decimal::ZERO {
            bail!("detection.modifiers.round_amount_unit must be positive");
        }
        if !(-23..=23).contains(&detection.modifiers.utc_offset_hours) {
            bail!("detection.modifiers.utc_offset_hours must be within -23..=23");
        }
        if detection.suspicious_above >= detection.high_risk_above
            || detection.high_risk_above > 100
        {
            bail!("detection thresholds must satisfy suspicious_above < high_risk_above <= 100");
        }
        if detection.dashboard_high_risk_above > 100 {
            bail!("detection.dashboard_high_risk_above must be at most 100");
        }
        if self.alerts.critical_above > 100 {
            bail!("alerts.critical_above must be at most 100");
        }
        if self.pipeline.analyze_every == 0 {
            bail!("pipeline.analyze_every must be at least 1");
        }
        Ok(())
    }
}
