use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for the flow engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChairflowConfig {
    /// Clinic operational defaults
    pub clinic: ClinicConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClinicConfig {
    /// Fallback appointment length when the appointment record carries none
    pub default_appointment_minutes: i64,
    /// Wait-time bucket thresholds for the queue dashboard
    pub wait_thresholds: WaitThresholds,
    /// Default length of a cleaning block between patients
    pub default_cleaning_minutes: i64,
}

/// Minutes after which a waiting patient escalates to warning / critical.
/// The warning bucket is inclusive of its upper bound.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct WaitThresholds {
    pub warning_minutes: i64,
    pub critical_minutes: i64,
}

impl Default for WaitThresholds {
    fn default() -> Self {
        Self {
            warning_minutes: 15,
            critical_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Enable structured tracing output
    pub tracing_enabled: bool,
    /// Log level
    pub log_level: String,
}

impl Default for ChairflowConfig {
    fn default() -> Self {
        Self {
            clinic: ClinicConfig {
                default_appointment_minutes: 30,
                wait_thresholds: WaitThresholds::default(),
                default_cleaning_minutes: 15,
            },
            observability: ObservabilityConfig {
                tracing_enabled: true,
                log_level: "info".to_string(),
            },
        }
    }
}

impl ChairflowConfig {
    /// Load configuration with precedence:
    /// 1. Default values
    /// 2. Configuration file (chairflow.toml)
    /// 3. Environment variables (prefixed with CHAIRFLOW_)
    pub fn load() -> Result<Self> {
        let defaults = ChairflowConfig::default();
        let mut builder = Config::builder()
            .set_default(
                "clinic.default_appointment_minutes",
                defaults.clinic.default_appointment_minutes,
            )?
            .set_default(
                "clinic.wait_thresholds.warning_minutes",
                defaults.clinic.wait_thresholds.warning_minutes,
            )?
            .set_default(
                "clinic.wait_thresholds.critical_minutes",
                defaults.clinic.wait_thresholds.critical_minutes,
            )?
            .set_default(
                "clinic.default_cleaning_minutes",
                defaults.clinic.default_cleaning_minutes,
            )?
            .set_default(
                "observability.tracing_enabled",
                defaults.observability.tracing_enabled,
            )?
            .set_default("observability.log_level", defaults.observability.log_level)?;

        if Path::new("chairflow.toml").exists() {
            builder = builder.add_source(File::with_name("chairflow"));
        }

        builder = builder.add_source(
            Environment::with_prefix("CHAIRFLOW")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<ChairflowConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = ChairflowConfig::load_env_file();
        ChairflowConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static ChairflowConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}
