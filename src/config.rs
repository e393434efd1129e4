use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use jsonschema::{JSONSchema, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    access::Grant,
    tap::TapPolicy,
    types::{Amount, AssetId, CallerId, PCT_BASE, SECONDS_PER_DAY},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub treasury: TreasuryRuntimeConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub custody: CustodyConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

fn default_enabled_true() -> bool {
    true
}

fn default_logging_dir() -> PathBuf {
    PathBuf::from("./logs/treasury")
}

fn default_logging_filter() -> String {
    "info".to_string()
}

fn default_logging_rotation() -> LoggingRotation {
    LoggingRotation::Daily
}

fn default_logging_retention_days() -> usize {
    14
}

fn default_state_path() -> PathBuf {
    PathBuf::from("./state/tap.json")
}

fn default_beneficiary() -> CallerId {
    "treasury".to_string()
}

fn default_max_tap_change_pct() -> u128 {
    PCT_BASE / 10
}

fn default_rate_change_period_secs() -> u64 {
    30 * SECONDS_PER_DAY
}

fn default_rate_period_secs() -> u64 {
    SECONDS_PER_DAY
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("treasury.sock")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LoggingRotation {
    Daily,
    Hourly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_logging_filter")]
    pub filter: String,
    #[serde(default = "default_logging_rotation")]
    pub rotation: LoggingRotation,
    #[serde(default = "default_logging_retention_days")]
    pub retention_days: usize,
    #[serde(default = "default_enabled_true")]
    pub stderr_warn_enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_logging_dir(),
            filter: default_logging_filter(),
            rotation: default_logging_rotation(),
            retention_days: default_logging_retention_days(),
            stderr_warn_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreasuryRuntimeConfig {
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    #[serde(default = "default_beneficiary")]
    pub beneficiary: CallerId,
    #[serde(default = "default_max_tap_change_pct")]
    pub max_tap_change_pct: u128,
    #[serde(default = "default_rate_change_period_secs")]
    pub rate_change_period_secs: u64,
    #[serde(default = "default_rate_period_secs")]
    pub rate_period_secs: u64,
}

impl Default for TreasuryRuntimeConfig {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
            beneficiary: default_beneficiary(),
            max_tap_change_pct: default_max_tap_change_pct(),
            rate_change_period_secs: default_rate_change_period_secs(),
            rate_period_secs: default_rate_period_secs(),
        }
    }
}

impl TreasuryRuntimeConfig {
    pub fn tap_policy(&self) -> TapPolicy {
        TapPolicy {
            max_tap_change_pct: self.max_tap_change_pct,
            rate_change_period_secs: self.rate_change_period_secs,
            rate_period_secs: self.rate_period_secs,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessConfig {
    #[serde(default)]
    pub grants: Vec<Grant>,
}

/// Opening balances for the in-memory custody pool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustodyConfig {
    #[serde(default)]
    pub balances: BTreeMap<AssetId, Amount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
        }
    }
}

impl Config {
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let config_value: Value = json5::from_str(&config_content)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;

        let config_base = config_path.parent().unwrap_or_else(|| Path::new("."));
        let schema_path = resolve_schema_path(config_base, &config_value)?;
        validate_against_schema(&config_value, &schema_path)?;

        let mut config: Config = serde_json::from_value(config_value)
            .context("failed to deserialize treasury config")?;

        if !config.treasury.state_path.is_absolute() {
            config.treasury.state_path = config_base.join(&config.treasury.state_path);
        }
        if !config.server.socket_path.is_absolute() {
            config.server.socket_path = config_base.join(&config.server.socket_path);
        }

        Ok(config)
    }
}

fn resolve_schema_path(config_base: &Path, config_value: &Value) -> Result<PathBuf> {
    if let Some(path_text) = config_value.get("$schema").and_then(|value| value.as_str()) {
        let configured = PathBuf::from(path_text);
        if configured.is_absolute() {
            return Ok(configured);
        }
        return Ok(config_base.join(&configured));
    }

    let local_default = config_base.join("treasury.schema.json");
    if local_default.exists() {
        return Ok(local_default);
    }

    Err(anyhow!(
        "unable to resolve schema path: expected $schema in config or treasury.schema.json"
    ))
}

fn validate_against_schema(config_value: &Value, schema_path: &Path) -> Result<()> {
    let schema_content = fs::read_to_string(schema_path)
        .with_context(|| format!("failed to read schema {}", schema_path.display()))?;
    let schema: Value = serde_json::from_str(&schema_content)
        .with_context(|| format!("failed to parse schema {}", schema_path.display()))?;

    let compiled =
        JSONSchema::compile(&schema).map_err(|e| anyhow!("failed to compile schema: {e}"))?;

    match compiled.validate(config_value) {
        Ok(()) => Ok(()),
        Err(errors_iter) => {
            let validation_errors: Vec<ValidationError> = errors_iter.collect();
            let messages: Vec<String> = validation_errors
                .into_iter()
                .map(|error| error.to_string())
                .collect();
            Err(anyhow!("config validation failed: {}", messages.join("; ")))
        }
    }
}
