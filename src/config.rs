//! Configuration management with validation and defaults
//!
//! TOML file (optional) → `SALAD_*` environment overrides → validation.

use crate::common::types::{Amount, Token};
use crate::errors::{ConfigurationError, SaladResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Shortest allowed round (1 hour)
pub const MIN_ROUND_DURATION_SECS: u64 = 60 * 60;
/// Longest allowed round (4 days)
pub const MAX_ROUND_DURATION_SECS: u64 = 4 * 24 * 60 * 60;
/// Commission denominator
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Complete pool configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SaladConfig {
    #[serde(default)]
    pub game: GameConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Round and stake parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameConfig {
    pub round_duration_secs: u64,
    pub min_stake: u64,
    pub max_stake: u64,
    pub stake_token: Token,
    /// Tokens the admin may select for future rounds
    pub allowed_tokens: Vec<Token>,
}

impl GameConfig {
    pub fn min_stake(&self) -> Amount {
        self.min_stake as Amount
    }

    pub fn max_stake(&self) -> Amount {
        self.max_stake as Amount
    }

    pub fn is_whitelisted(&self, token: &Token) -> bool {
        self.allowed_tokens.iter().any(|allowed| allowed == token)
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            round_duration_secs: MIN_ROUND_DURATION_SECS,
            min_stake: 1_000,
            max_stake: 1_000_000_000_000,
            stake_token: Token::native(),
            allowed_tokens: vec![
                Token::native(),
                Token::new(
                    "USDC",
                    Some("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".to_string()),
                ),
            ],
        }
    }
}

/// In-memory ledger parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Commission taken on every stake received, in basis points
    pub commission_bps: u32,
    pub treasury: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            commission_bps: 100,
            treasury: "treasury".to_string(),
        }
    }
}

/// Randomness oracle parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Identity allowed to deliver randomness
    pub principal: String,
    /// Artificial delay between request and delivery
    pub delivery_delay_ms: u64,
    pub queue_capacity: usize,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            principal: "vrf-oracle".to_string(),
            delivery_delay_ms: 0,
            queue_capacity: 1_024,
        }
    }
}

/// Event bus parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventsConfig {
    pub channel_capacity: usize,
    /// Most recent events kept in memory; 0 disables the history
    pub history_limit: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1_024,
            history_limit: 10_000,
        }
    }
}

/// Logging parameters; `RUST_LOG` takes precedence over `level`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            with_target: false,
        }
    }
}

/// Configuration loader with environment variable support
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> SaladResult<SaladConfig> {
        let mut config = match self.config_path {
            Some(ref path) => self.load_from_file(path)?,
            None => SaladConfig::default(),
        };

        apply_overrides(&mut config, |key| std::env::var(key).ok())?;
        validate(&config)?;

        Ok(config)
    }

    fn load_from_file(&self, path: &str) -> SaladResult<SaladConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e))
        })?;

        toml::from_str(&content)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)).into())
    }

    /// Save configuration to file
    pub fn save(&self, config: &SaladConfig, path: &str) -> SaladResult<()> {
        let toml_string = toml::to_string_pretty(config).map_err(|e| {
            ConfigurationError::SaveFailed(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(path, toml_string).map_err(|e| {
            ConfigurationError::SaveFailed(format!("Failed to write to {}: {}", path, e)).into()
        })
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, raw: String) -> Result<T, ConfigurationError> {
    raw.parse().map_err(|_| ConfigurationError::InvalidValue {
        field: key.to_string(),
        value: raw,
        reason: "Unparseable value".to_string(),
    })
}

/// Apply `SALAD_*` overrides read through `lookup`
pub fn apply_overrides<F>(config: &mut SaladConfig, lookup: F) -> Result<(), ConfigurationError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup("SALAD_ROUND_DURATION_SECS") {
        config.game.round_duration_secs = parse_override("SALAD_ROUND_DURATION_SECS", raw)?;
    }
    if let Some(raw) = lookup("SALAD_MIN_STAKE") {
        config.game.min_stake = parse_override("SALAD_MIN_STAKE", raw)?;
    }
    if let Some(raw) = lookup("SALAD_MAX_STAKE") {
        config.game.max_stake = parse_override("SALAD_MAX_STAKE", raw)?;
    }
    if let Some(raw) = lookup("SALAD_COMMISSION_BPS") {
        config.ledger.commission_bps = parse_override("SALAD_COMMISSION_BPS", raw)?;
    }
    if let Some(principal) = lookup("SALAD_ORACLE_PRINCIPAL") {
        config.oracle.principal = principal;
    }
    if let Some(raw) = lookup("SALAD_ORACLE_DELAY_MS") {
        config.oracle.delivery_delay_ms = parse_override("SALAD_ORACLE_DELAY_MS", raw)?;
    }
    if let Some(level) = lookup("SALAD_LOG_LEVEL") {
        config.logging.level = level;
    }

    Ok(())
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigurationError {
    ConfigurationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Validate configuration values
pub fn validate(config: &SaladConfig) -> Result<(), ConfigurationError> {
    let game = &config.game;

    if !(MIN_ROUND_DURATION_SECS..=MAX_ROUND_DURATION_SECS).contains(&game.round_duration_secs) {
        return Err(invalid(
            "game.round_duration_secs",
            game.round_duration_secs,
            "Round duration must be between 1 hour and 4 days",
        ));
    }

    if game.min_stake == 0 {
        return Err(invalid("game.min_stake", 0, "Minimum stake must be at least 1"));
    }

    if game.min_stake > game.max_stake {
        return Err(invalid(
            "game.max_stake",
            game.max_stake,
            "Maximum stake cannot be below the minimum stake",
        ));
    }

    if !game.is_whitelisted(&game.stake_token) {
        return Err(invalid(
            "game.stake_token",
            &game.stake_token,
            "Stake token must be in game.allowed_tokens",
        ));
    }

    if config.ledger.commission_bps >= BPS_DENOMINATOR {
        return Err(invalid(
            "ledger.commission_bps",
            config.ledger.commission_bps,
            "Commission must be below 100%",
        ));
    }

    if config.oracle.principal.trim().is_empty() {
        return Err(ConfigurationError::MissingRequired("oracle.principal".to_string()));
    }

    if config.oracle.queue_capacity == 0 || config.events.channel_capacity == 0 {
        return Err(invalid("capacity", 0, "Queue and channel capacities cannot be zero"));
    }

    Ok(())
}

/// Builder pattern for creating configurations
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: SaladConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SaladConfig::default(),
        }
    }

    pub fn game(mut self, game: GameConfig) -> Self {
        self.config.game = game;
        self
    }

    pub fn round_duration_secs(mut self, secs: u64) -> Self {
        self.config.game.round_duration_secs = secs;
        self
    }

    pub fn stake_bounds(mut self, min_stake: u64, max_stake: u64) -> Self {
        self.config.game.min_stake = min_stake;
        self.config.game.max_stake = max_stake;
        self
    }

    pub fn commission_bps(mut self, bps: u32) -> Self {
        self.config.ledger.commission_bps = bps;
        self
    }

    pub fn oracle(mut self, oracle: OracleConfig) -> Self {
        self.config.oracle = oracle;
        self
    }

    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.config.logging = logging;
        self
    }

    /// Build and validate the final configuration
    pub fn build(self) -> Result<SaladConfig, ConfigurationError> {
        validate(&self.config)?;
        Ok(self.config)
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config(path: &str) -> SaladResult<()> {
    ConfigLoader::new().save(&SaladConfig::default(), path)
}
