use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub rewards: RewardsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            api_port: default_api_port(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Email of the bootstrap administrator created on first start
    #[serde(default = "default_admin_email")]
    pub admin_email: String,
    /// Password for the bootstrap administrator (generated and logged if unset)
    #[serde(default)]
    pub admin_password: Option<String>,
    /// Lifetime of login sessions in days
    #[serde(default = "default_session_days")]
    pub session_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_email: default_admin_email(),
            admin_password: None,
            session_days: default_session_days(),
        }
    }
}

fn default_admin_email() -> String {
    "admin@triclub.local".to_string()
}

fn default_session_days() -> i64 {
    7
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Requests per window for authenticated API endpoints
    #[serde(default = "default_api_requests")]
    pub api_requests_per_window: u32,
    /// Requests per window for login and registration
    #[serde(default = "default_auth_requests")]
    pub auth_requests_per_window: u32,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    /// Seconds between sweeps of stale limiter entries
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            api_requests_per_window: default_api_requests(),
            auth_requests_per_window: default_auth_requests(),
            window_seconds: default_window_seconds(),
            cleanup_interval: default_cleanup_interval(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_api_requests() -> u32 {
    100
}

fn default_auth_requests() -> u32 {
    20
}

fn default_window_seconds() -> u64 {
    60
}

fn default_cleanup_interval() -> u64 {
    300
}

/// Point amounts and invitation defaults used by the rewards economy
#[derive(Debug, Clone, Deserialize)]
pub struct RewardsConfig {
    /// Points granted to a new member on registration
    #[serde(default = "default_welcome_bonus")]
    pub welcome_bonus: i64,
    /// Points granted to the sender of the invitation used to register
    #[serde(default = "default_referral_bonus")]
    pub referral_bonus: i64,
    /// Club assigned when the inviting member has none
    #[serde(default = "default_club")]
    pub default_club: String,
    /// Uses allowed on the personal code every member receives
    #[serde(default = "default_personal_code_max_uses")]
    pub personal_code_max_uses: i64,
    #[serde(default = "default_personal_code_expiry_days")]
    pub personal_code_expiry_days: i64,
    /// Defaults for invitations created explicitly by members
    #[serde(default = "default_invitation_expiry_days")]
    pub invitation_expiry_days: i64,
    #[serde(default = "default_invitation_max_uses")]
    pub invitation_max_uses: i64,
    /// Minor currency units one discount point is worth at checkout
    #[serde(default = "default_points_discount_unit")]
    pub points_discount_unit: i64,
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            welcome_bonus: default_welcome_bonus(),
            referral_bonus: default_referral_bonus(),
            default_club: default_club(),
            personal_code_max_uses: default_personal_code_max_uses(),
            personal_code_expiry_days: default_personal_code_expiry_days(),
            invitation_expiry_days: default_invitation_expiry_days(),
            invitation_max_uses: default_invitation_max_uses(),
            points_discount_unit: default_points_discount_unit(),
        }
    }
}

fn default_welcome_bonus() -> i64 {
    100
}

fn default_referral_bonus() -> i64 {
    200
}

fn default_club() -> String {
    "TriClub".to_string()
}

fn default_personal_code_max_uses() -> i64 {
    999
}

fn default_personal_code_expiry_days() -> i64 {
    365
}

fn default_invitation_expiry_days() -> i64 {
    30
}

fn default_invitation_max_uses() -> i64 {
    1
}

fn default_points_discount_unit() -> i64 {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            logging: LoggingConfig::default(),
            rate_limit: RateLimitConfig::default(),
            rewards: RewardsConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml(&content)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse configuration file")
    }
}
