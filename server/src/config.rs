use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::stream::StreamConfig;

/// botbridge coordination server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "botbridge-server", version, about = "botbridge coordination server")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "BOTBRIDGE_PORT", default_value = "7700")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "BOTBRIDGE_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./botbridge.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "BOTBRIDGE_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Data directory for persistent state (SQLite database)
    #[arg(long, env = "BOTBRIDGE_DATA_DIR", default_value = "./data")]
    pub data_dir: String,

    /// Seconds a login code stays valid
    #[arg(long, env = "BOTBRIDGE_AUTH_CODE_TTL_SECS", default_value = "300")]
    pub auth_code_ttl_secs: u64,

    /// Seconds between heartbeat frames on a login stream
    #[arg(long, env = "BOTBRIDGE_HEARTBEAT_INTERVAL_SECS", default_value = "10")]
    pub heartbeat_interval_secs: u64,

    /// Heartbeats written before a login stream is timed out
    #[arg(long, env = "BOTBRIDGE_HEARTBEAT_MAX_TICKS", default_value = "30")]
    pub heartbeat_max_ticks: u32,

    /// Milliseconds any single stream write may take
    #[arg(long, env = "BOTBRIDGE_STREAM_WRITE_TIMEOUT_MS", default_value = "500")]
    pub stream_write_timeout_ms: u64,

    /// System preamble seeded into every new chat history
    #[arg(
        long,
        env = "BOTBRIDGE_SYSTEM_PROMPT",
        default_value = "You are a helpful assistant."
    )]
    pub system_prompt: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 7700,
            bind_address: "0.0.0.0".to_string(),
            config: "./botbridge.toml".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            auth_code_ttl_secs: 300,
            heartbeat_interval_secs: 10,
            heartbeat_max_ticks: 30,
            stream_write_timeout_ms: 500,
            system_prompt: "You are a helpful assistant.".to_string(),
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (BOTBRIDGE_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("BOTBRIDGE_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }

    pub fn auth_code_ttl(&self) -> Duration {
        Duration::from_secs(self.auth_code_ttl_secs)
    }

    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            write_timeout: Duration::from_millis(self.stream_write_timeout_ms),
            heartbeat_interval: Duration::from_secs(self.heartbeat_interval_secs),
            heartbeat_max_ticks: self.heartbeat_max_ticks,
            ..StreamConfig::default()
        }
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# botbridge Coordination Server Configuration
# Place this file at ./botbridge.toml or specify with --config <path>
# All settings can be overridden via environment variables
# (BOTBRIDGE_PORT, etc.) or CLI flags (--port, etc.)

# Server port (default: 7700)
# port = 7700

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the SQLite database
# data_dir = "./data"

# Seconds a numeric login code stays valid (default: 300 = 5 minutes)
# auth_code_ttl_secs = 300

# Login stream heartbeat cadence and budget.
# A stream with no login receives one heartbeat per interval and is
# closed after max_ticks of them (defaults: 10 s * 30 = 5 minutes).
# heartbeat_interval_secs = 10
# heartbeat_max_ticks = 30

# Upper bound on any single stream write; a slower consumer is
# disconnected (default: 500)
# stream_write_timeout_ms = 500

# System preamble seeded into every new chat history
# system_prompt = "You are a helpful assistant."
"#
    .to_string()
}
