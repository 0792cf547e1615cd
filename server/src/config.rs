use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// MeetingMind real-time session server
///
/// Only flags actually given (or set through their env var) are serialized,
/// so unset flags never mask values from the TOML file.
#[derive(Parser, Serialize, Clone, Debug, Default)]
#[command(
    name = "meetingmind-server",
    version,
    about = "MeetingMind real-time meeting session server"
)]
pub struct Cli {
    /// Port to listen on [default: 3001]
    #[arg(long, env = "MEETINGMIND_PORT")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Bind address [default: 0.0.0.0]
    #[arg(long, env = "MEETINGMIND_BIND_ADDRESS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,

    /// Path to TOML config file
    #[arg(long, default_value = "./meetingmind.toml")]
    #[serde(skip)]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "MEETINGMIND_JSON_LOGS")]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub generate_config: bool,

    /// Data directory for the identity database and generated keys [default: ./data]
    #[arg(long, env = "MEETINGMIND_DATA_DIR")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,

    /// Shared secret used to verify bearer credentials. Must match the HTTP
    /// API's signing secret; generated into data_dir when unset.
    #[arg(long, env = "MEETINGMIND_JWT_SECRET", hide_env_values = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt_secret: Option<String>,
}

/// Resolved server configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub bind_address: String,
    pub json_logs: bool,
    pub generate_config: bool,
    pub data_dir: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt_secret: Option<String>,
    #[serde(default)]
    pub keepalive: KeepaliveConfig,
    #[serde(default)]
    pub captions: CaptionsConfig,
}

/// Ping/pong liveness probing for each connection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct KeepaliveConfig {
    /// Seconds between server pings (default: 30)
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// Seconds to wait for a pong before closing (default: 10)
    #[serde(default = "default_pong_timeout")]
    pub pong_timeout_secs: u64,
}

impl KeepaliveConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs.max(1))
    }
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: 30,
            pong_timeout_secs: 10,
        }
    }
}

fn default_ping_interval() -> u64 {
    30
}

fn default_pong_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CaptionsConfig {
    /// Confidence attached to captions that arrive without one (default: 0.95)
    #[serde(default = "default_confidence")]
    pub default_confidence: f64,
}

impl Default for CaptionsConfig {
    fn default() -> Self {
        Self {
            default_confidence: 0.95,
        }
    }
}

fn default_confidence() -> f64 {
    0.95
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3001,
            bind_address: "0.0.0.0".to_string(),
            json_logs: false,
            generate_config: false,
            data_dir: "./data".to_string(),
            jwt_secret: None,
            keepalive: KeepaliveConfig::default(),
            captions: CaptionsConfig::default(),
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (MEETINGMIND_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Cli::parse();

        Self::figment(Toml::file(&cli.config))
            .merge(Serialized::defaults(&cli))
            .extract()
    }

    fn figment(toml: figment::providers::Data<Toml>) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(toml)
            .merge(Env::prefixed("MEETINGMIND_").split("__"))
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# MeetingMind Session Server Configuration
# Place this file at ./meetingmind.toml or specify with --config <path>
# All settings can be overridden via environment variables (MEETINGMIND_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 3001)
# port = 3001

# Bind address (default: 0.0.0.0, all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Data directory for the identity database and generated JWT key
# data_dir = "./data"

# Shared secret for verifying bearer credentials. Must match the secret the
# HTTP API signs tokens with. Prefer MEETINGMIND_JWT_SECRET over this file.
# jwt_secret = ""

# ---- Connection keepalive ----
# [keepalive]
# ping_interval_secs = 30   # Server ping cadence
# pong_timeout_secs = 10    # Close the connection if no pong arrives in time

# ---- Captions ----
# [captions]
# default_confidence = 0.95  # Used when a caption carries no confidence
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_to_defaults() {
        figment::Jail::expect_with(|_jail| {
            let config: Config =
                Config::figment(Toml::string(&generate_config_template())).extract()?;
            assert_eq!(config.port, 3001);
            assert_eq!(config.data_dir, "./data");
            assert_eq!(config.keepalive, KeepaliveConfig::default());
            assert_eq!(config.captions, CaptionsConfig::default());
            assert!(config.jwt_secret.is_none());
            Ok(())
        });
    }

    #[test]
    fn unset_cli_flags_do_not_mask_toml() {
        figment::Jail::expect_with(|_jail| {
            let cli = Cli {
                data_dir: Some("/tmp/mm".to_string()),
                ..Cli::default()
            };
            let config: Config = Config::figment(Toml::string("port = 5001"))
                .merge(Serialized::defaults(&cli))
                .extract()?;
            assert_eq!(config.port, 5001);
            assert_eq!(config.data_dir, "/tmp/mm");
            assert!(!config.json_logs);
            Ok(())
        });
    }

    #[test]
    fn toml_sections_override_defaults() {
        figment::Jail::expect_with(|_jail| {
            let toml = r#"
                port = 5001
                jwt_secret = "s3cret"

                [keepalive]
                ping_interval_secs = 5

                [captions]
                default_confidence = 0.5
            "#;
            let config: Config = Config::figment(Toml::string(toml)).extract()?;
            assert_eq!(config.port, 5001);
            assert_eq!(config.jwt_secret.as_deref(), Some("s3cret"));
            assert_eq!(config.keepalive.ping_interval_secs, 5);
            assert_eq!(config.keepalive.pong_timeout_secs, 10);
            assert_eq!(config.captions.default_confidence, 0.5);
            Ok(())
        });
    }

    #[test]
    fn env_overrides_toml() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("MEETINGMIND_PORT", "7000");
            jail.set_env("MEETINGMIND_KEEPALIVE__PONG_TIMEOUT_SECS", "3");
            let config: Config = Config::figment(Toml::string("port = 5001")).extract()?;
            assert_eq!(config.port, 7000);
            assert_eq!(config.keepalive.pong_timeout_secs, 3);
            Ok(())
        });
    }

    #[test]
    fn zero_durations_are_floored() {
        let keepalive = KeepaliveConfig {
            ping_interval_secs: 0,
            pong_timeout_secs: 0,
        };
        assert_eq!(keepalive.ping_interval(), Duration::from_secs(1));
        assert_eq!(keepalive.pong_timeout(), Duration::from_secs(1));
    }
}
