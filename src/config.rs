use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::auth::tokens::TokenConfig;

/// Secret used when none is configured. Only fit for local development.
pub const DEV_SECRET_KEY: &str = "CHANGE_ME_IN_PRODUCTION_use_openssl_rand_hex_32";

#[derive(Parser, Debug)]
#[command(name = "trackweave", about = "Posts, threaded comments and votes over REST")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Secret used to sign access and refresh tokens
    #[arg(long, env = "TRACKWEAVE_SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
    pub pool_size: u32,
    pub busy_timeout_ms: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub secret_key: String,
    pub access_token_minutes: u64,
    pub refresh_token_days: u64,
    pub password_cost: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            pool_size: 8,
            busy_timeout_ms: 5000,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: DEV_SECRET_KEY.to_string(),
            access_token_minutes: 60 * 24,
            refresh_token_days: 30,
            password_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl AuthConfig {
    pub fn token_config(&self) -> TokenConfig {
        TokenConfig {
            secret: self.secret_key.clone(),
            access_ttl: Duration::from_secs(self.access_token_minutes * 60),
            refresh_ttl: Duration::from_secs(self.refresh_token_days * 24 * 3600),
        }
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.secret_key == DEV_SECRET_KEY
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }
        if let Some(ref secret) = cli.secret_key {
            config.auth.secret_key = secret.clone();
        }

        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("trackweave.db"));
        }

        if config.auth.secret_key.is_empty() {
            anyhow::bail!("auth.secret_key must not be empty");
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".trackweave")
        })
    }

    /// Database file path; resolved by [`Config::load`].
    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("trackweave.db"))
    }
}
