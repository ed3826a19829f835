use crate::connection::ConnectionConfig;
use anyhow::{Context, Result, anyhow};
use std::net::SocketAddr;

const LOCAL_ENV: &str = "local";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Deployment environment; `local` exposes internal error detail
    pub app_env: String,
    pub database: ConnectionConfig,
    pub seed_demo_data: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = env_string("HIFELLA_BIND_ADDR", "127.0.0.1:8080")
            .parse::<SocketAddr>()
            .context("HIFELLA_BIND_ADDR must be a valid host:port")?;

        let app_env = env_string("APP_ENV", "production");

        let url = env_string("DATABASE_URL", "memdb://localhost/hifella");
        let mut database = ConnectionConfig::from_url(&url).with_context(|| format!("DATABASE_URL '{url}' is invalid"))?;

        if let Ok(max) = std::env::var("DATABASE_MAX_CONNECTIONS") {
            let max = max
                .parse::<usize>()
                .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?;
            database = database.max_connections(max);
        }
        database
            .validate()
            .context("invalid database configuration")?;

        let seed_demo_data = parse_flag(&env_string("SEED_DEMO_DATA", "false"))
            .context("SEED_DEMO_DATA must be true or false")?;

        Ok(Self {
            bind_addr,
            app_env,
            database,
            seed_demo_data,
        })
    }

    pub fn is_local(&self) -> bool {
        self.app_env.eq_ignore_ascii_case(LOCAL_ENV)
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(anyhow!("unrecognised flag value '{other}'")),
    }
}
