use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
}

/// Load configuration from the environment. `DATABASE_URL` is required;
/// everything else has a local-development default.
pub fn load() -> Result<Config> {
    let url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let bind_addr = std::env::var("BIND_ADDR").unwrap_or("0.0.0.0:3000".to_string());

    Ok(Config {
        database: DatabaseConfig { url },
        server: ServerConfig { bind_addr },
    })
}
