use anyhow::{Context, Result};

/// Configuration loaded from the environment, following the teacher's
/// `.env`-backed `load_config` pattern. `base_url`/`bearer_token` address
/// the external Music Service; the catalog/usage paths address the
/// on-disk layered catalog and usage store.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub bearer_token: String,
    pub catalog_primary_path: String,
    pub catalog_secondary_path: String,
    pub catalog_tertiary_path: String,
    pub usage_store_path: String,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Load configuration from `.env` and the environment.
pub fn load_config() -> Result<Config> {
    dotenv::dotenv().ok();

    let base_url = std::env::var("MUSIC_SERVICE_BASE_URL")
        .context("MUSIC_SERVICE_BASE_URL must be set (see .env.example)")?;
    let bearer_token = std::env::var("MUSIC_SERVICE_TOKEN")
        .context("MUSIC_SERVICE_TOKEN must be set (see .env.example)")?;

    Ok(Config {
        base_url,
        bearer_token,
        catalog_primary_path: env_or("CATALOG_PRIMARY_PATH", "catalog/primary.json"),
        catalog_secondary_path: env_or("CATALOG_SECONDARY_PATH", "catalog/secondary.json"),
        catalog_tertiary_path: env_or("CATALOG_TERTIARY_PATH", "catalog/tertiary.json"),
        usage_store_path: env_or("USAGE_STORE_PATH", "catalog/usage.json"),
    })
}
