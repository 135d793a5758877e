/**
 * Server Configuration
 *
 * Loads `AppConfig` and the optional PostgreSQL pool.
 *
 * # Configuration Sources
 *
 * 1. Built-in defaults
 * 2. TOML file named by `CROSSLEARN_CONFIG`, when set
 * 3. Environment variables (after `.env` has been loaded by the binary)
 *
 * # Error Handling
 *
 * An unreadable or invalid configuration stops startup. A database that
 * cannot be reached does not: the pool is left as `None` and database routes
 * answer 503.
 */

use std::path::Path;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::shared::config::{AppConfig, ConfigError};

/// Environment variable naming an optional TOML config file
pub const CONFIG_PATH_VAR: &str = "CROSSLEARN_CONFIG";

/// Database configuration result
pub type DatabaseConfig = Option<PgPool>;

/// Load configuration from the optional file and the process environment.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let base = match std::env::var(CONFIG_PATH_VAR) {
        Ok(path) if !path.is_empty() => {
            tracing::info!("Loading configuration from {}", path);
            AppConfig::from_toml_file(Path::new(&path))?
        }
        _ => AppConfig::default(),
    };
    base.with_env_overrides(|key| std::env::var(key).ok())
}

/// Connect to PostgreSQL and run migrations.
///
/// Returns `None` when no URL is configured or the connection fails.
pub async fn load_database(url: Option<&str>) -> DatabaseConfig {
    let Some(database_url) = url else {
        tracing::warn!("DATABASE_URL not set. Database features will be disabled.");
        return None;
    };

    tracing::info!("Connecting to database...");

    let pool = match PgPoolOptions::new().max_connections(10).connect(database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to create database connection pool: {:?}", e);
            tracing::warn!("Database features will be disabled.");
            return None;
        }
    };

    tracing::info!("Running database migrations...");
    match sqlx::migrate!().run(&pool).await {
        Ok(_) => tracing::info!("Database migrations completed successfully"),
        Err(e) => {
            tracing::error!("Failed to run database migrations: {}", e);
            tracing::warn!("Continuing without migrations - database might not be up to date");
        }
    }

    Some(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    #[serial]
    fn test_load_config_from_file_and_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 9100\n\n[llm]\nmodel = \"from-file\"").unwrap();

        std::env::set_var(CONFIG_PATH_VAR, file.path());
        std::env::set_var("LLM_MODEL", "from-env");
        let config = load_config();
        std::env::remove_var(CONFIG_PATH_VAR);
        std::env::remove_var("LLM_MODEL");

        let config = config.unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.llm.model, "from-env");
    }

    #[test]
    #[serial]
    fn test_missing_config_file_is_an_error() {
        std::env::set_var(CONFIG_PATH_VAR, "/nonexistent/crosslearn.toml");
        let result = load_config();
        std::env::remove_var(CONFIG_PATH_VAR);
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[tokio::test]
    async fn test_no_database_url() {
        assert!(load_database(None).await.is_none());
    }
}
