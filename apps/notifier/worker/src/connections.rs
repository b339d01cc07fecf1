//! Startup connections to Redis and PostgreSQL.

use core_config::database::DatabaseConfig;
use core_config::redis::RedisConfig;
use redis::aio::ConnectionManager;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::time::Duration;
use tracing::info;

/// Open a managed Redis connection and verify it with a PING.
pub async fn connect_redis(config: &RedisConfig) -> redis::RedisResult<ConnectionManager> {
    let client = redis::Client::open(config.url.as_str())?;
    let mut manager = ConnectionManager::new(client).await?;

    let _: String = redis::cmd("PING").query_async(&mut manager).await?;
    info!("Connected to Redis");

    Ok(manager)
}

pub fn connect_options(config: &DatabaseConfig, sql_logging: bool) -> ConnectOptions {
    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .sqlx_logging(sql_logging);
    opt
}

pub async fn connect_database(
    config: &DatabaseConfig,
    sql_logging: bool,
) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(connect_options(config, sql_logging)).await?;
    info!(
        max_connections = config.max_connections,
        "Connected to PostgreSQL"
    );
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_options_follow_config() {
        let config = DatabaseConfig {
            max_connections: 4,
            min_connections: 2,
            connect_timeout_secs: 3,
            ..DatabaseConfig::new("postgres://localhost/notifier")
        };

        let opt = connect_options(&config, false);

        assert_eq!(opt.get_url(), "postgres://localhost/notifier");
        assert_eq!(opt.get_max_connections(), Some(4));
        assert_eq!(opt.get_min_connections(), Some(2));
        assert_eq!(opt.get_connect_timeout(), Some(Duration::from_secs(3)));
    }
}
