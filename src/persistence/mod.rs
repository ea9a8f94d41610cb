//! Persistence Layer
//!
//! Local SQLite storage for the market, with async access via sqlx. Mirrors
//! the tables of the hosted backend so either can serve the market ports.
//!
//! # Database Schema
//!
//! ## teams
//! - id, name, crest_url
//!
//! ## players
//! - id, name, position ("Goleiro", "Fixo", "Ala", "Pivô")
//! - price_cents: integer cents, never negative
//! - status ("Disponível", "Lesionado", "Suspenso")
//! - team_id: Foreign key to teams
//!
//! ## users
//! - id, team_name, balance_cents
//!
//! ## rounds
//! - id, number, status ("pendente", "em_andamento", "finalizada")
//!
//! ## lineups
//! - one row per (user_id, round_id)
//! - goalkeeper_id, fixed_id, wing1_id, wing2_id, pivot_id: Foreign keys to players
//! - total_cost_cents, round_points, created_at, updated_at

pub mod models;
pub mod repository;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Database connection pool
pub type DbPool = SqlitePool;

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Query error: {0}")]
    QueryError(String),
}

/// Open the pool and run migrations
///
/// # Arguments
/// - `config`: database URL (e.g. "sqlite://data/cartola.db") and pool settings
pub async fn init_database(config: &DatabaseConfig) -> Result<DbPool, DatabaseError> {
    info!("Initializing database: {}", config.url);

    if let Some(db_path) = config.url.strip_prefix("sqlite://") {
        if let Some(parent) = Path::new(db_path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::ConnectionError(sqlx::Error::Configuration(Box::new(e)))
            })?;
        }
    }

    let level = if config.log_queries {
        tracing::log::LevelFilter::Debug
    } else {
        tracing::log::LevelFilter::Off
    };
    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .log_statements(level);

    // An in-memory database lives and dies with its single connection
    let pool_options = if config.url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(config.max_connections)
    };

    let pool = pool_options.connect_with(options).await?;

    run_migrations(&pool).await?;

    info!("✓ Database initialized successfully");

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), DatabaseError> {
    info!("Running database migrations...");

    let statements: [(&str, &str); 5] = [
        (
            "teams",
            r#"
            CREATE TABLE IF NOT EXISTS teams (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                crest_url TEXT
            )
            "#,
        ),
        (
            "players",
            r#"
            CREATE TABLE IF NOT EXISTS players (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                position TEXT NOT NULL CHECK(position IN ('Goleiro', 'Fixo', 'Ala', 'Pivô')),
                price_cents INTEGER NOT NULL CHECK(price_cents >= 0),
                status TEXT NOT NULL DEFAULT 'Disponível'
                    CHECK(status IN ('Disponível', 'Lesionado', 'Suspenso')),
                team_id INTEGER REFERENCES teams(id),
                photo_url TEXT
            )
            "#,
        ),
        (
            "users",
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                team_name TEXT,
                balance_cents INTEGER NOT NULL
            )
            "#,
        ),
        (
            "rounds",
            r#"
            CREATE TABLE IF NOT EXISTS rounds (
                id INTEGER PRIMARY KEY,
                number INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'pendente'
                    CHECK(status IN ('pendente', 'em_andamento', 'finalizada'))
            )
            "#,
        ),
        (
            "lineups",
            r#"
            CREATE TABLE IF NOT EXISTS lineups (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL REFERENCES users(id),
                round_id INTEGER NOT NULL REFERENCES rounds(id),
                goalkeeper_id INTEGER NOT NULL REFERENCES players(id),
                fixed_id INTEGER NOT NULL REFERENCES players(id),
                wing1_id INTEGER NOT NULL REFERENCES players(id),
                wing2_id INTEGER NOT NULL REFERENCES players(id),
                pivot_id INTEGER NOT NULL REFERENCES players(id),
                total_cost_cents INTEGER NOT NULL,
                round_points REAL NOT NULL DEFAULT 0.0,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(user_id, round_id)
            )
            "#,
        ),
    ];

    for (table, sql) in statements {
        sqlx::query(sql).execute(pool).await.map_err(|e| {
            DatabaseError::MigrationError(format!("Failed to create {} table: {}", table, e))
        })?;
    }

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_players_status ON players(status)")
        .execute(pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_rounds_status ON rounds(status)")
        .execute(pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;

    info!("✓ Database migrations completed successfully");

    Ok(())
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database URL (e.g., "sqlite://data/cartola.db")
    pub url: String,

    pub max_connections: u32,

    /// Log every statement at debug level
    pub log_queries: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/cartola.db".to_string(),
            max_connections: 5,
            log_queries: cfg!(debug_assertions),
        }
    }
}

impl DatabaseConfig {
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            log_queries: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_init() {
        let pool = init_database(&DatabaseConfig::in_memory()).await;
        assert!(pool.is_ok());
    }

    #[tokio::test]
    async fn test_migrations() {
        let pool = init_database(&DatabaseConfig::in_memory()).await.unwrap();

        let result: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('teams', 'players', 'users', 'rounds', 'lineups')"
        )
        .fetch_one(&pool)
        .await
        .unwrap();

        assert_eq!(result.0, 5);
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = init_database(&DatabaseConfig::in_memory()).await.unwrap();
        assert!(run_migrations(&pool).await.is_ok());
    }

    #[test]
    fn test_database_config_default() {
        let config = DatabaseConfig::default();
        assert_eq!(config.url, "sqlite://data/cartola.db");
        assert_eq!(config.max_connections, 5);
    }
}
