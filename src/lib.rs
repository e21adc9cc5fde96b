//! A small photo-sharing web application: accounts, uploads, follows and a
//! chronological feed, served as HTML by actix-web on top of SQLite.

pub mod auth;
pub mod common;
pub mod config;
pub mod follow;
pub mod handlers;
pub mod models;
pub mod posts;
pub mod schema;
pub mod static_server;
pub mod templates;
pub mod users;

use common::db::{establish_pool, run_migrations, DbPool};
use config::Config;

/// Shared per-process state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Config,
}

impl AppState {
    /// Opens the database, applies pending migrations and makes sure the
    /// upload directory exists.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let pool = establish_pool(&config.database_url, config.db_pool_size)?;
        run_migrations(&pool)?;
        std::fs::create_dir_all(&config.upload_dir)?;
        Ok(Self { pool, config })
    }
}
