use std::path::PathBuf;

pub const MIN_USERNAME_LENGTH: usize = 3;
pub const MAX_USERNAME_LENGTH: usize = 50;
pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_NAME_LENGTH: usize = 100;
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

pub const SESSION_COOKIE: &str = "photofeed_session";
pub const FLASH_COOKIE: &str = "photofeed_flash";

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub upload_dir: PathBuf,
    pub session_expiration_hours: i64,
    pub max_upload_bytes: usize,
    pub secure_cookies: bool,
    pub db_pool_size: u32,
}

impl Config {
    /// Reads settings from the process environment. Call `dotenvy::dotenv()`
    /// first if a `.env` file should be honored.
    pub fn from_env() -> Self {
        Self {
            host: env_string("PHOTOFEED_HOST", "127.0.0.1"),
            port: env_or("PHOTOFEED_PORT", 8080),
            database_url: env_string("DATABASE_URL", "instance/photofeed.sqlite"),
            upload_dir: PathBuf::from(env_string("PHOTOFEED_UPLOAD_DIR", "uploads")),
            session_expiration_hours: env_or("PHOTOFEED_SESSION_EXPIRATION_HOURS", 24),
            max_upload_bytes: env_or("PHOTOFEED_MAX_UPLOAD_BYTES", 10 * 1024 * 1024),
            secure_cookies: env_or("PHOTOFEED_SECURE_COOKIES", false),
            db_pool_size: env_or::<u32>("PHOTOFEED_DB_POOL_SIZE", 5).max(1),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_url: "instance/photofeed.sqlite".to_string(),
            upload_dir: PathBuf::from("uploads"),
            session_expiration_hours: 24,
            max_upload_bytes: 10 * 1024 * 1024,
            secure_cookies: false,
            db_pool_size: 5,
        }
    }
}
