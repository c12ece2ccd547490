use crate::errors::{AppError, AppResult};
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_DB_PATH: &str = "./data/artistos.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_host: String,
    pub port: u16,
    pub db_path: PathBuf,
    /// When set, logs roll daily into this directory instead of stdout.
    pub log_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_host: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            log_dir: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source. Blank values are
    /// treated as unset.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).map(|value| value.trim().to_string()).filter(|value| !value.is_empty());
        let defaults = Self::default();

        let port = match read("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| AppError::Validation(format!("Invalid port value: {raw}")))?,
            None => defaults.port,
        };

        Ok(Self {
            bind_host: read("ARTISTOS_BIND").unwrap_or(defaults.bind_host),
            port,
            db_path: read("ARTISTOS_DB_PATH").map(PathBuf::from).unwrap_or(defaults.db_path),
            log_dir: read("ARTISTOS_LOG_DIR").map(PathBuf::from),
        })
    }

    pub fn socket_addr(&self) -> AppResult<SocketAddr> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>()
            .map_err(|err| AppError::Validation(format!("Invalid bind address {addr}: {err}")))
    }
}
