use application::ListPolicy;
use clap::{Parser, ValueEnum};
use infrastructure::factory::{DEFAULT_COLLECTION, DEFAULT_CONNECTION_URI, DEFAULT_DATABASE};
use infrastructure::{BackendConfig, BackendType};
use std::net::SocketAddr;

pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    Memory,
    #[value(alias = "mongo", alias = "mongodb")]
    Document,
}

/// Answer to `GET /api/v1/accounts` when there is nothing stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmptyListArg {
    NotFound,
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Service configuration; every flag can also be supplied through its env var.
#[derive(Parser, Debug, Clone)]
#[command(name = "accounts-api", version, about = "Account REST API")]
pub struct Config {
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    #[arg(long, env = "ACCOUNTS_BACKEND", value_enum, default_value_t = BackendArg::Memory)]
    pub backend: BackendArg,

    #[arg(long, env = "MONGODB_URI", default_value = DEFAULT_CONNECTION_URI)]
    pub mongodb_uri: String,

    #[arg(long, env = "MONGODB_DATABASE", default_value = DEFAULT_DATABASE)]
    pub database: String,

    #[arg(long, env = "MONGODB_COLLECTION", default_value = DEFAULT_COLLECTION)]
    pub collection: String,

    #[arg(long, env = "ACCOUNTS_EMPTY_LIST", value_enum, default_value_t = EmptyListArg::NotFound)]
    pub empty_list: EmptyListArg,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Config {
    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }

    pub fn list_policy(&self) -> ListPolicy {
        match self.empty_list {
            EmptyListArg::NotFound => ListPolicy::NotFound,
            EmptyListArg::Empty => ListPolicy::EmptyOk,
        }
    }

    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            backend: match self.backend {
                BackendArg::Memory => BackendType::Memory,
                BackendArg::Document => BackendType::Document,
            },
            connection_uri: self.mongodb_uri.clone(),
            database: self.database.clone(),
            collection: self.collection.clone(),
            list_policy: self.list_policy(),
        }
    }
}
