use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use crate::auth::Argon2Credentials;
use crate::cmd::Backend;
use crate::db::{Db, StoreError};

#[derive(Debug, Clone, Parser)]
#[command(name = "run_server", about = "Issue tracker server", version)]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, env = "TRACKER_ADDR", default_value_t = format!("0.0.0.0:{}", crate::DEFAULT_PORT))]
    pub addr: String,

    /// Journal file to persist to (in-memory only when omitted)
    #[arg(long, env = "TRACKER_DATA")]
    pub data: Option<PathBuf>,

    /// Default log level; RUST_LOG directives take precedence
    #[arg(long, env = "TRACKER_LOG", default_value = "info")]
    pub log: tracing::Level,
}

impl ServerConfig {
    /// Opens the configured store and pairs it with the password hasher.
    pub fn backend(&self) -> Result<Backend, StoreError> {
        let db = match &self.data {
            Some(path) => Db::open(path)?,
            None => Db::in_memory(),
        };

        Ok(Backend::new(
            Arc::new(db),
            Arc::new(Argon2Credentials::default()),
        ))
    }
}
