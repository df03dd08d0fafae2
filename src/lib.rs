pub mod auth;
pub mod client;
pub mod cmd;
pub mod config;
pub mod connection;
pub mod db;
pub mod frame;
pub mod model;
pub mod server;
pub mod session;

pub const DEFAULT_PORT: u16 = 9999;

/// Every field on the wire is joined with this token.
pub const SEPARATOR: &str = "|-|";

/// Sent standalone by a client that wants the server to close the connection.
pub const DISCONNECT: &str = "disconnect";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Frame(#[from] frame::Error),

    #[error(transparent)]
    Parse(#[from] cmd::ParseError),

    #[error(transparent)]
    Store(#[from] db::StoreError),

    #[error(transparent)]
    Auth(#[from] auth::AuthError),

    #[error("connection reset by peer")]
    ConnectionReset,

    #[error("server closed the connection")]
    ServerClosed,
}

pub type Result<T> = std::result::Result<T, Error>;
