//! Server side of the research service: environment configuration and the
//! websocket listener that runs one research task per connection.

pub mod config;
pub mod server;

pub use config::{from_env, AppConfig, ConfigError};
pub use server::{serve, WS_PATH};
