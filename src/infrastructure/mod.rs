pub mod config;
pub mod server_impl;

pub use config::{ConfigError, ServerConfig};
pub use server_impl::server::Transport;
