#![deny(
    missing_copy_implementations,
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts
)]

pub mod api;
pub mod domain;

pub mod application;
pub mod infrastructure;

pub use infrastructure::server_impl::request::{Method, Request, RequestMetadata};
pub use infrastructure::server_impl::response::{JsonResponse, Response, StatusCode};
pub use infrastructure::server_impl::router::{Handler, Router};
pub use infrastructure::{ConfigError, ServerConfig, Transport};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub type AnyResult<T> = eyre::Result<T>;
