//! Hand-rolled HTTP/1.1 transport.

pub mod codec;
pub mod connection;
pub mod error;
pub mod event_loop;
pub mod request;
pub mod response;
pub mod router;
pub mod server;
pub mod template;
