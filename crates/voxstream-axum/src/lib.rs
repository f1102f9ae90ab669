#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

// Silence unused dev-dependency warnings for the integration tests
#[cfg(test)]
use http_body_util as _;
#[cfg(test)]
use tokio_test as _;
#[cfg(test)]
use tower as _;

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;

// Re-export primary types
pub use config::{CorsConfig, ServerConfig};
pub use error::HttpError;
pub use routes::create_router;
pub use server::start_server;
pub use state::{AppState, ConnectionGuard, SpeechContext};
