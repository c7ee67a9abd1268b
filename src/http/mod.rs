//! HTTP API surface.

mod handlers;
mod middleware;
mod server;

pub use handlers::{ping, stats, PingResponse};
pub use middleware::{client_identifier, rate_limit_middleware};
pub use server::{router, HttpServer};
