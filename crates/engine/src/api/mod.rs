//! HTTP and WebSocket surface.

pub mod http;
pub mod relay;

pub use http::routes;
pub use relay::ws_handler;
