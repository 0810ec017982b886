//! Server Adapter - HTTP and WebSocket Surface
//!
//! axum 0.7 router exposing the REST endpoints and the real-time channel.

pub mod error;
pub mod routes;
pub mod state;
pub mod ws;

pub use error::ApiError;
pub use routes::build_router;
pub use state::AppState;
