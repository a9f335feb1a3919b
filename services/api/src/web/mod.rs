pub mod auth;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

pub use middleware::require_auth;
pub use rest::profile_handler;
// Re-export the main WebSocket handler to make it easily accessible
// to the binaries that build the web server router.
pub use ws_handler::ws_handler;
