//! services/api/src/web/state.rs
//!
//! Defines the application state shared by every handler.

use crate::config::Config;
use std::sync::Arc;
use tutor_core::ports::UserStore;
use tutor_core::tutor::Tutor;

/// The shared application state, created once at startup and passed to all handlers.
///
/// Per-connection chat state lives in the WebSocket task, not here.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub tutor: Arc<Tutor>,
    /// Used directly for the auth session table.
    pub users: Arc<dyn UserStore>,
}
