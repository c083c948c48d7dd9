//! Shared state for the application-level routes.

use crate::session::SessionManager;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
}
