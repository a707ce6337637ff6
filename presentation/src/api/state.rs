//! Shared handler state

use consensus_application::JobRegistry;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<JobRegistry>,
}

impl AppState {
    pub fn new(registry: Arc<JobRegistry>) -> Self {
        Self { registry }
    }
}
