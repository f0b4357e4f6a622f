use std::sync::Arc;

use agent_core::ReactController;
use chrono::{DateTime, Utc};

#[derive(Clone)]
pub struct ServeState {
    pub controller: Arc<ReactController>,
    pub started_at: DateTime<Utc>,
}

impl ServeState {
    pub fn new(controller: Arc<ReactController>) -> Self {
        Self {
            controller,
            started_at: Utc::now(),
        }
    }
}
