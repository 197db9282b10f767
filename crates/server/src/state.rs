// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Instant;

use bioflow_core::{AppConfig, TaskRegistry};

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// Per-job-kind file policy and directory layout, immutable after startup.
    pub config: Arc<AppConfig>,
    /// Process-wide task registry. Entries live until the process exits.
    pub registry: Arc<TaskRegistry>,
}

impl AppState {
    /// Create a new application state wrapped in an Arc for sharing.
    pub fn new(config: AppConfig) -> Arc<Self> {
        Arc::new(Self {
            start_time: Instant::now(),
            config: Arc::new(config),
            registry: Arc::new(TaskRegistry::new()),
        })
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_new() {
        let tmp = tempfile::TempDir::new().unwrap();
        let state = AppState::new(AppConfig::new(tmp.path()));
        assert!(state.uptime_secs() < 1);
        assert!(state.registry.list().is_empty());
    }
}
