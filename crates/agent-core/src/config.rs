//! Configuration for the Reason-Act controller.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Oracle decisions per inbound message before giving up.
    /// Default: 5
    pub max_turns: u32,

    /// Most recent history turns included in each decision prompt.
    /// Default: 10
    pub history_window: usize,

    /// Buffered progress messages between the screening tool and the stream.
    /// Default: 1000
    pub progress_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_turns: 5,
            history_window: 10,
            progress_capacity: 1000,
        }
    }
}

impl ControllerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: ControllerConfig = serde_json::from_str(r#"{"max_turns": 3}"#).unwrap();
        assert_eq!(config.max_turns, 3);
        assert_eq!(config.history_window, 10);
        assert_eq!(config.progress_capacity, 1000);
    }

    #[test]
    fn zero_turns_is_clamped() {
        assert_eq!(ControllerConfig::new().with_max_turns(0).max_turns, 1);
    }
}
