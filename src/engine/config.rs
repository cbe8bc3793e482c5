// engine-level knobs, separate from protocol economics

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    // event log ring size; oldest events drop past this
    pub max_events: usize,
    // print events as they are emitted
    pub verbose: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_events: 10_000,
            verbose: false,
        }
    }
}
