//! Engine tuning knobs. Loading them from disk is the host's job.

use serde::{Deserialize, Serialize};

/// What to do when a priority interrupt arrives while another interrupt is
/// still running on the same actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptPolicy {
    /// Push the new interrupt on top of the running one.
    #[default]
    Nest,
    /// Ignore the new interrupt.
    Refuse,
}

/// Runtime configuration for an [`Engine`](crate::Engine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Game-time units added per tick.
    pub time_speed: i32,
    /// Nested interrupt handling.
    pub interrupt_policy: InterruptPolicy,
    /// Record dispatch begin/end entries in the world journal.
    pub record_journal: bool,
    /// Capacity of the deferred message queue.
    pub max_queued_messages: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            time_speed: 3,
            interrupt_policy: InterruptPolicy::Nest,
            record_journal: false,
            max_queued_messages: 256,
        }
    }
}
