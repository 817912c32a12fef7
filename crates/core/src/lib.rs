#![warn(missing_docs)]
//! Core primitives shared across the workspace.

pub mod ids;
pub mod message;

use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

pub use ids::{ActorId, ContinuationTag, HandlerId, Token};
pub use message::{Action, Message, Signal, UnknownSignal};

/// Deepest call level an actor may reach. Depth 0 is the idle level, so a stack
/// holds at most `MAX_DEPTH + 1` frames.
pub const MAX_DEPTH: u8 = 8;

/// Number of parameter words carried by every frame.
pub const PARAM_SLOTS: usize = 8;

/// Number of argument words a call may pass to its callee.
pub const MAX_CALL_ARGS: usize = 4;

/// Number of persistent memory words (flags/timers) owned by each actor.
pub const MEMORY_SLOTS: usize = 16;

/// Fixed tick type; one tick is one pass of the global script loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct SimTick(pub u64);

impl SimTick {
    /// First tick in any deterministic timeline.
    pub const ZERO: Self = Self(0);

    /// Advance by `delta` ticks.
    pub fn advance(self, delta: u64) -> Self {
        Self(self.0 + delta)
    }
}

/// Helper to derive a reproducible RNG seeded by world + actor + tick domains.
///
/// Scripts never own RNG state, so nothing random has to be persisted in a save.
pub fn scoped_rng(world_seed: u64, actor: ActorId, tick: SimTick) -> StdRng {
    let actor_hash = u64::from(actor.0).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let seed = world_seed ^ actor_hash ^ tick.0;
    StdRng::seed_from_u64(seed)
}
