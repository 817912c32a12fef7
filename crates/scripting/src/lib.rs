#![warn(missing_docs)]
//! Continuation-based message dispatch for tick-driven actor scripts.
//!
//! Each [`Actor`] owns a bounded [`CallStack`] of [`Frame`]s. A routine that
//! wants to "walk there, then wait" calls into a walk routine and is resumed,
//! with the continuation tag it chose, when the walk returns. Everything a
//! script needs to continue later lives in frames and actor memory, so a
//! [`World`] can be saved at any tick and resumed byte for byte.

pub mod actor;
pub mod cast;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod frame;
pub mod journal;
pub mod persist;
pub mod registry;
pub mod routine;
pub mod stack;
pub mod stage;
pub mod timer;
pub mod world;

pub use actor::{Actor, ActorStatus, Memory, Position};
pub use cast::{Cast, Role};
pub use config::{EngineConfig, InterruptPolicy};
pub use context::Ctx;
pub use engine::{Delivery, Engine, TickReport};
pub use error::{CorruptSave, ScriptError, ScriptResult};
pub use frame::{CallArgs, Frame, Locals, Params};
pub use journal::{Journal, JournalEntry, Phase};
pub use persist::SaveError;
pub use registry::{HandlerRegistry, RegistryBuilder, RegistryError, Routine};
pub use routine::{Effect, Machine, StateMachine, Step, View};
pub use stack::CallStack;
pub use stage::{HeadlessStage, SavePoint, Stage, StageEvent};
pub use world::{Clock, Cutscene, Letter, StoryFlag, Subscription, World};

pub use couchette_core::{
    Action, ActorId, ContinuationTag, HandlerId, Message, Signal, SimTick, Token, MAX_CALL_ARGS,
    MAX_DEPTH, MEMORY_SLOTS, PARAM_SLOTS,
};
