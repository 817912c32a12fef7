//! Error taxonomy for the dispatch engine.

use couchette_core::{ActorId, ContinuationTag, HandlerId};
use thiserror::Error;

/// Result alias used by routines and engine primitives.
pub type ScriptResult<T> = Result<T, ScriptError>;

/// Faults raised while running scripts.
///
/// Only `StackOverflow`, `MissingContinuation`, `UnknownHandler` and
/// `ReservedTag` ever propagate out of a routine; the engine recovers them by
/// resetting the offending actor. `UnknownRecipient` is reported by the host-facing API but
/// is never treated as a defect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    /// A call was issued while the actor was already at the deepest level.
    #[error("{actor}: call stack overflow at depth {depth}")]
    StackOverflow {
        /// Offending actor.
        actor: ActorId,
        /// Depth at the time of the call.
        depth: u8,
    },
    /// A return was issued from the idle level.
    #[error("{actor}: return with no continuation (already at depth 0)")]
    MissingContinuation {
        /// Offending actor.
        actor: ActorId,
    },
    /// A call, transfer or jump named a routine absent from the registry.
    #[error("{actor}: {handler} is not registered")]
    UnknownHandler {
        /// Offending actor.
        actor: ActorId,
        /// Unregistered handler.
        handler: HandlerId,
    },
    /// An ordinary call used the tag that marks interrupt frames.
    #[error("{actor}: continuation tag {} is reserved for interrupts", .tag.0)]
    ReservedTag {
        /// Offending actor.
        actor: ActorId,
        /// Rejected tag.
        tag: ContinuationTag,
    },
    /// The target actor has no live call stack.
    #[error("{actor} has no live call stack")]
    UnknownRecipient {
        /// Target actor.
        actor: ActorId,
    },
    /// A save could not be loaded.
    #[error(transparent)]
    CorruptSave(#[from] CorruptSave),
}

impl ScriptError {
    /// The actor whose script is at fault, if the error names one.
    pub fn actor(&self) -> Option<ActorId> {
        match self {
            ScriptError::StackOverflow { actor, .. }
            | ScriptError::MissingContinuation { actor }
            | ScriptError::UnknownHandler { actor, .. }
            | ScriptError::ReservedTag { actor, .. }
            | ScriptError::UnknownRecipient { actor } => Some(*actor),
            ScriptError::CorruptSave(_) => None,
        }
    }

    /// Whether this is an authoring defect that the engine recovers by
    /// resetting the actor to its idle level.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ScriptError::StackOverflow { .. }
                | ScriptError::MissingContinuation { .. }
                | ScriptError::UnknownHandler { .. }
                | ScriptError::ReservedTag { .. }
        )
    }
}

/// Reasons a save is rejected. Any of them aborts the whole load.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorruptSave {
    /// File is shorter than its header or declared payload.
    #[error("save truncated: {0}")]
    Truncated(&'static str),
    /// Header magic mismatch.
    #[error("invalid save magic: expected 0x{expected:08X}, got 0x{found:08X}")]
    BadMagic {
        /// Magic this build writes.
        expected: u32,
        /// Magic found in the file.
        found: u32,
    },
    /// Save written by an incompatible format version.
    #[error("unsupported save version {0}")]
    UnsupportedVersion(u16),
    /// Payload checksum mismatch.
    #[error("CRC32 mismatch: expected {expected:08X}, got {found:08X}")]
    ChecksumMismatch {
        /// Checksum stored in the header.
        expected: u32,
        /// Checksum computed from the payload.
        found: u32,
    },
    /// Payload could not be decompressed or decoded.
    #[error("malformed save payload: {0}")]
    Malformed(String),
    /// A frame names a handler id this build does not know.
    #[error("{actor} frame at depth {depth} references unknown {handler}")]
    UnknownHandler {
        /// Actor owning the frame.
        actor: ActorId,
        /// Depth of the frame.
        depth: u8,
        /// Unrecognised id.
        handler: HandlerId,
    },
    /// A handler id is known but now names a different routine.
    #[error("{handler} was saved as `{saved}` but is registered as `{registered}`")]
    HandlerRenamed {
        /// Handler id.
        handler: HandlerId,
        /// Name recorded in the save.
        saved: String,
        /// Name in the running registry.
        registered: String,
    },
    /// Stack depth outside `[0, MAX_DEPTH]`.
    #[error("{actor} has stack depth {depth} outside the supported range")]
    DepthOutOfRange {
        /// Actor owning the stack.
        actor: ActorId,
        /// Depth read from the save.
        depth: u8,
    },
    /// A queued letter or subscription carries a signal code this build
    /// does not define.
    #[error("unknown signal code {0}")]
    UnknownSignal(u32),
    /// The same actor appears twice.
    #[error("{0} appears twice in the save")]
    DuplicateActor(ActorId),
}
