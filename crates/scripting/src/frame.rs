//! Frames: one level of an actor's call stack.

use couchette_core::{ContinuationTag, HandlerId, MAX_CALL_ARGS, PARAM_SLOTS};
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Parameter words local to one call, persisted across ticks until return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Params([i32; PARAM_SLOTS]);

impl Params {
    /// All-zero parameter block.
    pub const ZERO: Self = Self([0; PARAM_SLOTS]);

    /// Wrap raw words (used by the save loader).
    pub fn from_words(words: [i32; PARAM_SLOTS]) -> Self {
        Self(words)
    }

    /// Parameters initialised from call arguments, remaining slots zeroed.
    pub fn from_args(args: CallArgs) -> Self {
        let mut words = [0; PARAM_SLOTS];
        words[..MAX_CALL_ARGS].copy_from_slice(&args.0);
        Self(words)
    }

    /// Raw words.
    pub fn words(&self) -> &[i32; PARAM_SLOTS] {
        &self.0
    }

    /// Zero every slot.
    pub fn clear(&mut self) {
        self.0 = [0; PARAM_SLOTS];
    }
}

impl Index<usize> for Params {
    type Output = i32;

    fn index(&self, slot: usize) -> &i32 {
        &self.0[slot]
    }
}

impl IndexMut<usize> for Params {
    fn index_mut(&mut self, slot: usize) -> &mut i32 {
        &mut self.0[slot]
    }
}

/// Up to `MAX_CALL_ARGS` words handed from a caller to its callee.
///
/// Callees usually define a typed argument struct with a `From` impl into
/// `CallArgs`, paired with a [`Locals`] impl reading the same slots back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallArgs([i32; MAX_CALL_ARGS]);

impl CallArgs {
    /// No arguments.
    pub const NONE: Self = Self([0; MAX_CALL_ARGS]);

    /// Build from at most `MAX_CALL_ARGS` words.
    pub fn new<const N: usize>(words: [i32; N]) -> Self {
        const { assert!(N <= MAX_CALL_ARGS, "too many call arguments") };
        let mut padded = [0; MAX_CALL_ARGS];
        padded[..N].copy_from_slice(&words);
        Self(padded)
    }

    /// Raw words.
    pub fn words(&self) -> &[i32; MAX_CALL_ARGS] {
        &self.0
    }
}

impl<const N: usize> From<[i32; N]> for CallArgs {
    fn from(words: [i32; N]) -> Self {
        Self::new(words)
    }
}

impl From<()> for CallArgs {
    fn from(_: ()) -> Self {
        Self::NONE
    }
}

/// Typed view over a frame's parameter words.
///
/// Implementors decide which slots hold what; the engine only ever moves the
/// raw words around.
pub trait Locals: Sized {
    /// Decode from parameter words.
    fn load(params: &Params) -> Self;

    /// Encode into parameter words.
    fn store(&self, params: &mut Params);
}

impl Locals for () {
    fn load(_: &Params) -> Self {}

    fn store(&self, _: &mut Params) {}
}

impl Locals for Params {
    fn load(params: &Params) -> Self {
        *params
    }

    fn store(&self, params: &mut Params) {
        *params = *self;
    }
}

/// One level of a call stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Frame {
    /// Routine active at this level.
    pub handler: HandlerId,
    /// Tag chosen by the level below when it called into this frame.
    pub tag: ContinuationTag,
    /// Call-local parameter words.
    pub params: Params,
}

impl Frame {
    /// Frame for a fresh call.
    pub fn new(handler: HandlerId, tag: ContinuationTag, args: CallArgs) -> Self {
        Self {
            handler,
            tag,
            params: Params::from_args(args),
        }
    }

    /// Idle-level frame (no caller, so no continuation tag).
    pub fn idle(handler: HandlerId) -> Self {
        Self::new(handler, ContinuationTag::NONE, CallArgs::NONE)
    }
}
