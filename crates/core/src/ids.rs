//! Small stable identifiers.
//!
//! Every identifier here is persisted verbatim in save files, so the numeric
//! representation of each is part of the save format.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU8;

/// Identity of a scripted actor.
///
/// Actor ids also define the tick order: live actors receive `Tick` in
/// ascending id order every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub u16);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor#{}", self.0)
    }
}

/// Serializable key naming a registered routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandlerId(pub u16);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler#{}", self.0)
    }
}

/// Opaque value chosen by a caller when it issues a call.
///
/// The tag is stored in the frame the call creates and handed back to the
/// caller in the `Resume` that follows that frame's return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ContinuationTag(pub i32);

impl ContinuationTag {
    /// Tag of an idle-level frame, which has no caller.
    pub const NONE: Self = Self(0);

    /// Tag reserved for priority interrupt frames.
    pub const INTERRUPT: Self = Self(i32::MIN);

    /// Whether this tag marks a priority interrupt frame.
    pub fn is_interrupt(self) -> bool {
        self == Self::INTERRUPT
    }
}

impl From<i32> for ContinuationTag {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

/// An item an actor can carry. Zero is reserved for "nothing carried".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Token(NonZeroU8);

impl Token {
    /// Build a token from its persisted byte; `0` yields `None`.
    pub fn new(raw: u8) -> Option<Self> {
        NonZeroU8::new(raw).map(Self)
    }

    /// Persisted byte for this token.
    pub fn get(self) -> u8 {
        self.0.get()
    }

    /// Persisted byte for an optional token (`0` when empty).
    pub fn encode(token: Option<Self>) -> u8 {
        token.map_or(0, Self::get)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_zero_means_empty() {
        assert_eq!(Token::new(0), None);
        let token = Token::new(7).unwrap();
        assert_eq!(Token::encode(Some(token)), 7);
        assert_eq!(Token::encode(None), 0);
    }

    #[test]
    fn interrupt_tag_is_distinct_from_default() {
        assert!(ContinuationTag::INTERRUPT.is_interrupt());
        assert!(!ContinuationTag::NONE.is_interrupt());
        assert!(!ContinuationTag::from(2).is_interrupt());
    }
}
