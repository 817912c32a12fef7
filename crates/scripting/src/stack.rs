//! Bounded per-actor call stack.

use crate::frame::Frame;
use couchette_core::MAX_DEPTH;

/// Ordered frames owned by exactly one actor.
///
/// Invariant: at least one frame (depth 0, the idle level) and at most
/// `MAX_DEPTH + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallStack {
    frames: Vec<Frame>,
}

impl CallStack {
    /// Stack holding only an idle-level frame.
    pub fn new(idle: Frame) -> Self {
        let mut frames = Vec::with_capacity(usize::from(MAX_DEPTH) + 1);
        frames.push(idle);
        Self { frames }
    }

    /// Rebuild a stack from saved frames, bottom first. Returns `None` when the
    /// frame count does not describe a depth in `[0, MAX_DEPTH]`.
    pub fn from_frames(frames: Vec<Frame>) -> Option<Self> {
        if frames.is_empty() || frames.len() > usize::from(MAX_DEPTH) + 1 {
            return None;
        }
        Some(Self { frames })
    }

    /// Current depth (0 = idle level).
    pub fn depth(&self) -> u8 {
        (self.frames.len() - 1) as u8
    }

    /// Whether another call fits.
    pub fn is_full(&self) -> bool {
        self.depth() >= MAX_DEPTH
    }

    /// Active frame.
    pub fn top(&self) -> &Frame {
        &self.frames[self.frames.len() - 1]
    }

    /// Active frame, mutably.
    pub fn top_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    /// Frame at `depth`, if that level exists.
    pub fn frame(&self, depth: u8) -> Option<&Frame> {
        self.frames.get(usize::from(depth))
    }

    /// All frames, bottom (idle level) first.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Push a frame. Hands the frame back when the stack is already at
    /// `MAX_DEPTH`, leaving existing frames untouched.
    pub fn push(&mut self, frame: Frame) -> Result<(), Frame> {
        if self.is_full() {
            return Err(frame);
        }
        self.frames.push(frame);
        Ok(())
    }

    /// Pop the active frame. The idle level is never popped.
    pub fn pop(&mut self) -> Option<Frame> {
        if self.frames.len() == 1 {
            return None;
        }
        self.frames.pop()
    }

    /// Replace the active frame in place.
    pub fn replace_top(&mut self, frame: Frame) {
        *self.top_mut() = frame;
    }

    /// Drop every frame above the idle level. Returns how many were dropped.
    pub fn unwind_to_idle(&mut self) -> usize {
        let dropped = self.frames.len() - 1;
        self.frames.truncate(1);
        dropped
    }

    /// Reset to a single idle-level frame.
    pub fn reset(&mut self, idle: Frame) {
        self.frames.clear();
        self.frames.push(idle);
    }

    /// Whether any frame on the stack is a pending priority interrupt.
    pub fn has_pending_interrupt(&self) -> bool {
        self.frames.iter().any(|frame| frame.tag.is_interrupt())
    }
}
