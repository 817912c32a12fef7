//! Deadline helpers over persisted words.
//!
//! Timers live in frame params or actor memory so they survive saves. A slot
//! holding `0` is unarmed, any other value is an absolute game-time deadline,
//! and [`DISARMED`] means "already fired".

/// Slot value of a timer that already fired.
pub const DISARMED: i32 = i32::MAX;

/// One-shot deadline. Arms the slot at `now + delay` on first poll and returns
/// `true` exactly once, on the first poll where `now` is past the deadline.
pub fn poll_deadline(slot: &mut i32, now: i32, delay: i32) -> bool {
    if *slot == 0 {
        *slot = now.saturating_add(delay);
        if *slot == 0 {
            *slot = DISARMED;
            return true;
        }
    }
    if *slot >= now {
        return false;
    }
    *slot = DISARMED;
    true
}

/// Repeating deadline. Fires every time `now` passes the slot, then re-arms
/// `period` later.
pub fn poll_interval(slot: &mut i32, now: i32, period: i32) -> bool {
    if *slot == 0 {
        *slot = now.saturating_add(period);
    }
    if *slot >= now {
        return false;
    }
    *slot = now.saturating_add(period);
    true
}

/// Put a slot back into the unarmed state.
pub fn rearm(slot: &mut i32) {
    *slot = 0;
}

/// Whether a slot already fired.
pub fn has_fired(slot: i32) -> bool {
    slot == DISARMED
}
