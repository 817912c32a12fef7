//! Dispatch journal: an ordered record of every delivery the engine makes.

use couchette_core::{ActorId, HandlerId, Message};
use serde::{Deserialize, Serialize};

/// Which half of a delivery an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Routine about to run.
    Begin,
    /// Routine finished.
    End,
    /// Message was not delivered (no live recipient).
    Dropped,
    /// Message was absorbed by an auto-message subscription.
    Absorbed,
}

/// One journal line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Tick during which the delivery happened.
    pub tick: u64,
    /// Begin/end marker.
    pub phase: Phase,
    /// Sending actor.
    pub sender: ActorId,
    /// Receiving actor.
    pub recipient: ActorId,
    /// Action code on the wire.
    pub action: u32,
    /// Message parameter.
    pub param: i32,
    /// Routine that handled the message, when one did.
    pub handler: Option<HandlerId>,
    /// Recipient stack depth when the entry was written.
    pub depth: u8,
    /// Number of deliveries already in flight underneath this one.
    pub nesting: u8,
}

/// Append-only list of [`JournalEntry`] values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    /// Empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(
        &mut self,
        tick: u64,
        phase: Phase,
        msg: &Message,
        handler: Option<HandlerId>,
        depth: u8,
        nesting: usize,
    ) {
        self.entries.push(JournalEntry {
            tick,
            phase,
            sender: msg.sender,
            recipient: msg.recipient,
            action: msg.action.code(),
            param: msg.param,
            handler,
            depth,
            nesting: u8::try_from(nesting).unwrap_or(u8::MAX),
        });
    }

    /// Entries in recording order.
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Take every entry recorded so far, leaving the journal empty.
    pub fn drain(&mut self) -> Vec<JournalEntry> {
        std::mem::take(&mut self.entries)
    }

    /// Whether deliveries to `actor` are properly nested: every begin is
    /// closed by an end before a sibling delivery to the same actor begins
    /// at the same nesting level.
    pub fn is_well_nested_for(&self, actor: ActorId) -> bool {
        let mut open: Vec<u8> = Vec::new();
        for entry in self.entries.iter().filter(|e| e.recipient == actor) {
            match entry.phase {
                Phase::Begin => {
                    if open.last().is_some_and(|level| *level >= entry.nesting) {
                        return false;
                    }
                    open.push(entry.nesting);
                }
                Phase::End => {
                    if open.pop() != Some(entry.nesting) {
                        return false;
                    }
                }
                Phase::Dropped | Phase::Absorbed => {}
            }
        }
        open.is_empty()
    }
}
