//! Message layer: the closed action namespace shared by every routine.

use crate::ids::{ActorId, ContinuationTag};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Narrative event exchanged between routines.
///
/// The numeric codes are persisted (queued messages, subscriptions) and must
/// never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
#[repr(u32)]
pub enum Signal {
    /// A dialog line started by the recipient finished playing.
    DialogFinished = 2,
    /// An animation sequence started by the recipient finished.
    SequenceFinished = 3,
    /// Someone bumped into the recipient in a corridor.
    Bumped = 5,
    /// The recipient is asked to let somebody pass.
    ExcuseMe = 6,
    /// Somebody knocked on the recipient's door.
    Knock = 8,
    /// Somebody tried to open the recipient's door.
    OpenDoor = 9,
    /// The visitor left the recipient's compartment.
    LeftCompartment = 17,
    /// A blocking cut-scene owned by the recipient ended.
    CutsceneFinished = 20,
    /// The conductor asks the recipient for a ticket.
    TicketRequested = 100,
    /// The recipient presented a ticket to the sender.
    TicketPresented = 101,
    /// Dinner service started in the dining car.
    DinnerServed = 102,
    /// The train alarm was pulled.
    AlarmRaised = 103,
    /// The alarm was cleared.
    AllClear = 104,
    /// The sender arrived where the recipient asked to meet.
    CompanionArrived = 105,
}

impl Signal {
    /// Every signal, in code order.
    pub const ALL: [Signal; 14] = [
        Signal::DialogFinished,
        Signal::SequenceFinished,
        Signal::Bumped,
        Signal::ExcuseMe,
        Signal::Knock,
        Signal::OpenDoor,
        Signal::LeftCompartment,
        Signal::CutsceneFinished,
        Signal::TicketRequested,
        Signal::TicketPresented,
        Signal::DinnerServed,
        Signal::AlarmRaised,
        Signal::AllClear,
        Signal::CompanionArrived,
    ];

    /// Stable numeric code.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Resolve a stable numeric code.
    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            2 => Some(Self::DialogFinished),
            3 => Some(Self::SequenceFinished),
            5 => Some(Self::Bumped),
            6 => Some(Self::ExcuseMe),
            8 => Some(Self::Knock),
            9 => Some(Self::OpenDoor),
            17 => Some(Self::LeftCompartment),
            20 => Some(Self::CutsceneFinished),
            100 => Some(Self::TicketRequested),
            101 => Some(Self::TicketPresented),
            102 => Some(Self::DinnerServed),
            103 => Some(Self::AlarmRaised),
            104 => Some(Self::AllClear),
            105 => Some(Self::CompanionArrived),
            _ => None,
        }
    }
}

/// Error returned for a signal code outside the closed enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown signal code {0}")]
pub struct UnknownSignal(pub u32);

impl TryFrom<u32> for Signal {
    type Error = UnknownSignal;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or(UnknownSignal(code))
    }
}

impl From<Signal> for u32 {
    fn from(signal: Signal) -> Self {
        signal.code()
    }
}

/// What a message asks its recipient to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Periodic poll delivered once per tick.
    Tick,
    /// Begin a freshly called routine.
    Start,
    /// Control came back from a returned frame created with this tag.
    Resume(ContinuationTag),
    /// Narrative event.
    Signal(Signal),
}

impl Action {
    /// Wire code of `Tick`.
    pub const TICK_CODE: u32 = 0;
    /// Wire code of `Start`.
    pub const START_CODE: u32 = 12;
    /// Wire code of `Resume`.
    pub const RESUME_CODE: u32 = 18;

    /// Numeric action code, as written to journals.
    pub const fn code(self) -> u32 {
        match self {
            Action::Tick => Self::TICK_CODE,
            Action::Start => Self::START_CODE,
            Action::Resume(_) => Self::RESUME_CODE,
            Action::Signal(signal) => signal.code(),
        }
    }

    /// Whether the action is one the engine itself issues.
    pub const fn is_reserved(self) -> bool {
        !matches!(self, Action::Signal(_))
    }
}

impl From<Signal> for Action {
    fn from(signal: Signal) -> Self {
        Action::Signal(signal)
    }
}

/// An ephemeral event, passed by value into dispatch and never stored by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent it.
    pub sender: ActorId,
    /// Whose active routine receives it.
    pub recipient: ActorId,
    /// What is being asked.
    pub action: Action,
    /// Free integer payload agreed between sender and recipient.
    pub param: i32,
}

impl Message {
    /// Build a message.
    pub fn new(sender: ActorId, recipient: ActorId, action: Action, param: i32) -> Self {
        Self {
            sender,
            recipient,
            action,
            param,
        }
    }

    /// An actor addressing itself with an engine-issued action.
    pub fn to_self(actor: ActorId, action: Action) -> Self {
        Self::new(actor, actor, action, 0)
    }

    /// The narrative signal carried by this message, if any.
    pub fn signal(&self) -> Option<Signal> {
        match self.action {
            Action::Signal(signal) => Some(signal),
            _ => None,
        }
    }
}
