//! The passenger in compartment 3: dinner, a ticket check, then sleep.

use super::{PhaseWord, Progress};
use crate::generic::{Checkpoint, Cue, WaitFor, WalkTo};
use crate::{actors, places, Handler};
use couchette_scripting::{Action, ContinuationTag, Effect, Message, Signal, StateMachine, Step, View};

/// Line spoken when dinner arrives.
pub const DINNER_LINE: u16 = 301;
/// Line spoken when the conductor hands the ticket back.
pub const THANKS_LINE: u16 = 302;

const DIGESTION: i32 = 90;
const SLEEP_SEQUENCE: u16 = 410;
const TOSS_SEQUENCE: u16 = 411;

const TAG_TO_TABLE: i32 = 1;
const TAG_DINNER_LINE: i32 = 2;
const TAG_DIGEST: i32 = 3;
const TAG_TO_COMPARTMENT: i32 = 4;
const TAG_SAVE: i32 = 5;
const TAG_THANKS: i32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EveningPhase {
    ToTable,
    AwaitingDinner,
    Eating,
    Digesting,
    ToCompartment,
    Saving,
    Resting,
    Thanking,
}

impl PhaseWord for EveningPhase {
    fn from_word(word: i32) -> Self {
        match word {
            1 => EveningPhase::AwaitingDinner,
            2 => EveningPhase::Eating,
            3 => EveningPhase::Digesting,
            4 => EveningPhase::ToCompartment,
            5 => EveningPhase::Saving,
            6 => EveningPhase::Resting,
            7 => EveningPhase::Thanking,
            _ => EveningPhase::ToTable,
        }
    }

    fn word(self) -> i32 {
        self as i32
    }
}

pub(crate) struct Evening;

impl StateMachine for Evening {
    type State = Progress<EveningPhase>;
    const NAME: &'static str = "passenger_evening";

    fn transition(&self, state: Self::State, msg: &Message, _view: &View<'_>) -> Step<Self::State> {
        use EveningPhase::*;

        let next = |phase| Step::to(Progress::at(phase));
        match (state.phase, msg.action) {
            (_, Action::Start) => {
                next(ToTable).then(Effect::call(TAG_TO_TABLE, Handler::Walk, WalkTo(places::DINING_TABLE)))
            }
            (ToTable, Action::Resume(ContinuationTag(TAG_TO_TABLE))) => {
                next(AwaitingDinner).then(Effect::send(actors::WAITER, Signal::Knock))
            }
            (AwaitingDinner, Action::Signal(Signal::DinnerServed)) => {
                next(Eating).then(Effect::call(TAG_DINNER_LINE, Handler::Speak, Cue::new(DINNER_LINE)))
            }
            (Eating, Action::Resume(ContinuationTag(TAG_DINNER_LINE))) => {
                next(Digesting).then(Effect::call(TAG_DIGEST, Handler::Wait, WaitFor::new(DIGESTION)))
            }
            (Digesting, Action::Resume(ContinuationTag(TAG_DIGEST))) => next(ToCompartment).then(
                Effect::call(TAG_TO_COMPARTMENT, Handler::Walk, WalkTo(places::COMPARTMENT3)),
            ),
            (ToCompartment, Action::Resume(ContinuationTag(TAG_TO_COMPARTMENT))) => next(Saving)
                .then(Effect::send(actors::CONDUCTOR, Signal::TicketRequested))
                .then(Effect::call(
                    TAG_SAVE,
                    Handler::SaveGame,
                    Checkpoint { kind: 1, event: 30 },
                )),
            (Saving, Action::Resume(ContinuationTag(TAG_SAVE))) => next(Resting),
            (Resting, Action::Signal(Signal::TicketPresented)) => {
                next(Thanking).then(Effect::call(TAG_THANKS, Handler::Speak, Cue::new(THANKS_LINE)))
            }
            (Thanking, Action::Resume(ContinuationTag(TAG_THANKS))) => next(Resting),
            _ => Step::to(state),
        }
    }
}

pub(crate) struct Night;

impl StateMachine for Night {
    type State = ();
    const NAME: &'static str = "passenger_night";

    fn transition(&self, state: (), msg: &Message, _view: &View<'_>) -> Step<()> {
        match msg.action {
            Action::Start => Step::to(state)
                .then(Effect::MoveTo(places::COMPARTMENT3))
                .then(Effect::Animate(SLEEP_SEQUENCE)),
            Action::Signal(Signal::AllClear) => Step::to(state).then(Effect::Animate(TOSS_SEQUENCE)),
            _ => Step::to(state),
        }
    }
}
