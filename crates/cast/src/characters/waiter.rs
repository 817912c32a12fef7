//! The dining-car waiter.

use super::{PhaseWord, Progress};
use crate::generic::{Cue, WalkTo};
use crate::{actors, flags, places, Handler};
use couchette_scripting::{Action, ContinuationTag, Effect, Message, Signal, StateMachine, Step, View};

/// Memory slot raised when an order (a knock) arrives.
pub const ORDER_SLOT: u8 = 1;

const SERVE_SEQUENCE: u16 = 520;
const CLOSING_SEQUENCE: u16 = 530;

const TAG_TO_TABLE: i32 = 1;
const TAG_SERVE: i32 = 2;
const TAG_TO_PANTRY: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ServicePhase {
    Idle,
    ToTable,
    Serving,
    ToPantry,
}

impl PhaseWord for ServicePhase {
    fn from_word(word: i32) -> Self {
        match word {
            1 => ServicePhase::ToTable,
            2 => ServicePhase::Serving,
            3 => ServicePhase::ToPantry,
            _ => ServicePhase::Idle,
        }
    }

    fn word(self) -> i32 {
        self as i32
    }
}

pub(crate) struct Service;

impl StateMachine for Service {
    type State = Progress<ServicePhase>;
    const NAME: &'static str = "waiter_service";

    fn transition(&self, state: Self::State, msg: &Message, view: &View<'_>) -> Step<Self::State> {
        let next = |phase| Step::to(Progress::at(phase));
        match (state.phase, msg.action) {
            (_, Action::Start) => next(ServicePhase::Idle).then(Effect::Subscribe {
                signal: Signal::Knock,
                slot: ORDER_SLOT,
            }),
            (ServicePhase::Idle, Action::Tick) if view.me().memory[usize::from(ORDER_SLOT)] != 0 => {
                next(ServicePhase::ToTable)
                    .then(Effect::SetMemory(ORDER_SLOT, 0))
                    .then(Effect::call(TAG_TO_TABLE, Handler::Walk, WalkTo(places::DINING_TABLE)))
            }
            (ServicePhase::ToTable, Action::Resume(ContinuationTag(TAG_TO_TABLE))) => {
                next(ServicePhase::Serving).then(Effect::call(
                    TAG_SERVE,
                    Handler::Animate,
                    Cue::new(SERVE_SEQUENCE),
                ))
            }
            (ServicePhase::Serving, Action::Resume(ContinuationTag(TAG_SERVE))) => {
                next(ServicePhase::ToPantry)
                    .then(Effect::SetStory(flags::DINNER_SERVED, 1))
                    .then(Effect::signal(actors::PASSENGER, Signal::DinnerServed))
                    .then(Effect::call(TAG_TO_PANTRY, Handler::Walk, WalkTo(places::PANTRY)))
            }
            (ServicePhase::ToPantry, Action::Resume(ContinuationTag(TAG_TO_PANTRY))) => {
                next(ServicePhase::Idle)
            }
            _ => Step::to(state),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClosingPhase {
    ToPantry,
    Tidying,
}

impl PhaseWord for ClosingPhase {
    fn from_word(word: i32) -> Self {
        match word {
            1 => ClosingPhase::Tidying,
            _ => ClosingPhase::ToPantry,
        }
    }

    fn word(self) -> i32 {
        self as i32
    }
}

pub(crate) struct Closing;

impl StateMachine for Closing {
    type State = Progress<ClosingPhase>;
    const NAME: &'static str = "waiter_closing";

    fn transition(&self, state: Self::State, msg: &Message, _view: &View<'_>) -> Step<Self::State> {
        match (state.phase, msg.action) {
            (_, Action::Start) => Step::to(Progress::at(ClosingPhase::ToPantry))
                .then(Effect::Unsubscribe(Signal::Knock))
                .then(Effect::call(TAG_TO_PANTRY, Handler::Walk, WalkTo(places::PANTRY))),
            (ClosingPhase::ToPantry, Action::Resume(ContinuationTag(TAG_TO_PANTRY))) => {
                Step::to(Progress::at(ClosingPhase::Tidying)).then(Effect::call(
                    TAG_SERVE,
                    Handler::Animate,
                    Cue::new(CLOSING_SEQUENCE),
                ))
            }
            (ClosingPhase::Tidying, Action::Resume(ContinuationTag(TAG_SERVE))) => {
                Step::to(state).then(Effect::transfer(Handler::Vanish, ()))
            }
            _ => Step::to(state),
        }
    }
}
