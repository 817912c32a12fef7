//! The stowaway: hides until found, then leaves the story for good.

use super::{PhaseWord, Progress};
use crate::{actors, flags, Handler};
use couchette_scripting::{timer, Action, Effect, Message, Signal, StateMachine, Step, View};

/// Game time before the stowaway is discovered.
pub const HIDING_TIME: i32 = 450;
/// Cut-scene played when the stowaway is caught.
pub const CAUGHT_CUTSCENE: u16 = 70;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HidingPhase {
    Hiding,
    Caught,
}

impl PhaseWord for HidingPhase {
    fn from_word(word: i32) -> Self {
        match word {
            1 => HidingPhase::Caught,
            _ => HidingPhase::Hiding,
        }
    }

    fn word(self) -> i32 {
        self as i32
    }
}

pub(crate) struct Hiding;

impl StateMachine for Hiding {
    type State = Progress<HidingPhase>;
    const NAME: &'static str = "stowaway_hiding";

    fn transition(&self, mut state: Self::State, msg: &Message, view: &View<'_>) -> Step<Self::State> {
        match (state.phase, msg.action) {
            (_, Action::Start) => Step::to(Progress::at(HidingPhase::Hiding)).then(Effect::SetHidden(true)),
            (HidingPhase::Hiding, Action::Tick) => {
                if !timer::poll_deadline(&mut state.timer, view.now(), HIDING_TIME) {
                    return Step::to(state);
                }
                state.phase = HidingPhase::Caught;
                Step::to(state)
                    .then(Effect::SetHidden(false))
                    .then(Effect::SetStory(flags::STOWAWAY_CAUGHT, 1))
                    .then(Effect::interrupt(actors::CONDUCTOR, Handler::Alarm, ()))
                    .then(Effect::BeginCutscene(CAUGHT_CUTSCENE))
            }
            (HidingPhase::Caught, Action::Signal(Signal::CutsceneFinished)) => {
                Step::to(state).then(Effect::transfer(Handler::Vanish, ()))
            }
            _ => Step::to(state),
        }
    }
}
