//! The four scripted characters.

mod conductor;
mod passenger;
mod stowaway;
mod waiter;

use crate::Handler;
use couchette_scripting::{Locals, Params, RegistryBuilder, RegistryError};

pub use conductor::{ROUND_REST, TICKET_SLOT};
pub use passenger::{DINNER_LINE, THANKS_LINE};
pub use stowaway::{CAUGHT_CUTSCENE, HIDING_TIME};
pub use waiter::ORDER_SLOT;

/// Phase enums persisted as one parameter word.
pub(crate) trait PhaseWord: Copy {
    fn from_word(word: i32) -> Self;
    fn word(self) -> i32;
}

/// Character state: a phase plus one timer word. Lives in the two topmost
/// parameter slots so it never collides with call arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Progress<P> {
    pub phase: P,
    pub timer: i32,
}

impl<P: PhaseWord> Progress<P> {
    pub fn at(phase: P) -> Self {
        Self { phase, timer: 0 }
    }
}

impl<P: PhaseWord> Locals for Progress<P> {
    fn load(params: &Params) -> Self {
        Self {
            phase: P::from_word(params[6]),
            timer: params[7],
        }
    }

    fn store(&self, params: &mut Params) {
        params[6] = self.phase.word();
        params[7] = self.timer;
    }
}

pub(crate) fn register(builder: &mut RegistryBuilder) -> Result<(), RegistryError> {
    builder.register_machine(Handler::ConductorRounds, conductor::Rounds)?;
    builder.register_machine(Handler::ConductorNight, conductor::Night)?;
    builder.register_machine(Handler::PassengerEvening, passenger::Evening)?;
    builder.register_machine(Handler::PassengerNight, passenger::Night)?;
    builder.register_machine(Handler::WaiterService, waiter::Service)?;
    builder.register_machine(Handler::WaiterClosing, waiter::Closing)?;
    builder.register_machine(Handler::StowawayHiding, stowaway::Hiding)?;
    Ok(())
}
