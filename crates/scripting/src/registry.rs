//! Handler registry: stable numeric ids for live routines.
//!
//! Routine identity has to survive a save file, so frames store a
//! [`HandlerId`] and the registry resolves it back to the routine at dispatch
//! and load time. The registry is assembled once through a
//! [`RegistryBuilder`] and is immutable afterwards.

use crate::context::Ctx;
use crate::error::ScriptResult;
use crate::routine::{Machine, StateMachine};
use couchette_core::{HandlerId, Message};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// A routine that can sit on a call stack and receive messages.
pub trait Routine: Send + Sync {
    /// Stable, human-readable name; recorded in saves next to the id.
    fn name(&self) -> &'static str;

    /// Handle one message. Runs synchronously to completion.
    fn handle(&self, ctx: &mut Ctx<'_>, msg: &Message) -> ScriptResult<()>;
}

/// Errors raised while assembling a registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Two routines claimed the same id.
    #[error("{id} registered twice (`{existing}` and `{incoming}`)")]
    DuplicateId {
        /// Contested id.
        id: HandlerId,
        /// Routine registered first.
        existing: &'static str,
        /// Routine registered second.
        incoming: &'static str,
    },
    /// Two ids claimed the same routine name.
    #[error("routine `{name}` registered under both {first} and {second}")]
    DuplicateName {
        /// Contested name.
        name: &'static str,
        /// Id registered first.
        first: HandlerId,
        /// Id registered second.
        second: HandlerId,
    },
}

/// Immutable table translating handler ids to routines and back.
#[derive(Default)]
pub struct HandlerRegistry {
    routines: BTreeMap<HandlerId, Box<dyn Routine>>,
    ids: BTreeMap<&'static str, HandlerId>,
}

impl HandlerRegistry {
    /// Start assembling a registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Routine registered under `id`.
    pub fn lookup(&self, id: HandlerId) -> Option<&dyn Routine> {
        self.routines.get(&id).map(|routine| routine.as_ref())
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: HandlerId) -> bool {
        self.routines.contains_key(&id)
    }

    /// Inverse lookup: id of the routine named `name`.
    pub fn id_of(&self, name: &str) -> Option<HandlerId> {
        self.ids.get(name).copied()
    }

    /// Name of the routine registered under `id`.
    pub fn name_of(&self, id: HandlerId) -> Option<&'static str> {
        self.routines.get(&id).map(|routine| routine.name())
    }

    /// Number of registered routines.
    pub fn len(&self) -> usize {
        self.routines.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.routines.is_empty()
    }

    /// Registered `(id, name)` pairs in id order.
    pub fn entries(&self) -> impl Iterator<Item = (HandlerId, &'static str)> + '_ {
        self.routines
            .iter()
            .map(|(id, routine)| (*id, routine.name()))
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries()).finish()
    }
}

/// Collects routines before freezing them into a [`HandlerRegistry`].
#[derive(Default)]
pub struct RegistryBuilder {
    registry: HandlerRegistry,
}

impl RegistryBuilder {
    /// Register `routine` under `id`.
    pub fn register<R>(&mut self, id: impl Into<HandlerId>, routine: R) -> Result<(), RegistryError>
    where
        R: Routine + 'static,
    {
        let id = id.into();
        let name = routine.name();
        if let Some(existing) = self.registry.routines.get(&id) {
            return Err(RegistryError::DuplicateId {
                id,
                existing: existing.name(),
                incoming: name,
            });
        }
        if let Some(first) = self.registry.ids.get(name) {
            return Err(RegistryError::DuplicateName {
                name,
                first: *first,
                second: id,
            });
        }
        self.registry.ids.insert(name, id);
        self.registry.routines.insert(id, Box::new(routine));
        Ok(())
    }

    /// Register a [`StateMachine`] under `id`.
    pub fn register_machine<M>(&mut self, id: impl Into<HandlerId>, machine: M) -> Result<(), RegistryError>
    where
        M: StateMachine,
    {
        self.register(id, Machine(machine))
    }

    /// Freeze the table.
    pub fn build(self) -> HandlerRegistry {
        tracing::debug!(routines = self.registry.len(), "handler registry built");
        self.registry
    }
}
