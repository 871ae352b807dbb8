// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Deferred command buffer: queue world mutations while iterating a query,
//! then apply them all afterward. Exists because the store has no
//! reentrancy story of its own — see `World`'s module doc.

use crate::component::Component;
use crate::entity::EntityId;
use crate::error::Result;
use crate::world::World;

/// Type alias for world mutation closures.
pub type CommandClosure = Box<dyn FnOnce(&mut World) -> Result<()> + Send>;

/// A single deferred mutation.
pub enum Command {
    /// Despawn an entity.
    Despawn(EntityId),

    /// Any other world mutation, boxed as a closure.
    Custom(CommandClosure),
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Despawn(e) => f.debug_tuple("Despawn").field(e).finish(),
            Command::Custom(_) => write!(f, "Custom(...)"),
        }
    }
}

/// Queue of commands applied in order against a `World` by [`Self::apply`].
#[derive(Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            commands: Vec::with_capacity(capacity),
        }
    }

    pub fn despawn(&mut self, entity: EntityId) {
        self.commands.push(Command::Despawn(entity));
    }

    /// Queue an arbitrary world mutation.
    pub fn add<F>(&mut self, f: F)
    where
        F: FnOnce(&mut World) -> Result<()> + Send + 'static,
    {
        self.commands.push(Command::Custom(Box::new(f)));
    }

    pub fn add_component<T: Component>(&mut self, entity: EntityId, component: T) {
        self.add(move |world| world.add_component(entity, component).map(|_| ()));
    }

    pub fn remove_component<T: Component>(&mut self, entity: EntityId) {
        self.add(move |world| world.remove_component::<T>(entity));
    }

    /// Apply every queued command to `world`, in order, then clear the
    /// buffer. Stops at the first failing command, leaving the rest queued.
    pub fn apply(&mut self, world: &mut World) -> Result<()> {
        for command in self.commands.drain(..) {
            match command {
                Command::Despawn(entity) => world.destroy_entity(entity)?,
                Command::Custom(f) => f(world)?,
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_tracks_length() {
        let mut buffer = CommandBuffer::new();
        assert!(buffer.is_empty());
        buffer.despawn(EntityId::dangling());
        assert_eq!(buffer.len(), 1);
        buffer.clear();
        assert_eq!(buffer.len(), 0);
    }

    #[test]
    fn apply_runs_queued_mutations_against_a_world() {
        let mut world = World::new();
        let entity = world.create_entity(true);
        let mut buffer = CommandBuffer::new();
        buffer.add_component(entity, 7u32);
        buffer.apply(&mut world).unwrap();
        assert_eq!(world.get_component::<u32>(entity), Some(&7));

        buffer.despawn(entity);
        buffer.apply(&mut world).unwrap();
        assert!(!world.is_alive(entity));
    }
}
