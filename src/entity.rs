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

//! Entity identifiers, generation-tagged records, and the manager that
//! allocates and recycles them.

use crate::chunked_vec::ChunkedVec;
use crate::error::EcsError;

/// A 32-bit index plus a 32-bit generation. Two handles are equal iff both
/// fields match; a handle is *live* only if it matches the manager's
/// current record for that index (see [`EntityManager::is_alive`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId {
    pub index: u32,
    pub generation: u32,
}

impl EntityId {
    pub const fn dangling() -> Self {
        Self {
            index: u32::MAX,
            generation: 0,
        }
    }
}

/// Lifecycle state of an entity-record slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    Alive,
    Dead,
    /// Destruction in progress: observers are firing but the row has not
    /// yet been removed from its archetype.
    InDestruction,
    /// Queued for destruction by a deferred command, not yet started.
    DelayedDestruction,
}

/// Where an entity's components live, plus the bookkeeping needed to
/// validate handles and gate iteration.
#[derive(Debug, Clone, Copy)]
pub struct EntityRecord {
    pub generation: u32,
    pub state: EntityState,
    pub active: bool,
    pub archetype_id: Option<usize>,
    pub row: usize,
}

impl EntityRecord {
    fn fresh(generation: u32, active: bool) -> Self {
        Self {
            generation,
            state: EntityState::Alive,
            active,
            archetype_id: None,
            row: 0,
        }
    }
}

/// Allocates entity ids with generation tags, recycles freed indices, and
/// maps each live id to its current archetype/row.
pub struct EntityManager {
    records: ChunkedVec<EntityRecord>,
    free_list: Vec<u32>,
}

impl EntityManager {
    pub fn new() -> Self {
        Self::with_chunk_size(100)
    }

    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            records: ChunkedVec::with_chunk_size(chunk_size),
            free_list: Vec::new(),
        }
    }

    /// Allocate a new entity id. Recycles a freed index (bumping its
    /// generation) when the free list is non-empty, otherwise appends a
    /// fresh record with generation 1.
    ///
    /// # Panics
    /// Panics if the 32-bit index space is exhausted (`CapacityExhausted`,
    /// a hard error per the error-handling design).
    pub fn create(&mut self, active: bool) -> EntityId {
        if let Some(index) = self.free_list.pop() {
            let record = &mut self.records[index as usize];
            record.generation = record.generation.wrapping_add(1);
            record.state = EntityState::Alive;
            record.active = active;
            record.archetype_id = None;
            record.row = 0;
            return EntityId {
                index,
                generation: record.generation,
            };
        }

        let len = self.records.len();
        if len >= u32::MAX as usize {
            panic!("entity id space exhausted: {len} entities allocated");
        }
        let index = self.records.push_back(EntityRecord::fresh(1, active)) as u32;
        EntityId {
            index,
            generation: 1,
        }
    }

    /// True iff `id`'s generation matches the current record and that
    /// record is `Alive`.
    pub fn is_alive(&self, id: EntityId) -> bool {
        match self.records.get(id.index as usize) {
            Some(record) => {
                record.generation == id.generation && record.state == EntityState::Alive
            }
            None => false,
        }
    }

    pub fn record(&self, id: EntityId) -> Option<&EntityRecord> {
        let record = self.records.get(id.index as usize)?;
        if record.generation != id.generation {
            return None;
        }
        Some(record)
    }

    pub fn record_mut(&mut self, id: EntityId) -> Option<&mut EntityRecord> {
        let found_gen = self.records.get(id.index as usize)?.generation;
        if found_gen != id.generation {
            return None;
        }
        self.records.get_mut(id.index as usize)
    }

    /// Validate `id`, mark it `Dead`, and push its index onto the free
    /// list. Does *not* touch archetype storage — the store façade is
    /// responsible for removing the row first.
    pub fn destroy(&mut self, id: EntityId) -> Result<(), EcsError> {
        let record = self.record_mut(id).ok_or(EcsError::DeadEntity)?;
        if record.state != EntityState::Alive {
            return Err(EcsError::DeadEntity);
        }
        record.state = EntityState::Dead;
        record.archetype_id = None;
        self.free_list.push(id.index);
        Ok(())
    }

    /// Set the active flag. Returns `true` iff the flag actually changed
    /// (the store façade uses this to decide whether to fire
    /// activate/deactivate observers).
    pub fn set_active(&mut self, id: EntityId, active: bool) -> Result<bool, EcsError> {
        let record = self.record_mut(id).ok_or(EcsError::DeadEntity)?;
        if record.state != EntityState::Alive {
            return Err(EcsError::DeadEntity);
        }
        if record.active == active {
            return Ok(false);
        }
        record.active = active;
        Ok(true)
    }

    pub fn set_location(&mut self, id: EntityId, archetype_id: Option<usize>, row: usize) {
        if let Some(record) = self.record_mut(id) {
            record.archetype_id = archetype_id;
            record.row = row;
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn free_count(&self) -> usize {
        self.free_list.len()
    }
}

impl Default for EntityManager {
    fn default() -> Self {
        Self::new()
    }
}
