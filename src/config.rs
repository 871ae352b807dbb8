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

//! Store-wide configuration, consumed once at construction.

use std::any::TypeId;

use rustc_hash::FxHashMap;

/// Chunk sizes for every chunked structure a [`crate::world::World`] owns.
/// Immutable after construction: changing these mid-life would leave
/// already-allocated chunks at the old size.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub default_stable_chunk_size: usize,
    pub per_type_stable_chunk_size: FxHashMap<TypeId, usize>,
    pub entity_chunk_size: usize,
    pub archetype_chunk_size: usize,
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_stable_chunk_size(mut self, size: usize) -> Self {
        self.default_stable_chunk_size = size;
        self
    }

    pub fn with_stable_chunk_size_for<T: 'static>(mut self, size: usize) -> Self {
        self.per_type_stable_chunk_size.insert(TypeId::of::<T>(), size);
        self
    }

    pub fn with_entity_chunk_size(mut self, size: usize) -> Self {
        self.entity_chunk_size = size;
        self
    }

    pub fn with_archetype_chunk_size(mut self, size: usize) -> Self {
        self.archetype_chunk_size = size;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_stable_chunk_size: 1000,
            per_type_stable_chunk_size: FxHashMap::default(),
            entity_chunk_size: 100,
            archetype_chunk_size: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = StoreConfig::default();
        assert_eq!(config.default_stable_chunk_size, 1000);
        assert_eq!(config.entity_chunk_size, 100);
        assert_eq!(config.archetype_chunk_size, 100);
    }

    #[test]
    fn per_type_override_recorded() {
        let config = StoreConfig::new().with_stable_chunk_size_for::<u64>(16);
        assert_eq!(
            config.per_type_stable_chunk_size.get(&TypeId::of::<u64>()),
            Some(&16)
        );
    }
}
