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

//! Entity-lifecycle observers. Per-component create/destroy hooks live in
//! [`crate::registry::ComponentRegistry`] instead, since they're keyed by
//! type rather than fired for every entity.

use crate::entity::EntityId;

/// Reacts to entity-level lifecycle transitions. Invocation is synchronous
/// and non-reentrant: an observer must not mutate the store that is
/// currently calling it.
pub trait EntityObserver: Send + Sync {
    fn on_create_entity(&mut self, _entity: EntityId) {}
    fn on_destroy_entity(&mut self, _entity: EntityId) {}
    fn on_activate(&mut self, _entity: EntityId) {}
    fn on_deactivate(&mut self, _entity: EntityId) {}
}

/// Dispatches to every registered [`EntityObserver`] in registration order.
#[derive(Default)]
pub struct ObserverList {
    observers: Vec<Box<dyn EntityObserver>>,
}

impl ObserverList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, observer: Box<dyn EntityObserver>) {
        self.observers.push(observer);
    }

    pub fn fire_create(&mut self, entity: EntityId) {
        for observer in &mut self.observers {
            observer.on_create_entity(entity);
        }
    }

    pub fn fire_destroy(&mut self, entity: EntityId) {
        for observer in &mut self.observers {
            observer.on_destroy_entity(entity);
        }
    }

    pub fn fire_activate(&mut self, entity: EntityId) {
        for observer in &mut self.observers {
            observer.on_activate(entity);
        }
    }

    pub fn fire_deactivate(&mut self, entity: EntityId) {
        for observer in &mut self.observers {
            observer.on_deactivate(entity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counter(Arc<AtomicUsize>);
    impl EntityObserver for Counter {
        fn on_create_entity(&mut self, _entity: EntityId) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn fire_create_invokes_every_registered_observer() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut list = ObserverList::new();
        list.register(Box::new(Counter(count.clone())));
        list.register(Box::new(Counter(count.clone())));
        list.fire_create(EntityId {
            index: 0,
            generation: 1,
        });
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
