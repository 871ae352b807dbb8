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

//! Component and Bundle traits.
//!
//! Components are data attached to entities. Bundles group multiple
//! components so they can be spawned onto a single entity in one
//! structural transition.

use std::any::TypeId;

use smallvec::{smallvec, SmallVec};

use crate::registry::ComponentRegistry;

/// Maximum number of components supported by `Bundle` implementations.
pub const MAX_BUNDLE_COMPONENTS: usize = 8;

/// Marker trait for components. Components must be `'static` (no borrowed
/// data) and `Send + Sync` so a store can eventually be shared across
/// threads for read-only access.
pub trait Component: 'static + Send + Sync {}

impl<T: 'static + Send + Sync> Component for T {}

/// A group of components spawned onto one entity in a single call.
pub trait Bundle: Send + Sync + 'static {
    /// Type ids of every component in the bundle, in declaration order —
    /// not necessarily sorted (the store sorts when it builds the target
    /// archetype's signature).
    fn type_ids() -> SmallVec<[TypeId; MAX_BUNDLE_COMPONENTS]>
    where
        Self: Sized;

    /// Register every component type in the registry so an archetype can
    /// later ask it for a fresh column. Idempotent.
    fn register_types(registry: &mut ComponentRegistry)
    where
        Self: Sized;

    /// Write every component to its destination pointer. `ptrs[i]` must be
    /// the address reserved for `Self::type_ids()[i]`.
    ///
    /// # Safety
    /// Every pointer in `ptrs` must be valid, properly aligned, and
    /// uninitialized for its component type.
    unsafe fn write_components(self, ptrs: &[*mut u8]);
}

macro_rules! impl_bundle {
    ($($T:ident),*) => {
        impl<$($T: Component),*> Bundle for ($($T,)*) {
            fn type_ids() -> SmallVec<[TypeId; MAX_BUNDLE_COMPONENTS]> {
                smallvec![$(TypeId::of::<$T>()),*]
            }

            fn register_types(registry: &mut ComponentRegistry) {
                $(registry.register::<$T>();)*
            }

            #[allow(non_snake_case)]
            unsafe fn write_components(self, ptrs: &[*mut u8]) {
                let ($($T,)*) = self;
                let mut i = 0;
                $(
                    unsafe {
                        std::ptr::write(ptrs[i] as *mut $T, $T);
                    }
                    i += 1;
                )*
                let _ = i;
            }
        }
    };
}

impl_bundle!(A);
impl_bundle!(A, B);
impl_bundle!(A, B, C);
impl_bundle!(A, B, C, D);
impl_bundle!(A, B, C, D, E);
impl_bundle!(A, B, C, D, E, F);
impl_bundle!(A, B, C, D, E, F, G);
impl_bundle!(A, B, C, D, E, F, G, H);

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, Copy)]
    struct Velocity {
        x: f32,
    }

    #[test]
    fn single_component_type_ids() {
        let type_ids = <(Position,)>::type_ids();
        assert_eq!(type_ids.len(), 1);
        assert_eq!(type_ids[0], TypeId::of::<Position>());
    }

    #[test]
    fn multi_component_type_ids() {
        let type_ids = <(Position, Velocity)>::type_ids();
        assert_eq!(type_ids.len(), 2);
    }

    #[test]
    fn register_types_is_idempotent() {
        let mut registry = ComponentRegistry::default();
        <(Position, Velocity)>::register_types(&mut registry);
        <(Position, Velocity)>::register_types(&mut registry);
        assert!(registry.type_ops(TypeId::of::<Position>()).is_some());
    }
}
