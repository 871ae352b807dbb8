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

//! An archetype-based entity component system: entities are handles,
//! components are plain data, and every exact set of component types an
//! entity can carry gets its own columnar storage block (an "archetype").
//! Adding or removing a component moves the whole row to a different
//! archetype rather than leaving holes behind.
//!
//! Start at [`World`], the store façade every mutation and query goes
//! through.

pub mod archetype;
pub mod chunked_vec;
pub mod column;
pub mod command;
pub mod component;
pub mod config;
pub mod entity;
pub mod error;
pub mod graph;
pub mod observer;
pub mod prelude;
pub mod query;
pub mod registry;
pub mod stable;
pub mod type_id;
pub mod utils;
pub mod world;

pub use archetype::Archetype;
pub use command::{Command, CommandBuffer};
pub use component::{Bundle, Component};
pub use config::StoreConfig;
pub use entity::{EntityId, EntityState};
pub use error::{EcsError, Result};
pub use observer::EntityObserver;
pub use query::{QueryParam, QueryParams, QuerySignature};
pub use registry::ComponentHook;
pub use type_id::Stable;
pub use world::{Query, World};
