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

//! Error types.
//!
//! Propagation policy: every fallible user-facing operation returns a
//! `Result` or `Option` — never a panic — for the kinds below. Internal
//! corruption (an archetype's row count disagreeing with its column
//! lengths, a stale stable-slot reference) is asserted with
//! `debug_assert!` rather than surfaced as a value; `IncompatibleRegistry`
//! and `CapacityExhausted` are genuinely unrecoverable and panic at the
//! call site instead.

use std::fmt;

/// ECS error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// Operation on an id whose generation doesn't match, or whose state
    /// isn't `Alive`.
    DeadEntity,

    /// `remove_component`/`get_component` on a type the entity doesn't
    /// carry.
    ComponentNotFound,
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::DeadEntity => write!(f, "entity is dead or handle is stale"),
            EcsError::ComponentNotFound => write!(f, "component not present on entity"),
        }
    }
}

impl std::error::Error for EcsError {}

/// Result type alias.
pub type Result<T> = std::result::Result<T, EcsError>;
