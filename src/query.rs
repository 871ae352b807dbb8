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

//! Query engine: compiles an include/exclude/any-of/all-of predicate,
//! matches it against the archetype graph incrementally, and drives plain
//! or batched iteration over the rows that satisfy it.

use std::any::TypeId;

#[cfg(feature = "profiling")]
use tracing::info_span;

use smallvec::SmallVec;

use crate::archetype::Archetype;
use crate::entity::{EntityId, EntityManager};
use crate::graph::ArchetypeGraph;

const MAX_FILTER_COMPONENTS: usize = 8;

/// A compiled query predicate over an archetype's type-set.
///
/// Matching (in order):
/// 1. every type in `include` is present;
/// 2. no type in `exclude` is present;
/// 3. if `any_of` is non-empty, at least one of its types is present;
/// 4. if `all_of` is non-empty, every one of its types is present;
/// 5. (caller's responsibility, not archetype-level) an entity additionally
///    passes only if it is active, for queries that don't opt into
///    inactive entities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct QuerySignature {
    pub include: SmallVec<[TypeId; MAX_FILTER_COMPONENTS]>,
    pub exclude: SmallVec<[TypeId; MAX_FILTER_COMPONENTS]>,
    pub any_of: SmallVec<[TypeId; MAX_FILTER_COMPONENTS]>,
    pub all_of: SmallVec<[TypeId; MAX_FILTER_COMPONENTS]>,
}

impl QuerySignature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(mut self, type_id: TypeId) -> Self {
        self.include.push(type_id);
        self
    }

    pub fn exclude(mut self, type_id: TypeId) -> Self {
        self.exclude.push(type_id);
        self
    }

    pub fn any_of(mut self, type_id: TypeId) -> Self {
        self.any_of.push(type_id);
        self
    }

    pub fn all_of(mut self, type_id: TypeId) -> Self {
        self.all_of.push(type_id);
        self
    }

    pub fn matches(&self, archetype: &Archetype) -> bool {
        if self.include.iter().any(|&t| !archetype.has(t)) {
            return false;
        }
        if self.exclude.iter().any(|&t| archetype.has(t)) {
            return false;
        }
        if !self.any_of.is_empty() && self.any_of.iter().all(|&t| !archetype.has(t)) {
            return false;
        }
        if self.all_of.iter().any(|&t| !archetype.has(t)) {
            return false;
        }
        true
    }

    /// The cheapest known group of archetype ids to scan when doing a full
    /// rebuild from scratch: the smallest `by_first_type` bucket among
    /// `include`/`all_of`'s types, if any are registered at all. Falling
    /// back to scanning every archetype is always correct, just slower.
    fn best_seed<'a>(&self, graph: &'a ArchetypeGraph) -> Option<&'a [usize]> {
        self.include
            .iter()
            .chain(self.all_of.iter())
            .map(|&t| graph.archetypes_by_first_type(t))
            .min_by_key(|group| group.len())
    }
}

/// Incrementally-maintained match set for one [`QuerySignature`].
pub struct QueryCache {
    signature: QuerySignature,
    matches: Vec<usize>,
    seen_count: usize,
}

impl QueryCache {
    pub fn new(signature: QuerySignature) -> Self {
        Self {
            signature,
            matches: Vec::new(),
            seen_count: 0,
        }
    }

    pub fn signature(&self) -> &QuerySignature {
        &self.signature
    }

    pub fn matched_archetypes(&self) -> &[usize] {
        &self.matches
    }

    /// Bring the cache up to date with `graph`. When nothing has changed
    /// since the last refresh this is O(1); when new archetypes have been
    /// registered it only scans those; the very first refresh uses the
    /// cheapest seed group it can find instead of scanning every archetype
    /// that exists so far.
    #[cfg_attr(feature = "profiling", tracing::instrument(skip_all))]
    pub fn refresh(&mut self, graph: &ArchetypeGraph) {
        #[cfg(feature = "profiling")]
        let _span = info_span!("query_refresh").entered();

        let total = graph.len();
        if total == self.seen_count {
            return;
        }

        if self.seen_count == 0 {
            self.matches.clear();
            if let Some(seed) = self.signature.best_seed(graph) {
                for &id in seed {
                    if self.signature.matches(graph.get(id)) {
                        self.matches.push(id);
                    }
                }
                self.matches.sort_unstable();
                self.matches.dedup();
            } else {
                for id in 0..total {
                    if self.signature.matches(graph.get(id)) {
                        self.matches.push(id);
                    }
                }
            }
        } else {
            for id in self.seen_count..total {
                if self.signature.matches(graph.get(id)) {
                    self.matches.push(id);
                }
            }
        }
        self.seen_count = total;
    }
}

/// A read-only view onto one matched row, used to fetch component values
/// without re-deriving the archetype/row pair.
pub struct ArchetypeContext<'a> {
    archetype: &'a Archetype,
    row: usize,
}

impl<'a> ArchetypeContext<'a> {
    pub fn new(archetype: &'a Archetype, row: usize) -> Self {
        Self { archetype, row }
    }

    pub fn entity(&self) -> EntityId {
        self.archetype.entity_at(self.row)
    }

    pub fn get<T: 'static>(&self, type_id: TypeId) -> Option<&'a T> {
        let column = self.archetype.column(type_id)?;
        column.get::<T>(self.row)
    }
}

/// One contiguous run of rows within a single archetype — the unit a
/// [`Batch`] is built from; a batch may be made of several spans when it
/// straddles an archetype boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchetypeSpan {
    pub archetype_id: usize,
    pub start_row: usize,
    pub end_row: usize,
}

impl ArchetypeSpan {
    pub fn len(&self) -> usize {
        self.end_row - self.start_row
    }

    pub fn is_empty(&self) -> bool {
        self.start_row == self.end_row
    }
}

/// A slice of a query's full result set sized for one parallel consumer.
pub type Batch = Vec<ArchetypeSpan>;

/// Every maximal run of rows in `archetype_id` that passes the active
/// filter, as its own span. When `active_only` is `false` the whole
/// archetype is one span; otherwise inactive rows split runs apart so a
/// span never needs per-row filtering once built.
fn archetype_active_spans(
    graph: &ArchetypeGraph,
    archetype_id: usize,
    entities: &EntityManager,
    active_only: bool,
) -> Vec<ArchetypeSpan> {
    let archetype = graph.get(archetype_id);
    let len = archetype.len();
    if !active_only {
        return vec![ArchetypeSpan {
            archetype_id,
            start_row: 0,
            end_row: len,
        }];
    }

    let mut spans = Vec::new();
    let mut run_start = None;
    for row in 0..len {
        let active = entities
            .record(archetype.entity_at(row))
            .is_some_and(|r| r.active);
        match (active, run_start) {
            (true, None) => run_start = Some(row),
            (false, Some(start)) => {
                spans.push(ArchetypeSpan {
                    archetype_id,
                    start_row: start,
                    end_row: row,
                });
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        spans.push(ArchetypeSpan {
            archetype_id,
            start_row: start,
            end_row: len,
        });
    }
    spans
}

/// Partition every matched row (active entities only, in archetype order)
/// into batches of roughly equal size, suitable for handing to independent
/// parallel consumers. `batch_size = max(min_batch_size, ceil(total / desired_batches))`;
/// a batch may span more than one archetype when the boundary falls inside it.
/// Inactive rows are excluded from the emitted spans entirely, so every
/// batch's entity count is active-only and consumers never have to
/// re-check activeness themselves.
pub fn plan_batches(
    graph: &ArchetypeGraph,
    matched: &[usize],
    entities: &EntityManager,
    active_only: bool,
    desired_batches: usize,
    min_batch_size: usize,
) -> Vec<Batch> {
    let spans: Vec<ArchetypeSpan> = matched
        .iter()
        .flat_map(|&id| archetype_active_spans(graph, id, entities, active_only))
        .filter(|s| !s.is_empty())
        .collect();

    let total: usize = spans.iter().map(ArchetypeSpan::len).sum();

    if total == 0 || desired_batches == 0 {
        return Vec::new();
    }

    let batch_size = min_batch_size.max(total.div_ceil(desired_batches));

    let mut batches = Vec::new();
    let mut current: Batch = Vec::new();
    let mut current_len = 0usize;

    for span in spans {
        let mut pos = span.start_row;
        while pos < span.end_row {
            let remaining_in_span = span.end_row - pos;
            let remaining_in_batch = batch_size - current_len;
            let take = remaining_in_span.min(remaining_in_batch);
            current.push(ArchetypeSpan {
                archetype_id: span.archetype_id,
                start_row: pos,
                end_row: pos + take,
            });
            current_len += take;
            pos += take;
            if current_len >= batch_size {
                batches.push(std::mem::take(&mut current));
                current_len = 0;
            }
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// Visit every matching row forward (archetype order, row order), skipping
/// inactive entities unless `active_only` is `false`.
pub fn for_each<F: FnMut(ArchetypeContext)>(
    graph: &ArchetypeGraph,
    matched: &[usize],
    entities: &EntityManager,
    active_only: bool,
    mut f: F,
) {
    for &archetype_id in matched {
        let archetype = graph.get(archetype_id);
        for row in 0..archetype.len() {
            let entity = archetype.entity_at(row);
            if active_only && !entities.record(entity).is_some_and(|r| r.active) {
                continue;
            }
            f(ArchetypeContext::new(archetype, row));
        }
    }
}

/// Visit every matching row in reverse (last archetype to first, last row
/// to first within each) — used when a consumer wants to remove rows as it
/// iterates without perturbing rows it hasn't visited yet, since swap-remove
/// only ever pulls from the tail.
pub fn for_each_rev<F: FnMut(ArchetypeContext)>(
    graph: &ArchetypeGraph,
    matched: &[usize],
    entities: &EntityManager,
    active_only: bool,
    mut f: F,
) {
    for &archetype_id in matched.iter().rev() {
        let archetype = graph.get(archetype_id);
        for row in (0..archetype.len()).rev() {
            let entity = archetype.entity_at(row);
            if active_only && !entities.record(entity).is_some_and(|r| r.active) {
                continue;
            }
            f(ArchetypeContext::new(archetype, row));
        }
    }
}

/// A single query parameter: `&T` or `&mut T`. Generalizes the
/// "include list becomes positional callback parameters" rule from the
/// query engine's contract into a tuple of typed fetches, in the spirit of
/// §9's design note that one runtime path (type-id + pointer) can be
/// specialized generically over the include tuple for ergonomics.
///
/// # Safety
/// Implementors must only ever read (`&T`) or exclusively write (`&mut T`)
/// through the pointer obtained from the archetype's column for `type_id()`;
/// the caller guarantees no two params in the same tuple alias the same
/// type mutably and immutably at once (the common ECS restriction — this
/// crate does not check it at compile time).
pub unsafe trait QueryParam {
    type Item<'a>;

    fn type_id() -> TypeId;

    /// # Safety
    /// `archetype` must contain a column for `Self::type_id()` and `row`
    /// must be `< archetype.len()`.
    unsafe fn fetch<'a>(archetype: &'a Archetype, row: usize) -> Self::Item<'a>;
}

unsafe impl<T: 'static> QueryParam for &T {
    type Item<'a> = &'a T;

    fn type_id() -> TypeId {
        TypeId::of::<T>()
    }

    unsafe fn fetch<'a>(archetype: &'a Archetype, row: usize) -> &'a T {
        archetype
            .column(TypeId::of::<T>())
            .and_then(|c| c.get::<T>(row))
            .expect("query param type missing from matched archetype")
    }
}

unsafe impl<T: 'static> QueryParam for &mut T {
    type Item<'a> = &'a mut T;

    fn type_id() -> TypeId {
        TypeId::of::<T>()
    }

    unsafe fn fetch<'a>(archetype: &'a Archetype, row: usize) -> &'a mut T {
        let column = archetype
            .column(TypeId::of::<T>())
            .expect("query param type missing from matched archetype");
        debug_assert!(row < column.len());
        unsafe { &mut *(column.get_ptr(row) as *mut T) }
    }
}

/// Build the [`QuerySignature`] that a `QueryParam` tuple matches. Query
/// tuples always use `include` — `exclude`/`any_of`/`all_of` are expressed
/// separately via [`QuerySignature`] directly for callers that need them.
pub trait QueryParams {
    type Item<'a>;

    fn signature() -> QuerySignature;

    /// # Safety
    /// Every type named by [`Self::signature`] must be present in
    /// `archetype`, and `row` must be `< archetype.len()`.
    unsafe fn fetch<'a>(archetype: &'a Archetype, row: usize) -> Self::Item<'a>;
}

macro_rules! impl_query_params {
    ($($P:ident),+) => {
        impl<$($P: QueryParam),+> QueryParams for ($($P,)+) {
            type Item<'a> = ($($P::Item<'a>,)+);

            fn signature() -> QuerySignature {
                let mut sig = QuerySignature::new();
                $(sig = sig.include($P::type_id());)+
                sig
            }

            unsafe fn fetch<'a>(archetype: &'a Archetype, row: usize) -> Self::Item<'a> {
                unsafe { ($($P::fetch(archetype, row),)+) }
            }
        }
    };
}

impl_query_params!(P0);
impl_query_params!(P0, P1);
impl_query_params!(P0, P1, P2);
impl_query_params!(P0, P1, P2, P3);
impl_query_params!(P0, P1, P2, P3, P4);
impl_query_params!(P0, P1, P2, P3, P4, P5);

/// Visit every matching row of a typed query tuple, skipping inactive
/// entities. Thin generic wrapper over [`for_each`] — see its docs for
/// iteration order and the no-built-in-protection-against-mid-iteration-
/// mutation caveat.
pub fn for_each_typed<Q: QueryParams, F: FnMut(EntityId, Q::Item<'_>)>(
    graph: &ArchetypeGraph,
    matched: &[usize],
    entities: &EntityManager,
    active_only: bool,
    mut f: F,
) {
    for &archetype_id in matched {
        let archetype = graph.get(archetype_id);
        for row in 0..archetype.len() {
            let entity = archetype.entity_at(row);
            if active_only && !entities.record(entity).is_some_and(|r| r.active) {
                continue;
            }
            let item = unsafe { Q::fetch(archetype, row) };
            f(entity, item);
        }
    }
}

/// One store's worth of matched archetypes plus the spans contributed to a
/// multi-container batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultiArchetypeSpan {
    pub store_index: usize,
    pub span: ArchetypeSpan,
}

/// A multi-container query: one [`QueryCache`] per associated store. Fetch
/// and batch partitioning concatenate each store's active-entity count, so a
/// batch may straddle store boundaries the same way a single-store batch may
/// straddle archetype boundaries.
pub struct MultiQueryCache {
    signature: QuerySignature,
    per_store: Vec<QueryCache>,
}

impl MultiQueryCache {
    pub fn new(signature: QuerySignature, store_count: usize) -> Self {
        Self {
            per_store: (0..store_count)
                .map(|_| QueryCache::new(signature.clone()))
                .collect(),
            signature,
        }
    }

    pub fn signature(&self) -> &QuerySignature {
        &self.signature
    }

    pub fn refresh(&mut self, graphs: &[&ArchetypeGraph]) {
        debug_assert_eq!(graphs.len(), self.per_store.len());
        for (cache, graph) in self.per_store.iter_mut().zip(graphs) {
            cache.refresh(graph);
        }
    }

    pub fn matched(&self, store_index: usize) -> &[usize] {
        self.per_store[store_index].matched_archetypes()
    }

    /// Partition every matching row across every associated store into
    /// batches of roughly equal size, concatenating per-store active counts
    /// before dividing — the aggregate-fetch rule for multi-container
    /// queries.
    pub fn plan_batches(
        &self,
        graphs: &[&ArchetypeGraph],
        entities: &[&EntityManager],
        active_only: bool,
        desired_batches: usize,
        min_batch_size: usize,
    ) -> Vec<Vec<MultiArchetypeSpan>> {
        debug_assert_eq!(graphs.len(), self.per_store.len());
        debug_assert_eq!(entities.len(), self.per_store.len());

        let per_store_batches: Vec<Vec<Batch>> = (0..self.per_store.len())
            .map(|i| plan_batches(graphs[i], self.matched(i), entities[i], active_only, 1, 1))
            .collect();

        let total: usize = per_store_batches
            .iter()
            .flatten()
            .flat_map(|b| b.iter())
            .map(ArchetypeSpan::len)
            .sum();
        if total == 0 || desired_batches == 0 {
            return Vec::new();
        }
        let batch_size = min_batch_size.max(total.div_ceil(desired_batches));

        let mut batches = Vec::new();
        let mut current: Vec<MultiArchetypeSpan> = Vec::new();
        let mut current_len = 0usize;

        for (store_index, store_batches) in per_store_batches.into_iter().enumerate() {
            for span in store_batches.into_iter().flatten() {
                let mut pos = span.start_row;
                while pos < span.end_row {
                    let remaining_in_span = span.end_row - pos;
                    let remaining_in_batch = batch_size - current_len;
                    let take = remaining_in_span.min(remaining_in_batch);
                    current.push(MultiArchetypeSpan {
                        store_index,
                        span: ArchetypeSpan {
                            archetype_id: span.archetype_id,
                            start_row: pos,
                            end_row: pos + take,
                        },
                    });
                    current_len += take;
                    pos += take;
                    if current_len >= batch_size {
                        batches.push(std::mem::take(&mut current));
                        current_len = 0;
                    }
                }
            }
        }
        if !current.is_empty() {
            batches.push(current);
        }
        batches
    }
}

/// Consume every batch produced by [`plan_batches`] on separate worker
/// threads via `rayon`, each batch visiting its rows with `f`. Safe only
/// when no mutation is in flight and `f` does not touch rows outside its
/// own batch — batches from one query's partitioning never overlap, which is
/// what makes this sound (§5's parallel-read admissibility condition).
#[cfg(feature = "parallel")]
pub fn par_for_each_batches<F>(graph: &ArchetypeGraph, batches: &[Batch], f: F)
where
    F: Fn(ArchetypeContext) + Sync,
{
    use rayon::prelude::*;

    batches.par_iter().for_each(|batch| {
        for span in batch {
            let archetype = graph.get(span.archetype_id);
            for row in span.start_row..span.end_row {
                f(ArchetypeContext::new(archetype, row));
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ComponentRegistry;

    fn eid(index: u32) -> EntityId {
        EntityId {
            index,
            generation: 1,
        }
    }

    #[test]
    fn signature_matches_include_and_exclude() {
        let mut graph = ArchetypeGraph::new();
        let mut registry = ComponentRegistry::default();
        registry.register::<u32>();
        registry.register::<u64>();
        let type_a = TypeId::of::<u32>();
        let type_b = TypeId::of::<u64>();
        let with_a = graph.add_edge_target(ArchetypeGraph::EMPTY, type_a, &registry);
        let with_ab = graph.add_edge_target(with_a, type_b, &registry);

        let sig = QuerySignature::new().include(type_a).exclude(type_b);
        assert!(sig.matches(graph.get(with_a)));
        assert!(!sig.matches(graph.get(with_ab)));
    }

    #[test]
    fn cache_incremental_refresh_picks_up_new_archetypes() {
        let mut graph = ArchetypeGraph::new();
        let mut registry = ComponentRegistry::default();
        registry.register::<u32>();
        let type_a = TypeId::of::<u32>();

        let mut cache = QueryCache::new(QuerySignature::new().include(type_a));
        cache.refresh(&graph);
        assert_eq!(cache.matched_archetypes().len(), 0);

        graph.add_edge_target(ArchetypeGraph::EMPTY, type_a, &registry);
        cache.refresh(&graph);
        assert_eq!(cache.matched_archetypes().len(), 1);
    }

    #[test]
    fn plan_batches_covers_every_active_row_once() {
        let mut graph = ArchetypeGraph::new();
        let mut registry = ComponentRegistry::default();
        registry.register::<u32>();
        let type_a = TypeId::of::<u32>();
        let target = graph.add_edge_target(ArchetypeGraph::EMPTY, type_a, &registry);

        let mut entities = EntityManager::new();
        let mut stable = rustc_hash::FxHashMap::default();
        for i in 0..23u32 {
            let id = entities.create(i % 7 != 0);
            let value = i;
            unsafe {
                graph
                    .get_mut(target)
                    .push_new_row(id, &[&value as *const u32 as *const u8], &mut stable);
            }
            entities.set_location(id, Some(target), graph.get(target).len() - 1);
        }

        let matched = vec![target];
        let batches = plan_batches(&graph, &matched, &entities, true, 4, 1);
        let total_rows: usize = batches
            .iter()
            .flat_map(|b| b.iter())
            .map(ArchetypeSpan::len)
            .sum();
        let expected_active = (0..23u32).filter(|i| i % 7 != 0).count();
        assert_eq!(total_rows, expected_active);
    }

    #[test]
    fn for_each_skips_inactive_entities() {
        let mut graph = ArchetypeGraph::new();
        let mut registry = ComponentRegistry::default();
        registry.register::<u32>();
        let type_a = TypeId::of::<u32>();
        let target = graph.add_edge_target(ArchetypeGraph::EMPTY, type_a, &registry);

        let mut entities = EntityManager::new();
        let mut stable = rustc_hash::FxHashMap::default();
        let active_id = entities.create(true);
        let inactive_id = entities.create(false);
        for id in [active_id, inactive_id] {
            let value = 1u32;
            unsafe {
                graph
                    .get_mut(target)
                    .push_new_row(id, &[&value as *const u32 as *const u8], &mut stable);
            }
        }

        let matched = vec![target];
        let mut seen = Vec::new();
        for_each(&graph, &matched, &entities, true, |ctx| seen.push(ctx.entity()));
        assert_eq!(seen, vec![active_id]);
        let _ = eid(0);
    }

    #[test]
    fn typed_query_param_reads_and_writes() {
        let mut graph = ArchetypeGraph::new();
        let mut registry = ComponentRegistry::default();
        registry.register::<u32>();
        registry.register::<u64>();
        let type_a = TypeId::of::<u32>();
        let type_b = TypeId::of::<u64>();
        let with_a = graph.add_edge_target(ArchetypeGraph::EMPTY, type_a, &registry);
        let target = graph.add_edge_target(with_a, type_b, &registry);

        let mut entities = EntityManager::new();
        let mut stable = rustc_hash::FxHashMap::default();
        let id = entities.create(true);
        let (a, b) = (1u32, 2u64);
        unsafe {
            graph.get_mut(target).push_new_row(
                id,
                &[&a as *const u32 as *const u8, &b as *const u64 as *const u8],
                &mut stable,
            );
        }

        let sig = <(&u32, &mut u64)>::signature();
        assert_eq!(sig.include.len(), 2);
        let mut seen = Vec::new();
        for_each_typed::<(&u32, &mut u64), _>(&graph, &[target], &entities, true, |e, (a, b)| {
            *b += 10;
            seen.push((e, *a));
        });
        assert_eq!(seen, vec![(id, 1)]);
        assert_eq!(*graph.get(target).column(type_b).unwrap().get::<u64>(0).unwrap(), 12);
    }

    #[test]
    fn multi_query_cache_concatenates_store_counts() {
        let mut graph_a = ArchetypeGraph::new();
        let mut graph_b = ArchetypeGraph::new();
        let mut registry = ComponentRegistry::default();
        registry.register::<u32>();
        let type_a = TypeId::of::<u32>();
        let target_a = graph_a.add_edge_target(ArchetypeGraph::EMPTY, type_a, &registry);
        let target_b = graph_b.add_edge_target(ArchetypeGraph::EMPTY, type_a, &registry);

        let mut entities_a = EntityManager::new();
        let mut entities_b = EntityManager::new();
        let mut stable = rustc_hash::FxHashMap::default();
        for _ in 0..5 {
            let id = entities_a.create(true);
            let v = 1u32;
            unsafe {
                graph_a
                    .get_mut(target_a)
                    .push_new_row(id, &[&v as *const u32 as *const u8], &mut stable);
            }
        }
        for _ in 0..3 {
            let id = entities_b.create(true);
            let v = 1u32;
            unsafe {
                graph_b
                    .get_mut(target_b)
                    .push_new_row(id, &[&v as *const u32 as *const u8], &mut stable);
            }
        }

        let mut cache = MultiQueryCache::new(QuerySignature::new().include(type_a), 2);
        cache.refresh(&[&graph_a, &graph_b]);
        let batches = cache.plan_batches(
            &[&graph_a, &graph_b],
            &[&entities_a, &entities_b],
            true,
            2,
            1,
        );
        let total: usize = batches.iter().flat_map(|b| b.iter()).map(|s| s.span.len()).sum();
        assert_eq!(total, 8);
    }
}
