//! # The Context Façade
//!
//! A [`Context`] owns every table of the storage engine and drives its
//! two-phase lifecycle.
//!
//! ## Lifecycle
//! 1. **Definition phase**: register component kinds, define entity types
//!    (canonicalised component sets) and queries (ordered component
//!    tuples). Only metadata accumulates; no payload storage exists yet.
//! 2. **`setup`**: one-way transition. Component buffers are allocated,
//!    ranges are laid out, and query statements are compiled.
//! 3. **Execution phase**: `create`, `destroy`, `is_alive`, component
//!    access, query execution, and `clear`.
//!
//! ## Failure model
//! Definition-phase operations return
//! [`EngineResult`](crate::engine::error::EngineResult); misuse is a typed
//! error. Execution-phase operations assert their phase and contract
//! preconditions instead of returning results, keeping the hot paths free
//! of error plumbing. `is_alive` is the supported gate for the alive-entity
//! preconditions of `destroy` and component access.
//!
//! ## Concurrency
//! None. A `Context` is a single-threaded data structure; every operation
//! completes synchronously before returning, and query visitors run inline
//! on the caller's thread.

use std::any::TypeId;
use std::collections::HashMap;

use tracing::debug;

use crate::engine::component::{ComponentKindDesc, Payload};
use crate::engine::entity::{Entity, EntityType};
use crate::engine::error::{DefineError, EngineResult};
use crate::engine::query::{
    self, ComponentTuple, Cursor, Query, QueryChunk, QueryControl, QueryPlan, QueryStatement,
};
use crate::engine::storage::{
    self, ComponentRange, ComponentRef, ComponentStore,
};
use crate::engine::types::{
    ComponentKindId, EntityTypeId, LogicalIndex, QueryId, COMPONENT_KIND_CAP, ENTITY_TYPE_CAP,
};


/// The storage engine: component kinds, entity types, queries, and every
/// live entity, behind one façade.
///
/// See the [module docs](self) for the lifecycle and failure model.
pub struct Context {
    pub(crate) components: Vec<ComponentStore>,
    pub(crate) kind_by_type: HashMap<TypeId, ComponentKindId>,
    pub(crate) component_refs: Vec<ComponentRef>,
    pub(crate) ranges: Vec<ComponentRange>,
    pub(crate) entity_types: Vec<EntityType>,
    pub(crate) queries: Vec<QueryPlan>,
    pub(crate) setup_done: bool,
}

impl Default for Context {
    fn default() -> Self { Self::new() }
}

impl Context {

    /// Creates an empty context in the definition phase.
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
            kind_by_type: HashMap::new(),
            component_refs: Vec::new(),
            ranges: Vec::new(),
            entity_types: Vec::new(),
            queries: Vec::new(),
            setup_done: false,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Definition phase
    // ─────────────────────────────────────────────────────────────────────

    fn push_kind(&mut self, desc: ComponentKindDesc) -> Result<ComponentKindId, DefineError> {
        desc.validate()?;
        if self.components.len() >= COMPONENT_KIND_CAP {
            return Err(DefineError::KindCapacityExceeded { cap: COMPONENT_KIND_CAP });
        }
        let kind = self.components.len() as ComponentKindId;
        debug!(kind, name = desc.name, size = desc.instance_size, "registered component kind");
        self.components.push(ComponentStore::new(desc));
        Ok(kind)
    }

    /// Registers a component kind from an explicit descriptor and returns
    /// its id. Every call issues a fresh id; identity is the caller's
    /// concern on this path.
    ///
    /// ## Errors
    /// `AfterSetup` past the definition phase, or the descriptor's own
    /// validation failures.
    pub fn register_component_kind(
        &mut self,
        desc: ComponentKindDesc,
    ) -> EngineResult<ComponentKindId> {
        if self.setup_done {
            return Err(DefineError::AfterSetup.into());
        }
        Ok(self.push_kind(desc)?)
    }

    /// Resolves the kind id for payload type `T`, registering it on first
    /// sight. Usable only during the definition phase for unseen types.
    pub(crate) fn kind_of_or_register<T: Payload>(
        &mut self,
    ) -> Result<ComponentKindId, DefineError> {
        if let Some(&kind) = self.kind_by_type.get(&TypeId::of::<T>()) {
            return Ok(kind);
        }
        if self.setup_done {
            return Err(DefineError::AfterSetup);
        }
        let kind = self.push_kind(ComponentKindDesc::of::<T>())?;
        self.kind_by_type.insert(TypeId::of::<T>(), kind);
        Ok(kind)
    }

    /// Returns the kind id registered for payload type `T`, if any.
    pub fn kind_of<T: Payload>(&self) -> Option<ComponentKindId> {
        self.kind_by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Defines an entity type from raw kind ids.
    ///
    /// The set is canonicalised by sorting; component order is irrelevant
    /// and two definitions of the same set return the same id.
    ///
    /// ## Errors
    /// - `AfterSetup` past the definition phase.
    /// - `EmptyComponentSet` for an empty slice.
    /// - `UnknownComponent` for an unregistered id.
    /// - `DuplicateComponent` if a kind repeats.
    /// - `EntityTypeCapacityExceeded` when the id space is exhausted.
    pub fn define_entity_type_from_kinds(
        &mut self,
        kinds: &[ComponentKindId],
    ) -> EngineResult<EntityTypeId> {
        if self.setup_done {
            return Err(DefineError::AfterSetup.into());
        }
        if kinds.is_empty() {
            return Err(DefineError::EmptyComponentSet.into());
        }
        for &kind in kinds {
            if kind as usize >= self.components.len() {
                return Err(DefineError::UnknownComponent { kind }.into());
            }
        }

        let mut sorted = kinds.to_vec();
        sorted.sort_unstable();
        for pair in sorted.windows(2) {
            if pair[0] == pair[1] {
                return Err(DefineError::DuplicateComponent { kind: pair[0] }.into());
            }
        }

        // Identical sets share one id.
        for (index, entity_type) in self.entity_types.iter().enumerate() {
            let first = entity_type.components_ref_first as usize;
            let count = entity_type.components_ref_count as usize;
            if count == sorted.len()
                && self.component_refs[first..first + count]
                    .iter()
                    .zip(&sorted)
                    .all(|(cref, &kind)| cref.kind == kind)
            {
                return Ok(index as EntityTypeId);
            }
        }

        if self.entity_types.len() >= ENTITY_TYPE_CAP {
            return Err(DefineError::EntityTypeCapacityExceeded { cap: ENTITY_TYPE_CAP }.into());
        }

        let refs_first = self.component_refs.len() as u32;
        for &kind in &sorted {
            self.component_refs.push(ComponentRef {
                kind,
                range_global_index: u32::MAX,
            });
            self.components[kind as usize].ranges_count += 1;
        }

        let id = self.entity_types.len() as EntityTypeId;
        self.entity_types.push(EntityType::new(refs_first, sorted.len() as u32));
        debug!(entity_type = id, components = sorted.len(), "defined entity type");
        Ok(id)
    }

    /// Defines an entity type from a payload tuple, registering unseen
    /// kinds along the way. See
    /// [`define_entity_type_from_kinds`](Self::define_entity_type_from_kinds).
    pub fn define_entity_type<T: ComponentTuple>(&mut self) -> EngineResult<EntityTypeId> {
        let kinds = T::kinds(self)?;
        self.define_entity_type_from_kinds(&kinds)
    }

    /// Defines a query over raw kind ids.
    ///
    /// The tuple is recorded verbatim: order is semantic and determines the
    /// visitor's argument order, so `(A, B)` and `(B, A)` are distinct
    /// queries. Defining the exact same sequence twice returns the same id.
    ///
    /// ## Errors
    /// - `AfterSetup` past the definition phase.
    /// - `EmptyQuery` for an empty slice.
    /// - `UnknownComponent` for an unregistered id.
    /// - `DuplicateQueryComponent` if a kind repeats within the tuple.
    pub fn define_query_from_kinds(
        &mut self,
        kinds: &[ComponentKindId],
    ) -> EngineResult<QueryId> {
        if self.setup_done {
            return Err(DefineError::AfterSetup.into());
        }
        if kinds.is_empty() {
            return Err(DefineError::EmptyQuery.into());
        }
        for (position, &kind) in kinds.iter().enumerate() {
            if kind as usize >= self.components.len() {
                return Err(DefineError::UnknownComponent { kind }.into());
            }
            if kinds[..position].contains(&kind) {
                return Err(DefineError::DuplicateQueryComponent { kind }.into());
            }
        }

        for (index, plan) in self.queries.iter().enumerate() {
            if plan.kinds == kinds {
                return Ok(index as QueryId);
            }
        }

        let id = self.queries.len() as QueryId;
        self.queries.push(QueryPlan {
            kinds: kinds.to_vec(),
            statements: Vec::new(),
        });
        debug!(query = id, components = kinds.len(), "defined query");
        Ok(id)
    }

    /// Defines a query from a payload tuple and returns a typed handle.
    /// See [`define_query_from_kinds`](Self::define_query_from_kinds).
    pub fn define_query<T: ComponentTuple>(&mut self) -> EngineResult<Query<T>> {
        let kinds = T::kinds(self)?;
        let id = self.define_query_from_kinds(&kinds)?;
        Ok(Query::new(id))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Setup
    // ─────────────────────────────────────────────────────────────────────

    /// Compiles the defined schema and enters the execution phase.
    ///
    /// Allocates every component buffer at its initial capacity, lays the
    /// per-entity-type ranges out back to back in definition order of their
    /// owning types, and resolves every query into per-entity-type
    /// statements. One-way; call exactly once.
    ///
    /// ## Errors
    /// `AlreadySetup` on a second call.
    pub fn setup(&mut self) -> EngineResult<()> {
        if self.setup_done {
            return Err(DefineError::AlreadySetup.into());
        }

        // Reserve each component's span of the shared ranges table and
        // allocate its buffers.
        for store in &mut self.components {
            store.ranges_first = self.ranges.len() as u32;
            self.ranges.extend(
                std::iter::repeat_with(ComponentRange::default)
                    .take(store.ranges_count as usize),
            );
            store.allocate();
        }

        // Walk entity types in definition order, handing each component ref
        // the next unused range slot of its kind. First appearance decides
        // range adjacency.
        let mut range_end = vec![0u32; self.components.len()];
        for et_index in 0..self.entity_types.len() {
            let first = self.entity_types[et_index].components_ref_first as usize;
            let count = self.entity_types[et_index].components_ref_count as usize;
            for r in first..first + count {
                let kind = self.component_refs[r].kind as usize;
                let global = self.components[kind].ranges_first + range_end[kind];
                range_end[kind] += 1;
                self.component_refs[r].range_global_index = global;
                self.ranges[global as usize].entity_type_index = et_index as EntityTypeId;
            }
        }

        // Compile query statements: one per entity type whose component set
        // covers the query tuple.
        for query_index in 0..self.queries.len() {
            let kinds = self.queries[query_index].kinds.clone();
            let mut statements = Vec::new();

            for et_index in 0..self.entity_types.len() {
                let first = self.entity_types[et_index].components_ref_first as usize;
                let count = self.entity_types[et_index].components_ref_count as usize;
                let refs = &self.component_refs[first..first + count];

                let mut ref_slots = Vec::with_capacity(kinds.len());
                for &kind in &kinds {
                    match refs.binary_search_by_key(&kind, |cref| cref.kind) {
                        Ok(slot) => ref_slots.push(slot as u16),
                        Err(_) => break,
                    }
                }
                if ref_slots.len() == kinds.len() {
                    statements.push(QueryStatement {
                        entity_type_index: et_index as EntityTypeId,
                        ref_slots,
                    });
                }
            }

            self.queries[query_index].statements = statements;
        }

        self.setup_done = true;
        debug!(
            components = self.components.len(),
            entity_types = self.entity_types.len(),
            queries = self.queries.len(),
            "setup complete"
        );
        Ok(())
    }

    /// Returns `true` once `setup` has run.
    pub fn is_setup(&self) -> bool { self.setup_done }

    // ─────────────────────────────────────────────────────────────────────
    // Execution phase
    // ─────────────────────────────────────────────────────────────────────

    /// Creates an entity of the given type, with every component
    /// zero-constructed.
    ///
    /// Logical indices freed by `destroy` are reused in FIFO order;
    /// otherwise a fresh index is allocated. Amortised O(1); the worst case
    /// pays one instance move per later range of each component kind.
    ///
    /// ## Panics
    /// Before `setup`, or for an unknown entity type id.
    pub fn create(&mut self, entity_type: EntityTypeId) -> Entity {
        assert!(self.setup_done, "create requires setup");
        let et_index = entity_type as usize;
        assert!(
            et_index < self.entity_types.len(),
            "create: unknown entity type {entity_type}"
        );

        let (ref_first, ref_count) = {
            let et = &self.entity_types[et_index];
            (et.components_ref_first as usize, et.components_ref_count as usize)
        };

        let logical = match self.entity_types[et_index].free_indices.pop_front() {
            Some(index) => index,
            None => {
                let index = self.entity_types[et_index].generation.len() as LogicalIndex;
                self.entity_types[et_index].generation.push(0);
                for r in ref_first..ref_first + ref_count {
                    let global = self.component_refs[r].range_global_index as usize;
                    self.ranges[global].logical_to_physical.push(u32::MAX);
                }
                index
            }
        };

        for r in ref_first..ref_first + ref_count {
            let cref = self.component_refs[r];
            let global = cref.range_global_index as usize;
            let store = &mut self.components[cref.kind as usize];
            let slot = storage::range_push_back(store, &mut self.ranges, global);
            store.physical_to_logical[slot as usize] = logical;
            let range = &mut self.ranges[global];
            range.logical_to_physical[logical as usize] = slot;
            range.len += 1;
        }

        let et = &mut self.entity_types[et_index];
        et.alive_count += 1;
        Entity {
            entity_type,
            generation: et.generation[logical as usize],
            index: logical,
        }
    }

    /// Destroys an entity.
    ///
    /// The last live instance of every component range swaps into the
    /// vacated slot, keeping ranges dense; the logical index goes onto the
    /// free list and its generation bumps, invalidating outstanding
    /// handles.
    ///
    /// The entity must be alive; gate with [`is_alive`](Self::is_alive).
    ///
    /// ## Panics
    /// Before `setup`. Destroying a dead entity is checked in debug builds
    /// only.
    pub fn destroy(&mut self, entity: Entity) {
        assert!(self.setup_done, "destroy requires setup");
        debug_assert!(self.is_alive(entity), "destroy on a dead entity");

        let et_index = entity.entity_type as usize;
        let (ref_first, ref_count, new_len) = {
            let et = &mut self.entity_types[et_index];
            et.free_indices.push_back(entity.index);
            et.generation[entity.index as usize] =
                et.generation[entity.index as usize].wrapping_add(1);
            et.alive_count -= 1;
            (
                et.components_ref_first as usize,
                et.components_ref_count as usize,
                et.alive_count,
            )
        };

        for r in ref_first..ref_first + ref_count {
            let cref = self.component_refs[r];
            let range = &mut self.ranges[cref.range_global_index as usize];
            let store = &mut self.components[cref.kind as usize];

            let dead = range.logical_to_physical[entity.index as usize];
            let last = range.first + new_len;
            store.copy_instance(last, dead);
            let moved = store.physical_to_logical[last as usize];
            store.physical_to_logical[dead as usize] = moved;
            range.logical_to_physical[moved as usize] = dead;
            range.len = new_len;
        }
    }

    /// Returns `true` if `entity` is alive in this context.
    pub fn is_alive(&self, entity: Entity) -> bool {
        match self.entity_types.get(entity.entity_type as usize) {
            Some(entity_type) => entity_type.is_current(entity.index, entity.generation),
            None => false,
        }
    }

    /// Logically destroys every entity without releasing memory.
    ///
    /// All generations bump, free lists are rebuilt, and every range
    /// empties in place; buffer capacities and range starts are retained,
    /// so subsequent creates reuse the existing slots.
    ///
    /// ## Panics
    /// Before `setup`.
    pub fn clear(&mut self) {
        assert!(self.setup_done, "clear requires setup");
        for entity_type in &mut self.entity_types {
            entity_type.clear();
        }
        for range in &mut self.ranges {
            range.len = 0;
        }
        debug!("context cleared");
    }

    /// Number of live entities of the given type.
    ///
    /// ## Panics
    /// For an unknown entity type id.
    pub fn alive_count(&self, entity_type: EntityTypeId) -> u32 {
        self.entity_types[entity_type as usize].alive_count
    }

    // ─────────────────────────────────────────────────────────────────────
    // Component access
    // ─────────────────────────────────────────────────────────────────────

    /// Resolves `(component ref, physical slot)` for an alive entity and a
    /// kind it may or may not carry.
    fn locate(&self, entity: Entity, kind: ComponentKindId) -> Option<(ComponentKindId, u32)> {
        debug_assert!(self.is_alive(entity), "component access on a dead entity");
        let et = &self.entity_types[entity.entity_type as usize];
        let first = et.components_ref_first as usize;
        let count = et.components_ref_count as usize;
        let refs = &self.component_refs[first..first + count];

        let slot = refs.binary_search_by_key(&kind, |cref| cref.kind).ok()?;
        let cref = refs[slot];
        let range = &self.ranges[cref.range_global_index as usize];
        Some((cref.kind, range.logical_to_physical[entity.index as usize]))
    }

    /// Returns the entity's `C` payload, or `None` if its type does not
    /// carry `C`.
    ///
    /// The entity must be alive; gate with [`is_alive`](Self::is_alive).
    pub fn try_get<C: Payload>(&self, entity: Entity) -> Option<&C> {
        let kind = self.kind_of::<C>()?;
        let (kind, physical) = self.locate(entity, kind)?;
        // Safety: the kind was registered for C, and the slot holds the
        // live instance of an alive entity.
        Some(unsafe { self.components[kind as usize].instance_ref::<C>(physical) })
    }

    /// Mutable variant of [`try_get`](Self::try_get).
    pub fn try_get_mut<C: Payload>(&mut self, entity: Entity) -> Option<&mut C> {
        let kind = self.kind_of::<C>()?;
        let (kind, physical) = self.locate(entity, kind)?;
        // Safety: as in `try_get`, with exclusivity from `&mut self`.
        Some(unsafe { self.components[kind as usize].instance_mut::<C>(physical) })
    }

    /// Returns the entity's `C` payload.
    ///
    /// ## Panics
    /// If the entity's type does not carry `C`.
    pub fn get<C: Payload>(&self, entity: Entity) -> &C {
        match self.try_get(entity) {
            Some(payload) => payload,
            None => panic!(
                "entity type {} does not carry {}",
                entity.entity_type,
                std::any::type_name::<C>()
            ),
        }
    }

    /// Mutable variant of [`get`](Self::get).
    ///
    /// ## Panics
    /// If the entity's type does not carry `C`.
    pub fn get_mut<C: Payload>(&mut self, entity: Entity) -> &mut C {
        match self.try_get_mut(entity) {
            Some(payload) => payload,
            None => panic!(
                "entity type {} does not carry {}",
                entity.entity_type,
                std::any::type_name::<C>()
            ),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Query execution
    // ─────────────────────────────────────────────────────────────────────

    /// Runs a query, visiting every matching live entity once with one
    /// mutable reference per tuple position, in tuple order.
    ///
    /// Entity types are visited in definition order; within a type, rows
    /// run in ascending physical order. The visitor must not mutate the
    /// context; use [`run_query_controlled`](Self::run_query_controlled)
    /// for that.
    ///
    /// ## Panics
    /// Before `setup`.
    pub fn run_query<T, F>(&mut self, query: Query<T>, visitor: F)
    where
        T: ComponentTuple,
        F: FnMut(T::Refs<'_>),
    {
        assert!(self.setup_done, "run_query requires setup");
        query::run_plain::<T, F>(self, query.id(), visitor);
    }

    /// Runs a query as one raw [`QueryChunk`] per matching entity type,
    /// for visitors that index the component arrays themselves.
    ///
    /// ## Panics
    /// Before `setup`, or for an unknown query id.
    pub fn run_query_chunks<F>(&mut self, query: QueryId, visitor: F)
    where
        F: FnMut(QueryChunk<'_>),
    {
        assert!(self.setup_done, "run_query_chunks requires setup");
        assert!(
            (query as usize) < self.queries.len(),
            "run_query_chunks: unknown query {query}"
        );
        query::run_chunks(self, query, visitor);
    }

    /// Runs a query with a [`QueryControl`] handle threaded as the first
    /// visitor argument, allowing creates and destroys mid-iteration.
    ///
    /// After any structural call the executor re-resolves its base
    /// pointers, and a row whose entity died is revisited so the instance
    /// swapped into it is not skipped. Component references received by the
    /// visitor are invalid after a structural call on the handle. Destroys
    /// of already-visited siblings are not replayed; see
    /// [`QueryControl::destroy`] for the exact contract.
    ///
    /// ## Panics
    /// Before `setup`.
    pub fn run_query_controlled<T, F>(&mut self, query: Query<T>, mut visitor: F)
    where
        T: ComponentTuple,
        F: FnMut(&mut QueryControl<'_, T>, T::Refs<'_>),
    {
        assert!(self.setup_done, "run_query_controlled requires setup");
        let mut cursor = Cursor { statement: 0, iteration: 0 };
        let ctx: *mut Context = self;
        // Safety: `ctx` comes from `&mut self` and the cursor outlives the
        // call; see `run_controlled_from`.
        unsafe {
            query::run_controlled_from::<T, F>(ctx, query.id(), &mut cursor, &mut visitor);
        }
    }
}
