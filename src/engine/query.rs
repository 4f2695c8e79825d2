//! Query compilation and execution.
//!
//! A query is an **ordered** tuple of component kinds declared before
//! `setup`. At setup time the planner resolves the tuple against every
//! entity type: each type whose component set covers the tuple contributes
//! one *statement* recording, per tuple position, which slot of the type's
//! component-ref list holds that kind. Execution then needs no searching:
//! it resolves one base pointer per position and walks `0..alive_count`
//! with the same index into every base.
//!
//! ## Execution model
//! * [`Context::run_query`](crate::engine::context::Context::run_query)
//!   visits every matching live entity with one `&mut` per tuple position,
//!   monomorphised through [`ComponentTuple`].
//! * [`Context::run_query_chunks`](crate::engine::context::Context::run_query_chunks)
//!   streams one [`QueryChunk`] of raw base pointers per statement for
//!   clients that do their own indexing.
//! * [`Context::run_query_controlled`](crate::engine::context::Context::run_query_controlled)
//!   additionally threads a [`QueryControl`] handle that may create and
//!   destroy entities mid-iteration.
//!
//! ## Safety by discipline
//! The executors hand out references derived from raw base pointers while
//! the `Context` is exclusively borrowed. An uncontrolled iteration must
//! not mutate the context; the controlled variant re-resolves its base
//! pointers after every structural change, and visitors must not touch
//! component references obtained before such a change.

use std::marker::PhantomData;

use crate::engine::context::Context;
use crate::engine::entity::Entity;
use crate::engine::error::DefineError;
use crate::engine::types::{ComponentKindId, EntityTypeId, QueryId};


/// One compiled (query, entity type) pairing.
///
/// `ref_slots[i]` is the index into the entity type's component-ref slice
/// at which the query's i-th component kind lives.
pub(crate) struct QueryStatement {
    pub(crate) entity_type_index: EntityTypeId,
    pub(crate) ref_slots: Vec<u16>,
}

/// A declared query: the ordered kind tuple, plus the statements compiled
/// for it at setup.
pub(crate) struct QueryPlan {
    pub(crate) kinds: Vec<ComponentKindId>,
    pub(crate) statements: Vec<QueryStatement>,
}

/// Typed handle to a declared query.
///
/// Carries the tuple type so execution recovers the visitor's argument
/// types without re-stating them; the handle itself is just the query id.
pub struct Query<T: ComponentTuple> {
    index: QueryId,
    _marker: PhantomData<fn(T)>,
}

impl<T: ComponentTuple> Clone for Query<T> {
    fn clone(&self) -> Self { *self }
}

impl<T: ComponentTuple> Copy for Query<T> {}

impl<T: ComponentTuple> Query<T> {
    pub(crate) fn new(index: QueryId) -> Self {
        Self { index, _marker: PhantomData }
    }

    /// The underlying query id, usable with the untyped execution surface.
    pub fn id(self) -> QueryId { self.index }
}

/// Raw per-statement view streamed by
/// [`Context::run_query_chunks`](crate::engine::context::Context::run_query_chunks).
///
/// `bases[i]` points at the first live instance of the query's i-th
/// component kind for this entity type; instances are packed with stride
/// `instance_sizes[i]`. The same row index addresses the matching instance
/// in every base.
pub struct QueryChunk<'a> {
    /// Entity type this chunk covers.
    pub entity_type: EntityTypeId,

    /// Per-tuple-position base pointers.
    pub bases: &'a [*mut u8],

    /// Per-tuple-position instance strides in bytes.
    pub instance_sizes: &'a [u32],

    /// Number of live rows.
    pub len: u32,
}

/// Ordered component tuples usable as query shapes.
///
/// Implemented for tuples of [`Payload`](crate::engine::component::Payload)
/// types up to arity 5. Each implementation is a monomorphised unwrapping
/// of per-position base pointers into typed references.
pub trait ComponentTuple: 'static {
    /// Number of components in the tuple.
    const LEN: usize;

    /// Per-entity mutable view: one `&mut` per tuple position.
    type Refs<'a>;

    /// Resolves the tuple's kind ids in declaration order, registering
    /// kinds the context has not seen yet.
    fn kinds(ctx: &mut Context) -> Result<Vec<ComponentKindId>, DefineError>;

    /// Builds the per-entity view for row `index` over `bases`.
    ///
    /// # Safety
    /// `bases` must hold `LEN` pointers resolved for this tuple's kinds, in
    /// order, each valid for at least `index + 1` instances, with no other
    /// live reference into the same instances.
    unsafe fn refs_at<'a>(bases: &[*mut u8], index: u32) -> Self::Refs<'a>;
}

macro_rules! impl_component_tuple {
    ($len:expr; $($ty:ident => $idx:tt),+) => {
        impl<$($ty: crate::engine::component::Payload),+> ComponentTuple for ($($ty,)+) {
            const LEN: usize = $len;

            type Refs<'a> = ($(&'a mut $ty,)+);

            fn kinds(ctx: &mut Context) -> Result<Vec<ComponentKindId>, DefineError> {
                Ok(vec![$(ctx.kind_of_or_register::<$ty>()?),+])
            }

            unsafe fn refs_at<'a>(bases: &[*mut u8], index: u32) -> Self::Refs<'a> {
                ($(
                    unsafe {
                        &mut *(bases[$idx]
                            .add(index as usize * std::mem::size_of::<$ty>())
                            as *mut $ty)
                    },
                )+)
            }
        }
    };
}

impl_component_tuple!(1; A => 0);
impl_component_tuple!(2; A => 0, B => 1);
impl_component_tuple!(3; A => 0, B => 1, C => 2);
impl_component_tuple!(4; A => 0, B => 1, C => 2, D => 3);
impl_component_tuple!(5; A => 0, B => 1, C => 2, D => 3, E => 4);

/// Shared iteration state for controlled execution. Captured by pointer in
/// [`QueryControl`] so nested re-entry advances the outer loop.
pub(crate) struct Cursor {
    pub(crate) statement: usize,
    pub(crate) iteration: u32,
}

/// Mutation handle threaded through controlled query execution.
///
/// The handle performs creates and destroys immediately and flags the
/// executor to re-resolve its base pointers before the next row. Component
/// references handed to the visitor are invalidated by any structural call;
/// use the handle first, or on the following row.
pub struct QueryControl<'a, T: ComponentTuple> {
    ctx: *mut Context,
    cursor: *mut Cursor,
    query: QueryId,
    structural: bool,
    current: Entity,
    _marker: PhantomData<(&'a mut Context, fn(T))>,
}

impl<'a, T: ComponentTuple> QueryControl<'a, T> {

    /// Handle of the entity the visitor is currently seeing.
    pub fn current(&self) -> Entity { self.current }

    /// Returns `true` if `entity` is alive.
    pub fn is_alive(&self, entity: Entity) -> bool {
        unsafe { (*self.ctx).is_alive(entity) }
    }

    /// Creates an entity mid-iteration.
    ///
    /// Entities of the entity type currently being iterated are appended to
    /// its live region and will be visited before the statement completes;
    /// entities of other matching types are visited when the executor
    /// reaches their statement.
    pub fn create(&mut self, entity_type: EntityTypeId) -> Entity {
        self.structural = true;
        unsafe { (*self.ctx).create(entity_type) }
    }

    /// Destroys `entity` mid-iteration. The entity must be alive.
    ///
    /// Destroying the current entity swaps another live instance into the
    /// current row; the executor revisits the row so that instance is not
    /// skipped. Destroying an entity the scan has not reached yet (a later
    /// row of the current type, or any entity of a type whose statement
    /// has not started) is likewise fully handled.
    ///
    /// Destroying an already-visited entity of the type currently being
    /// scanned is a caller-contract limitation: the swap-remove moves the
    /// last live instance into a row the cursor has passed, so that
    /// instance is not visited again this run. Callers that need to
    /// destroy earlier siblings should collect their handles and destroy
    /// them after the run returns.
    pub fn destroy(&mut self, entity: Entity) {
        self.structural = true;
        unsafe { (*self.ctx).destroy(entity) };
    }

    /// Re-enters the same query starting from the row after the current
    /// one, running `visitor` over the remainder. The shared cursor means
    /// the outer execution resumes past whatever the nested run consumed.
    pub fn resume<F>(&mut self, mut visitor: F)
    where
        F: FnMut(&mut QueryControl<'_, T>, T::Refs<'_>),
    {
        self.structural = true;
        unsafe {
            (*self.cursor).iteration += 1;
            run_controlled_from::<T, F>(self.ctx, self.query, self.cursor, &mut visitor);
        }
    }
}

/// Resolves base pointers and strides for one statement.
///
/// Returns the owning entity type and its current live count.
pub(crate) fn resolve_statement(
    ctx: &mut Context,
    query: usize,
    statement: usize,
    bases: &mut [*mut u8],
    sizes: &mut [u32],
) -> (EntityTypeId, u32) {
    let (entity_type, ref_first) = {
        let stmt = &ctx.queries[query].statements[statement];
        debug_assert_eq!(stmt.ref_slots.len(), bases.len());
        let et = &ctx.entity_types[stmt.entity_type_index as usize];
        (stmt.entity_type_index, et.components_ref_first)
    };
    let len = ctx.entity_types[entity_type as usize].alive_count;

    for position in 0..bases.len() {
        let slot = ctx.queries[query].statements[statement].ref_slots[position];
        let cref = ctx.component_refs[(ref_first + slot as u32) as usize];
        let first = ctx.ranges[cref.range_global_index as usize].first;
        let store = &mut ctx.components[cref.kind as usize];
        let size = store.instance_size;
        // In-bounds: first never exceeds the buffer capacity.
        bases[position] = unsafe {
            store.base_ptr_mut().add(first as usize * size as usize)
        };
        sizes[position] = size;
    }

    (entity_type, len)
}

/// Recovers the handle of the entity at row `iteration` of a statement,
/// through the reverse map of the query's first component.
pub(crate) fn current_entity(
    ctx: &Context,
    query: usize,
    statement: usize,
    iteration: u32,
) -> Entity {
    let stmt = &ctx.queries[query].statements[statement];
    let et_index = stmt.entity_type_index;
    let et = &ctx.entity_types[et_index as usize];
    let cref = ctx.component_refs
        [(et.components_ref_first + stmt.ref_slots[0] as u32) as usize];
    let range = &ctx.ranges[cref.range_global_index as usize];
    let store = &ctx.components[cref.kind as usize];
    let logical = store.physical_to_logical[(range.first + iteration) as usize];
    Entity {
        entity_type: et_index,
        generation: et.generation[logical as usize],
        index: logical,
    }
}

/// Plain typed execution: visits every matching live entity once.
///
/// The visitor must not mutate the context; use the controlled variant for
/// that.
pub(crate) fn run_plain<T, F>(ctx: &mut Context, query: QueryId, mut visitor: F)
where
    T: ComponentTuple,
    F: FnMut(T::Refs<'_>),
{
    let statement_count = ctx.queries[query as usize].statements.len();
    let mut bases = vec![std::ptr::null_mut::<u8>(); T::LEN];
    let mut sizes = vec![0u32; T::LEN];

    for statement in 0..statement_count {
        let (_, len) = resolve_statement(ctx, query as usize, statement, &mut bases, &mut sizes);
        for row in 0..len {
            // Safety: bases were resolved for this statement and the
            // context is not otherwise borrowed while the visitor runs.
            let refs = unsafe { T::refs_at(&bases, row) };
            visitor(refs);
        }
    }
}

/// Chunked execution: streams one raw view per statement.
pub(crate) fn run_chunks<F>(ctx: &mut Context, query: QueryId, mut visitor: F)
where
    F: FnMut(QueryChunk<'_>),
{
    let arity = ctx.queries[query as usize].kinds.len();
    let statement_count = ctx.queries[query as usize].statements.len();
    let mut bases = vec![std::ptr::null_mut::<u8>(); arity];
    let mut sizes = vec![0u32; arity];

    for statement in 0..statement_count {
        let (entity_type, len) =
            resolve_statement(ctx, query as usize, statement, &mut bases, &mut sizes);
        visitor(QueryChunk {
            entity_type,
            bases: &bases,
            instance_sizes: &sizes,
            len,
        });
    }
}

/// Controlled execution from wherever `cursor` points.
///
/// Live counts are re-read every row, base pointers are re-resolved after
/// every structural change, and a row whose entity died under the visitor
/// is revisited so the swapped-in instance is not skipped.
///
/// # Safety
/// `ctx` must be exclusively owned by this call chain for its duration and
/// `cursor` must outlive it. Both conditions hold for the call path from
/// `Context::run_query_controlled`, which derives them from `&mut self` and
/// a local.
pub(crate) unsafe fn run_controlled_from<T, F>(
    ctx: *mut Context,
    query: QueryId,
    cursor: *mut Cursor,
    visitor: &mut F,
) where
    T: ComponentTuple,
    F: FnMut(&mut QueryControl<'_, T>, T::Refs<'_>),
{
    let mut bases = vec![std::ptr::null_mut::<u8>(); T::LEN];
    let mut sizes = vec![0u32; T::LEN];
    let mut resolved_for = usize::MAX;

    loop {
        let statement_count =
            unsafe { (&(*ctx).queries)[query as usize].statements.len() };
        let (statement, row) = unsafe { ((*cursor).statement, (*cursor).iteration) };
        if statement >= statement_count {
            break;
        }

        let len = unsafe {
            let stmt = &(&(*ctx).queries)[query as usize].statements[statement];
            (&(*ctx).entity_types)[stmt.entity_type_index as usize].alive_count
        };
        if row >= len {
            unsafe {
                (*cursor).statement += 1;
                (*cursor).iteration = 0;
            }
            resolved_for = usize::MAX;
            continue;
        }

        if resolved_for != statement {
            unsafe {
                resolve_statement(&mut *ctx, query as usize, statement, &mut bases, &mut sizes);
            }
            resolved_for = statement;
        }

        let current = unsafe { current_entity(&*ctx, query as usize, statement, row) };
        let mut control = QueryControl::<T> {
            ctx,
            cursor,
            query,
            structural: false,
            current,
            _marker: PhantomData,
        };

        // Safety: bases are current for this statement; the visitor's
        // contract forbids using these references across structural calls.
        let refs = unsafe { T::refs_at(&bases, row) };
        visitor(&mut control, refs);

        let structural = control.structural;
        let moved = unsafe { ((*cursor).statement, (*cursor).iteration) != (statement, row) };
        if moved {
            // A nested resume consumed the remainder; re-read everything.
            resolved_for = usize::MAX;
            continue;
        }
        if structural {
            resolved_for = usize::MAX;
            if !unsafe { (*ctx).is_alive(current) } {
                // The swap-in instance now occupies this row.
                continue;
            }
        }
        unsafe { (*cursor).iteration += 1 };
    }
}
