//! # Entity Handles and Entity-Type Tables
//!
//! This module defines the entity identity model and the per-entity-type
//! bookkeeping that backs it.
//!
//! ## Entity Model
//! An [`Entity`] is a lightweight value triple:
//!
//! - An **entity type id**, naming the component set it was created from
//! - A **generation**, incremented whenever its slot is destroyed
//! - A **logical index**, the stable slot within its entity type
//!
//! Handles are keys, not pointers: they outlive the destruction of their
//! referent and simply stop matching. An entity is alive iff its type id is
//! valid and its generation equals the counter currently stored at
//! `(type, index)`.
//!
//! ## Invariants
//! - `alive_count` equals the live length of every component range owned by
//!   the entity type.
//! - Every index in `free_indices` has a generation that no outstanding
//!   live handle carries.
//! - Logical indices are reused strictly in FIFO order.

use std::collections::VecDeque;

use crate::engine::types::{EntityTypeId, Generation, LogicalIndex};


/// Opaque, generation-checked identifier for an entity.
///
/// ## Notes
/// `Entity` values are cheap to copy and compare. A handle is only
/// meaningful within the `Context` that issued it, and only until a
/// matching-slot destroy or a `clear` bumps the slot's generation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Entity {
    /// Entity type this handle was created from.
    pub entity_type: EntityTypeId,

    /// Freshness counter captured at creation.
    pub generation: Generation,

    /// Stable logical index within the entity type.
    pub index: LogicalIndex,
}

impl Entity {
    /// Handle that is never alive in any context.
    pub const INVALID: Entity = Entity {
        entity_type: EntityTypeId::MAX,
        generation: Generation::MAX,
        index: LogicalIndex::MAX,
    };

    /// Packs the handle into a `u64` whose little-endian byte order is
    /// `(u16 type, u16 generation, u32 index)`.
    #[inline]
    pub fn to_bits(self) -> u64 {
        (self.entity_type as u64)
            | ((self.generation as u64) << 16)
            | ((self.index as u64) << 32)
    }

    /// Inverse of [`to_bits`](Self::to_bits).
    #[inline]
    pub fn from_bits(bits: u64) -> Self {
        Self {
            entity_type: bits as u16,
            generation: (bits >> 16) as u16,
            index: (bits >> 32) as u32,
        }
    }
}

impl Default for Entity {
    fn default() -> Self { Self::INVALID }
}

/// Per-entity-type bookkeeping: the component set, the live count, and the
/// logical-slot lifecycle state.
///
/// The component set itself lives in the context's shared component-ref
/// table; this struct holds the `[first, first + count)` slice coordinates.
pub struct EntityType {
    pub(crate) components_ref_first: u32,
    pub(crate) components_ref_count: u32,
    pub(crate) alive_count: u32,
    pub(crate) generation: Vec<Generation>,
    pub(crate) free_indices: VecDeque<LogicalIndex>,
}

impl EntityType {

    pub(crate) fn new(components_ref_first: u32, components_ref_count: u32) -> Self {
        Self {
            components_ref_first,
            components_ref_count,
            alive_count: 0,
            generation: Vec::new(),
            free_indices: VecDeque::new(),
        }
    }

    /// Number of currently live entities of this type.
    pub fn alive_count(&self) -> u32 { self.alive_count }

    /// Number of component kinds in this type's set.
    pub fn component_count(&self) -> u32 { self.components_ref_count }

    /// Returns `true` if `generation` matches the current counter at
    /// `index`. Out-of-range indices never match.
    #[inline]
    pub(crate) fn is_current(&self, index: LogicalIndex, generation: Generation) -> bool {
        match self.generation.get(index as usize) {
            Some(&current) => current == generation,
            None => false,
        }
    }

    /// Logically destroys every entity of this type: bumps all generations,
    /// rebuilds the free list in index order, and zeroes the live count.
    pub(crate) fn clear(&mut self) {
        for generation in &mut self.generation {
            *generation = generation.wrapping_add(1);
        }
        self.free_indices.clear();
        self.free_indices.extend(0..self.generation.len() as LogicalIndex);
        self.alive_count = 0;
    }
}
