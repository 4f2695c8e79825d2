//! Core Identifiers, Index Types, and Layout Constants
//!
//! This module defines the **fundamental types and compile-time constants**
//! shared across all subsystems of the engine: component registration,
//! entity-type tables, range-partitioned storage, and query execution.
//!
//! ## Design Philosophy
//!
//! The engine is designed around:
//!
//! - **Dense storage** keyed by small numeric identifiers,
//! - **Stable logical indices** decoupled from moving physical slots,
//! - **A fixed schema** compiled once at `setup`.
//!
//! To support these goals, this module:
//!
//! - Uses small, copyable numeric IDs for all engine concepts,
//! - Distinguishes *logical* indices (stable, per entity type) from
//!   *physical* indices (slots in a component buffer, free to move),
//! - Centralises the capacity and alignment limits the storage layer
//!   relies on.
//!
//! ## Identifier spaces
//!
//! - [`ComponentKindId`] values are issued sequentially at definition time,
//!   one per registered payload shape, and double as indices into the
//!   component-store table.
//! - [`EntityTypeId`] values are issued per canonicalised component set;
//!   identical sets share one id.
//! - [`QueryId`] values are issued per ordered component tuple.
//!
//! The all-ones value of each 16-bit id space is reserved as an invalid
//! sentinel, which is why the usable caps below stop one short.

/// Identifier for a registered component kind (payload shape).
pub type ComponentKindId = u16;

/// Identifier for a defined entity type (canonicalised component set).
pub type EntityTypeId = u16;

/// Identifier for a defined query (ordered component tuple).
pub type QueryId = u32;

/// Stable per-entity-type slot index issued by `create`.
pub type LogicalIndex = u32;

/// Slot index within a component kind's backing buffer. May change on any
/// create or destroy of a sibling entity.
pub type PhysicalIndex = u32;

/// Freshness counter used to detect stale entity handles.
///
/// 16-bit and wrapping: a handle collision requires 65536 destroys of the
/// same logical slot without an intervening `clear`. Documented limitation;
/// widening to 32 bits is a mechanical change.
pub type Generation = u16;

/// Maximum number of registrable component kinds.
pub const COMPONENT_KIND_CAP: usize = ComponentKindId::MAX as usize;

/// Maximum number of definable entity types.
pub const ENTITY_TYPE_CAP: usize = EntityTypeId::MAX as usize;

/// Initial per-component buffer capacity, in instances.
///
/// Allocated at `setup` for every component kind; doubled on overflow.
pub const INITIAL_RANGE_CAPACITY: u32 = 16;

/// Upper bound on payload alignment, in bytes.
///
/// Payloads aligned beyond a machine word-pair are refused at definition
/// time; the backing buffers only guarantee this much.
pub const MAX_PAYLOAD_ALIGN: usize = 16;
