//! # dense_ecs
//!
//! Dense, two-phase Entity-Component storage engine for real-time
//! simulations (games, physics, agent models).
//!
//! ## Design Goals
//! - Contiguous per-component storage, partitioned into per-entity-type ranges
//! - Linear-scan queries with no per-entity dispatch
//! - O(1) amortised create/destroy with generation-checked handles
//! - A one-way `setup` transition separating schema definition from execution
//!
//! ## Usage sketch
//! ```ignore
//! let mut ctx = Context::new();
//! let boid = ctx.define_entity_type::<(Position, Velocity)>()?;
//! let q = ctx.define_query::<(Velocity, Position)>()?;
//! ctx.setup()?;
//!
//! let e = ctx.create(boid);
//! *ctx.get_mut::<Position>(e) = Position { x: 1.0, y: 2.0 };
//! ctx.run_query(q, |(vel, pos)| {
//!     pos.x += vel.dx;
//!     pos.y += vel.dy;
//! });
//! ```

#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![allow(clippy::module_inception)]
#![deny(dead_code)]

pub mod engine;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (Public API)
// ─────────────────────────────────────────────────────────────────────────────

// Core engine types

pub use engine::context::Context;

pub use engine::entity::{
    Entity,
    EntityType,
};

pub use engine::component::{
    ComponentKindDesc,
    Payload,
    ZeroFn,
};

pub use engine::query::{
    ComponentTuple,
    Query,
    QueryChunk,
    QueryControl,
};

pub use engine::error::{
    DefineError,
    EngineError,
    EngineResult,
};

pub use engine::types::{
    ComponentKindId,
    EntityTypeId,
    Generation,
    LogicalIndex,
    PhysicalIndex,
    QueryId,
};

// ─────────────────────────────────────────────────────────────────────────────
// Prelude (Optional but recommended)
// ─────────────────────────────────────────────────────────────────────────────

/// Commonly used engine types.
///
/// Import with:
/// ```rust
/// use dense_ecs::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Context,
        Entity,
        EntityTypeId,
        Payload,
        Query,
        QueryChunk,
        QueryControl,
        QueryId,
    };
}
