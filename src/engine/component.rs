//! # Component Kinds
//!
//! This module defines the payload contract and the descriptor captured for
//! every registered component kind.
//!
//! ## Purpose
//! The engine treats component payloads as opaque fixed-size byte blobs; it
//! never calls into payload code except through the zero-construct hook.
//! A descriptor therefore carries everything the storage layer needs: the
//! instance size, the alignment requirement, and the hook.
//!
//! ## Identity
//! Component identity is a per-`Context` concern. Typed registration maps a
//! Rust type to a [`ComponentKindId`](crate::engine::types::ComponentKindId)
//! through the context's own table; untyped registration issues a fresh id
//! per call and leaves identity to the caller. There is no process-global
//! registry.
//!
//! ## Invariants
//! - A registered payload has non-zero size.
//! - A registered payload's alignment is a power of two no greater than
//!   `MAX_PAYLOAD_ALIGN`.
//! - Payloads are trivially copyable and trivially destructible; the typed
//!   layer enforces this through the [`Payload`] bound.

use std::any::type_name;
use std::mem::{align_of, size_of};
use std::ptr;

use crate::engine::error::DefineError;
use crate::engine::types::MAX_PAYLOAD_ALIGN;


/// Marker contract for component payloads.
///
/// A payload must be plain memory: `Copy` rules out drop glue and interior
/// ownership, `'static` rules out borrowed data. Every such type is a
/// payload automatically; size and alignment are validated when the kind is
/// first registered, not by this bound.
pub trait Payload: Copy + 'static {}

impl<T: Copy + 'static> Payload for T {}

/// Zero-construct hook invoked on every freshly opened payload slot.
///
/// Receives the slot pointer and the instance size in bytes.
///
/// # Safety
/// The pointer must be valid for writes of `len` bytes.
pub type ZeroFn = unsafe fn(ptr: *mut u8, len: usize);

/// Default zero-construct hook: fills the slot with zero bytes.
///
/// # Safety
/// `ptr` must be valid for writes of `len` bytes.
pub unsafe fn zero_fill(ptr: *mut u8, len: usize) {
    unsafe { ptr::write_bytes(ptr, 0, len) };
}

/// Describes a component kind to be registered with a `Context`.
///
/// ## Fields
/// - `name`: Diagnostic label (the Rust type name for typed registration).
/// - `instance_size`: `size_of` the payload in bytes.
/// - `align`: Required payload alignment in bytes.
/// - `zero`: Hook invoked on freshly allocated slots.
#[derive(Clone, Copy, Debug)]
pub struct ComponentKindDesc {
    /// Diagnostic label for the payload shape.
    pub name: &'static str,

    /// Payload size in bytes. Must be non-zero.
    pub instance_size: u32,

    /// Payload alignment in bytes. Must be a power of two, at most
    /// `MAX_PAYLOAD_ALIGN`.
    pub align: u32,

    /// Zero-construct hook for fresh slots.
    pub zero: ZeroFn,
}

impl ComponentKindDesc {

    /// Builds the descriptor for payload type `T`.
    #[inline]
    pub fn of<T: Payload>() -> Self {
        Self {
            name: type_name::<T>(),
            instance_size: size_of::<T>() as u32,
            align: align_of::<T>() as u32,
            zero: zero_fill,
        }
    }

    /// Validates the payload shape against the engine's storage contract.
    ///
    /// ## Errors
    /// - `ZeroSizedPayload` for zero-size shapes.
    /// - `InvalidPayloadAlign` for a zero or non-power-of-two alignment.
    /// - `OveralignedPayload` for alignment beyond `MAX_PAYLOAD_ALIGN`.
    pub fn validate(&self) -> Result<(), DefineError> {
        if self.instance_size == 0 {
            return Err(DefineError::ZeroSizedPayload { name: self.name });
        }
        let align = self.align as usize;
        if align == 0 || !align.is_power_of_two() {
            return Err(DefineError::InvalidPayloadAlign { name: self.name, align });
        }
        if align > MAX_PAYLOAD_ALIGN {
            return Err(DefineError::OveralignedPayload { name: self.name, align });
        }
        Ok(())
    }
}
