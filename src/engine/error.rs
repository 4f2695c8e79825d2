//! Error types for the definition phase.
//!
//! The engine distinguishes two classes of failure. **Definition-time
//! constraint violations** (registering an invalid payload shape, defining
//! after `setup`, exhausting an id space) are reported as values of the
//! types in this module, so callers can match on the violated rule.
//! **Execution-time contract violations** (creating before `setup`,
//! destroying a dead entity) are programming errors on hot paths; those
//! abort with a diagnostic instead of threading `Result` through the inner
//! loops. `Context::is_alive` is the caller-side gate for the latter.
//!
//! ## Goals
//! * **Specificity:** Each variant models a single failure mode and carries
//!   the offending identifier or shape metadata.
//! * **Ergonomics:** All errors implement [`std::error::Error`] and
//!   [`fmt::Display`], and convert into the aggregate [`EngineError`] via
//!   `From`, so `?` works across layers.
//!
//! ## Display vs. Debug
//! * [`fmt::Display`] is optimized for operator logs (short, imperative
//!   phrasing).
//! * [`fmt::Debug`] (derived) retains full structure for diagnostics.

use std::fmt;

use crate::engine::types::ComponentKindId;


/// Convenience alias for engine-level results.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors produced while declaring component kinds, entity types, and
/// queries, or while performing the `setup` transition.
///
/// All variants are definition-time: once `setup` has succeeded, none of
/// these can occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefineError {

    /// A definition operation was invoked after `setup`.
    AfterSetup,

    /// `setup` was invoked more than once.
    AlreadySetup,

    /// An entity type was defined with an empty component set.
    EmptyComponentSet,

    /// A query was defined with an empty component tuple.
    EmptyQuery,

    /// The same component kind appeared twice in one entity-type definition.
    DuplicateComponent {
        /// The repeated component kind.
        kind: ComponentKindId,
    },

    /// The same component kind appeared twice in one query tuple.
    ///
    /// The typed executor hands out one exclusive reference per tuple
    /// position; duplicate positions would alias.
    DuplicateQueryComponent {
        /// The repeated component kind.
        kind: ComponentKindId,
    },

    /// A component kind id did not name a registered kind.
    UnknownComponent {
        /// The unrecognised id.
        kind: ComponentKindId,
    },

    /// A payload shape with zero size was registered.
    ZeroSizedPayload {
        /// Payload type name, for diagnostics.
        name: &'static str,
    },

    /// A payload shape declared an alignment that is zero or not a power
    /// of two.
    InvalidPayloadAlign {
        /// Payload type name, for diagnostics.
        name: &'static str,
        /// The declared alignment.
        align: usize,
    },

    /// A payload shape required alignment beyond the supported maximum.
    OveralignedPayload {
        /// Payload type name, for diagnostics.
        name: &'static str,
        /// The required alignment.
        align: usize,
    },

    /// The component-kind id space is exhausted.
    KindCapacityExceeded {
        /// Maximum number of component kinds.
        cap: usize,
    },

    /// The entity-type id space is exhausted.
    EntityTypeCapacityExceeded {
        /// Maximum number of entity types.
        cap: usize,
    },
}

impl fmt::Display for DefineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefineError::AfterSetup => {
                f.write_str("definition is not allowed after setup")
            }
            DefineError::AlreadySetup => {
                f.write_str("setup may only be called once")
            }
            DefineError::EmptyComponentSet => {
                f.write_str("entity type must contain at least one component")
            }
            DefineError::EmptyQuery => {
                f.write_str("query must name at least one component")
            }
            DefineError::DuplicateComponent { kind } => {
                write!(f, "component kind {} repeated in entity type definition", kind)
            }
            DefineError::DuplicateQueryComponent { kind } => {
                write!(f, "component kind {} repeated in query tuple", kind)
            }
            DefineError::UnknownComponent { kind } => {
                write!(f, "component kind {} is not registered", kind)
            }
            DefineError::ZeroSizedPayload { name } => {
                write!(f, "payload {} has zero size", name)
            }
            DefineError::InvalidPayloadAlign { name, align } => {
                write!(f, "payload {} declares invalid alignment {}", name, align)
            }
            DefineError::OveralignedPayload { name, align } => {
                write!(f, "payload {} requires alignment {} beyond the supported maximum", name, align)
            }
            DefineError::KindCapacityExceeded { cap } => {
                write!(f, "component kind limit reached (capacity {})", cap)
            }
            DefineError::EntityTypeCapacityExceeded { cap } => {
                write!(f, "entity type limit reached (capacity {})", cap)
            }
        }
    }
}

impl std::error::Error for DefineError {}

/// Aggregate error for all fallible engine operations.
///
/// Currently definition-phase failures are the only recoverable class; the
/// aggregate exists so `?` keeps working if further classes are added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {

    /// A definition-phase constraint was violated.
    Define(DefineError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Define(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Define(e) => Some(e),
        }
    }
}

impl From<DefineError> for EngineError {
    fn from(e: DefineError) -> Self { EngineError::Define(e) }
}
