//! Error type shared by every coordinate operation.
//!
//! All variants are request-local validation failures. They are raised before
//! any shared state is touched, so a failed call leaves the manager exactly as
//! it was.

use thiserror::Error;

use crate::key::StrideKey;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CoordinateError>;

/// Errors raised by indexing, derivation and kernel-map generation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinateError {
    /// A coordinate batch does not have the width of the index it targets.
    #[error("coordinate arity mismatch: index expects {expected} components, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    /// A flat buffer cannot be decoded into rows of the declared width.
    #[error("invalid coordinate size: {len} values cannot form rows of width {width}")]
    InvalidCoordinateSize { len: usize, width: usize },

    /// The key is not registered in the manager.
    #[error("unknown coordinate map key {0}")]
    UnknownCoordinateMapKey(StrideKey),

    /// Inputs of a derivation disagree on arity or stride, or the stride is invalid.
    #[error("incompatible stride: {0}")]
    IncompatibleStride(String),

    /// Kernel geometry vectors do not match the spatial dimension.
    #[error("kernel geometry mismatch: {0}")]
    GeometryMismatch(String),

    /// A prune mask is not aligned with the rows of its level.
    #[error("prune mask has {actual} entries but the level has {expected} rows")]
    MaskLengthMismatch { expected: usize, actual: usize },

    /// Manager configuration cannot be honoured.
    #[error("invalid manager configuration: {0}")]
    InvalidConfig(String),

    /// The allocator refused a request.
    #[error("allocation of {requested} bytes failed ({available} bytes available)")]
    AllocationFailure { requested: usize, available: usize },
}
