#![forbid(unsafe_code)]

//! Error taxonomy shared by every pixheap crate.
//!
//! Every allocator, codec, and lifecycle operation returns a
//! [`HeapError`] value; nothing panics across the public boundary.
//!
//! | Variant | Raised when |
//! |---------|-------------|
//! | `Configuration` | bad width/height/layout/palette, zero-size allocation |
//! | `ResourceExhausted` | allocation table full, capacity exceeded, or no thread for the presenter |
//! | `NotFound` | `free` of an unknown or already freed address |
//! | `InvalidAddress` | `read`/`write` through a stale, freed, or foreign address |
//! | `LengthOutOfRange` | access longer than the allocation |
//! | `HardwareUnavailable` | no backend could be opened, or the context is torn down |
//! | `IntegrityViolation` | checksum, ECC, or header mismatch |
//! | `Backend` | a backend primitive failed |

use std::fmt;

use crate::backend::BackendKind;

/// Result alias for pixheap operations.
pub type Result<T, E = HeapError> = std::result::Result<T, E>;

/// Errors returned by pixheap operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeapError {
    /// Invalid configuration or argument.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Allocation table or surface capacity exhausted.
    #[error("resource exhausted: {reason}")]
    ResourceExhausted {
        /// Which resource ran out.
        reason: Exhaustion,
    },

    /// The address does not name a live allocation.
    #[error("no live allocation at {address}")]
    NotFound {
        /// Raw form of the offending address.
        address: u64,
    },

    /// The address is stale, freed, or out of range.
    #[error("invalid address {address}")]
    InvalidAddress {
        /// Raw form of the offending address.
        address: u64,
    },

    /// Access length exceeds the allocation size.
    #[error("access of {len} bytes exceeds allocation of {size} bytes")]
    LengthOutOfRange {
        /// Requested length.
        len: usize,
        /// Allocation size.
        size: usize,
    },

    /// No pixel backend is available.
    #[error("no pixel backend available ({} candidates tried)", .tried.len())]
    HardwareUnavailable {
        /// Backends that were attempted, in order.
        tried: Vec<BackendKind>,
    },

    /// Stored data failed verification.
    #[error("integrity violation: {0}")]
    IntegrityViolation(IntegrityFault),

    /// A backend primitive failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl HeapError {
    /// Shorthand for a full allocation table.
    #[inline]
    pub const fn table_full() -> Self {
        Self::ResourceExhausted {
            reason: Exhaustion::TableFull,
        }
    }

    /// Shorthand for a capacity overrun.
    #[inline]
    pub const fn too_large(requested: usize, available: usize) -> Self {
        Self::ResourceExhausted {
            reason: Exhaustion::TooLarge {
                requested,
                available,
            },
        }
    }

    /// Error for an operation on a context that has been cleaned up.
    #[inline]
    pub const fn torn_down() -> Self {
        Self::HardwareUnavailable { tried: Vec::new() }
    }

    /// True for `ResourceExhausted` of any kind.
    #[inline]
    pub const fn is_exhausted(&self) -> bool {
        matches!(self, Self::ResourceExhausted { .. })
    }
}

/// Which resource an allocation ran out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exhaustion {
    /// Every allocation table slot is in use.
    TableFull,
    /// The requested range does not fit in the remaining surface capacity.
    TooLarge {
        /// Cells the allocation needs.
        requested: usize,
        /// Cells left above the bump offset.
        available: usize,
    },
    /// The operating system refused to start the presenter thread.
    Threads,
}

impl fmt::Display for Exhaustion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TableFull => write!(f, "allocation table full"),
            Self::TooLarge {
                requested,
                available,
            } => write!(
                f,
                "too large: {requested} cells requested, {available} available"
            ),
            Self::Threads => write!(f, "could not spawn presenter thread"),
        }
    }
}

/// What failed verification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityFault {
    /// Payload checksum disagrees with the stored trailer.
    #[error("checksum mismatch (stored {stored:#010x}, computed {computed:#010x})")]
    Checksum {
        /// Checksum read from the trailer.
        stored: u32,
        /// Checksum of the payload as read.
        computed: u32,
    },
    /// Payload ECC byte disagrees with the stored trailer.
    #[error("ecc mismatch (stored {stored:#04x}, computed {computed:#04x})")]
    Ecc {
        /// ECC byte read from the trailer.
        stored: u8,
        /// ECC byte of the payload as read.
        computed: u8,
    },
    /// A cell's pixels match no palette color.
    #[error("cell {cell} is not decodable")]
    Undecodable {
        /// Cell index.
        cell: u32,
    },
    /// The header region does not start with the format magic.
    #[error("bad header magic {found:02X?}")]
    BadMagic {
        /// Bytes found where the magic was expected.
        found: [u8; 4],
    },
    /// The header was written by an unknown format version.
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u8),
}

/// Failure reported by a pixel backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The backend could not be opened.
    #[error("{kind} backend failed to open: {message}")]
    Open {
        /// Backend that failed.
        kind: BackendKind,
        /// Backend-specific detail.
        message: String,
    },
    /// Presenting a frame failed; the backend may recover on a later frame.
    #[error("present failed: {0}")]
    Present(String),
    /// The backend was already released.
    #[error("backend released")]
    Released,
}
