#![forbid(unsafe_code)]

//! Integrity trailer for sealed allocations.
//!
//! In integrity mode each allocation reserves [`TRAILER_LEN`] extra cells
//! after its payload:
//!
//! ```text
//! [payload ... ][c0][c1][c2][c3][ecc]
//!                \__ FNV-1a 32, LE _/
//! ```
//!
//! The checksum catches almost any multi-bit damage; the ECC byte is a
//! cheap second opinion that pins single-bit flips to a bit lane. Neither
//! is cryptographic.
//!
//! The trailer is always computed over the allocation's *full* payload, so
//! a short write re-seals the untouched tail too.

use pixheap_core::error::IntegrityFault;

/// Cells occupied by a trailer.
pub const TRAILER_LEN: usize = 5;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// FNV-1a 32-bit hash.
#[inline]
pub fn fnv1a32(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in bytes {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Rotating XOR fold.
///
/// Rotating the accumulator before each byte makes the result depend on byte
/// order, so swapped bytes are detected.
#[inline]
pub fn xor_ecc(bytes: &[u8]) -> u8 {
    bytes
        .iter()
        .fold(0u8, |acc, &byte| acc.rotate_left(1) ^ byte)
}

/// Checksum and ECC byte sealing one payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    /// FNV-1a 32-bit checksum.
    pub checksum: u32,
    /// Rotating XOR fold.
    pub ecc: u8,
}

impl Trailer {
    /// Compute the trailer for `payload`.
    pub fn seal(payload: &[u8]) -> Self {
        Self {
            checksum: fnv1a32(payload),
            ecc: xor_ecc(payload),
        }
    }

    /// Wire form.
    pub fn to_bytes(self) -> [u8; TRAILER_LEN] {
        let [c0, c1, c2, c3] = self.checksum.to_le_bytes();
        [c0, c1, c2, c3, self.ecc]
    }

    /// Parse the wire form.
    pub fn from_bytes(bytes: [u8; TRAILER_LEN]) -> Self {
        let [c0, c1, c2, c3, ecc] = bytes;
        Self {
            checksum: u32::from_le_bytes([c0, c1, c2, c3]),
            ecc,
        }
    }

    /// Check `payload` against this trailer.
    ///
    /// The checksum is compared first; an ECC mismatch is only reported when
    /// the checksum happens to agree.
    pub fn verify(&self, payload: &[u8]) -> Result<(), IntegrityFault> {
        let computed = Self::seal(payload);
        if computed.checksum != self.checksum {
            return Err(IntegrityFault::Checksum {
                stored: self.checksum,
                computed: computed.checksum,
            });
        }
        if computed.ecc != self.ecc {
            return Err(IntegrityFault::Ecc {
                stored: self.ecc,
                computed: computed.ecc,
            });
        }
        Ok(())
    }
}
