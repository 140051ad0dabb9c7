//! Construction-time failure (spec §7): the only error surfaced by this
//! crate. Everything else — out-of-range writes, inaccessible-memory
//! reads, invariant violations — is masked/asserted at the call site and
//! never returned as a `Result`.

use core::fmt;

/// Offset of the cartridge header within a ROM image.
pub const HEADER_START: usize = 0x100;
/// One past the last byte of the cartridge header.
pub const HEADER_END: usize = 0x150;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstructionError {
    /// The ROM image is too short to contain a full cartridge header.
    RomTooShort { len: usize },
}

impl fmt::Display for ConstructionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstructionError::RomTooShort { len } => {
                write!(
                    f,
                    "ROM image is {len} bytes, shorter than the {HEADER_END}-byte header it must contain"
                )
            }
        }
    }
}
