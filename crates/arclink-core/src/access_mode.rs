//! ArchiveLink access modes and the permission bitmask.
//!
//! Every command template requires one access-mode class, written as a
//! single character in signed URLs (`accessMode=r`). Certificates carry a
//! permission bitmask; a signed request is authorized when the bit of the
//! command's mode is set in the certificate's mask.
//!
//! The mapping is `r→1, c→2, u→4, d→8, e→16` and is bijective: converting
//! any valid mode string to a mask and back yields the same string (modes
//! are emitted in the fixed order `r,c,u,d,e`).

use crate::error::{ArchiveError, ArchiveResult};

/// A single ArchiveLink access-mode class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    /// Read access (`r`).
    Read,
    /// Create access (`c`).
    Create,
    /// Update access (`u`).
    Update,
    /// Delete access (`d`).
    Delete,
    /// Eliminate access (`e`) - destruction of whole records.
    Eliminate,
}

/// All access modes in the canonical emission order.
const ALL_MODES: [AccessMode; 5] = [
    AccessMode::Read,
    AccessMode::Create,
    AccessMode::Update,
    AccessMode::Delete,
    AccessMode::Eliminate,
];

impl AccessMode {
    /// Returns the permission bit for this mode.
    #[must_use]
    pub const fn bit(self) -> u32 {
        match self {
            Self::Read => 1,
            Self::Create => 2,
            Self::Update => 4,
            Self::Delete => 8,
            Self::Eliminate => 16,
        }
    }

    /// Returns the wire character for this mode.
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::Read => 'r',
            Self::Create => 'c',
            Self::Update => 'u',
            Self::Delete => 'd',
            Self::Eliminate => 'e',
        }
    }

    /// Parses a wire character into an access mode.
    ///
    /// Any character outside `{r,c,u,d,e}` is a format error.
    pub fn from_char(c: char) -> ArchiveResult<Self> {
        match c {
            'r' => Ok(Self::Read),
            'c' => Ok(Self::Create),
            'u' => Ok(Self::Update),
            'd' => Ok(Self::Delete),
            'e' => Ok(Self::Eliminate),
            other => Err(ArchiveError::validation(format!(
                "Invalid access mode character: {other}"
            ))),
        }
    }
}

/// Converts an access-mode string to a permission bitmask.
///
/// Each character maps to its bit; the bits are OR'd together. An empty
/// string yields 0. Any character outside `{r,c,u,d,e}` is a format error.
///
/// # Example
///
/// ```
/// use arclink_core::access_mode::mask_from_str;
///
/// assert_eq!(mask_from_str("rc").unwrap(), 3);
/// assert_eq!(mask_from_str("rcude").unwrap(), 31);
/// assert!(mask_from_str("rx").is_err());
/// ```
pub fn mask_from_str(modes: &str) -> ArchiveResult<u32> {
    let mut mask = 0;
    for c in modes.chars() {
        mask |= AccessMode::from_char(c)?.bit();
    }
    Ok(mask)
}

/// Converts a permission bitmask back to an access-mode string.
///
/// Set bits are emitted in the fixed order `r,c,u,d,e`; bits outside the
/// known range are ignored.
///
/// # Example
///
/// ```
/// use arclink_core::access_mode::mask_to_string;
///
/// assert_eq!(mask_to_string(3), "rc");
/// assert_eq!(mask_to_string(0), "");
/// ```
#[must_use]
pub fn mask_to_string(mask: u32) -> String {
    let mut out = String::new();
    for mode in ALL_MODES {
        if mask & mode.bit() != 0 {
            out.push(mode.as_char());
        }
    }
    out
}
