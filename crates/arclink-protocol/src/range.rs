//! Byte-range resolution for single-document streaming.

use arclink_core::{ArchiveError, ArchiveResult};

/// Resolves a `fromOffset`/`toOffset` pair against the component length.
///
/// Returns the `(start, length)` window to stream. Negative offsets and a
/// start at or past the end are errors. A window is cut only when
/// `0 <= from < to <= len`; any other combination (notably `to == 0`,
/// the protocol's "no upper bound") yields the full stream from 0.
///
/// # Errors
///
/// Returns a validation error for negative offsets and a validation error
/// when `from` is at or past the content length.
///
/// # Examples
///
/// ```
/// use arclink_protocol::resolve_range;
///
/// assert_eq!(resolve_range(2, 5, 10).unwrap(), (2, 3));
/// assert_eq!(resolve_range(0, 0, 10).unwrap(), (0, 10));
/// assert!(resolve_range(-1, 5, 10).is_err());
/// ```
pub fn resolve_range(from: i64, to: i64, len: u64) -> ArchiveResult<(u64, u64)> {
    if from < 0 || to < 0 {
        return Err(ArchiveError::validation("Negative offset in byte range"));
    }
    let from = from.unsigned_abs();
    let to = to.unsigned_abs();
    if from >= len {
        return Err(ArchiveError::validation(format!(
            "fromOffset {from} is beyond the content length {len}"
        )));
    }
    if from < to && to <= len {
        Ok((from, to - from))
    } else {
        Ok((0, len))
    }
}
