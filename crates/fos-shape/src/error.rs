//! Crate-level error type.
//!
//! Per spec §7, almost every failure mode during shaping is recoverable
//! and absorbed into best-effort behavior (malformed tables are skipped,
//! invalid encoding is replaced, unsupported scripts fall back to the
//! default shaper). The only things that produce a hard `Err` are the
//! ones a caller cannot proceed past: a `Face` that doesn't even parse.

/// Errors that can occur constructing a [`crate::Face`] implementation.
///
/// Shaping itself never returns this type — see
/// [`crate::Buffer::allocation_successful`] for how shaping failure is
/// surfaced instead.
#[derive(Debug, thiserror::Error)]
pub enum ShapeError {
    #[error("font data could not be parsed: {0}")]
    InvalidFont(&'static str),

    #[error("face index {0} out of range")]
    InvalidFaceIndex(u32),
}

pub type Result<T> = std::result::Result<T, ShapeError>;
