//! Error types for the mojic library.

use thiserror::Error;

/// Errors produced while deriving keys, parsing framing, or decoding a
/// stream. All of them are fatal for the pass that raised them; partial
/// output must be discarded by the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MojicError {
    /// The header auth check does not match the supplied password.
    #[error("wrong password: header auth check does not match")]
    WrongPassword,

    /// The header line is not a well-formed salt/auth-check glyph run.
    #[error("invalid header: expected a line of moon/clock glyphs")]
    InvalidHeader,

    /// A payload glyph belongs to neither the keyword ring nor the data
    /// alphabet.
    #[error("payload glyph {0:?} belongs to no bound alphabet")]
    InvalidGlyph(char),

    /// A footer glyph is not a member of the moon/clock alphabet.
    #[error("footer glyph {0:?} is not a moon/clock glyph")]
    InvalidFooter(char),

    /// The stream ended with fewer than the 64 glyphs an integrity seal
    /// needs.
    #[error("stream ends after {0} trailing glyphs, integrity seal needs 64")]
    FileTruncated(usize),

    /// The footer seal does not match the recomputed HMAC.
    #[error("integrity seal mismatch: file tampered with or corrupted")]
    FileTampered,

    /// scrypt rejected its parameters or output length.
    #[error("key derivation failed")]
    KdfFailure,

    /// The pictographic code-point ranges yielded too few glyphs.
    #[error("pictographic alphabet too small: {0} glyphs")]
    AlphabetUnderflow(usize),

    /// A stream method was called before `init`, or after the engine's
    /// single pass already consumed the integrity state.
    #[error("engine not initialized, or already consumed by a pass")]
    EngineNotInitialized,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_the_offending_glyph() {
        let err = MojicError::InvalidGlyph('🦀');
        assert!(format!("{err}").contains('🦀'));
    }

    #[test]
    fn truncation_reports_the_glyph_count() {
        let err = MojicError::FileTruncated(12);
        assert!(format!("{err}").contains("12"));
    }
}
