//! Unified String Canonicalization Normalizer (USCN)
//!
//! Reduces syntactic-variant byte sequences to a single canonical form
//! before any validation decision is made. Percent-encoded, overlong and
//! mixed-encoding spellings of the same structural characters collapse to
//! one representation, so the downstream recognizer's decision space is
//! independent of encoding tricks:
//!
//! ```text
//! validate(s) == validate(normalize(s))   for every input s
//! ```
//!
//! The pipeline runs three phases: encoding substitution over a fixed
//! rewrite table, ASCII case folding, and whitespace-run folding. Output
//! is bounded; an input whose canonical form would exceed the bound is
//! rejected whole, never truncated.

pub mod mappings;
pub mod normalizer;

pub use mappings::{EncodingRule, SecurityRisk, ENCODING_MAP};
pub use normalizer::{equivalent, normalize, CanonicalBuffer, Normalizer};

use thiserror::Error;

/// Hard upper bound on a canonical buffer, in bytes.
pub const OBI_CANONICAL_BUFFER_SIZE: usize = 8192;

/// Normalization errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UscnError {
    /// Canonical output would exceed [`OBI_CANONICAL_BUFFER_SIZE`]
    #[error("canonical output would exceed {limit} bytes")]
    BufferOverflow {
        /// The enforced limit
        limit: usize,
    },

    /// Strict UTF-8 checking is on and the canonical stream is not UTF-8
    #[error("canonical stream is not valid UTF-8 (valid up to byte {valid_up_to})")]
    InvalidUtf8 {
        /// Length of the longest valid prefix
        valid_up_to: usize,
    },
}

/// Result type for USCN operations
pub type Result<T> = std::result::Result<T, UscnError>;

/// Normalizer configuration
///
/// Defaults match zero-trust operation: every fold enabled, strict UTF-8
/// off for compatibility with binary payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UscnConfig {
    /// Apply the encoding-substitution table
    pub encoding_normalize: bool,
    /// Lowercase ASCII letters (non-ASCII bytes pass through)
    pub case_fold: bool,
    /// Collapse whitespace runs to a single space
    pub whitespace_fold: bool,
    /// Require the canonical stream to be valid UTF-8
    pub strict_utf8: bool,
}

impl Default for UscnConfig {
    fn default() -> Self {
        Self {
            encoding_normalize: true,
            case_fold: true,
            whitespace_fold: true,
            strict_utf8: false,
        }
    }
}
