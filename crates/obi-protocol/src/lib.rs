//! OBIBuf protocol admission engine
//!
//! Validates structured messages against a pre-declared grammar with
//! bounded, auditable cost. Raw bytes pass through USCN canonicalization
//! first; the recognizer only ever inspects canonical input, so
//! encoding-variant spellings of the same message admit (or reject)
//! identically.
//!
//! ## Pipeline
//!
//! ```text
//! raw bytes -> USCN normalizer -> canonical bytes
//!           -> DFA engine (pattern registry) -> IR stream + cost
//!           -> admission decision (Sinphasé governance gate)
//! ```
//!
//! One [`Engine`] runs one admission at a time; the compiled
//! [`PatternRegistry`] is immutable after construction and may be shared
//! across engines by reference.

pub mod dfa;
pub mod export;
pub mod governance;
pub mod ir;
pub mod registry;

pub use dfa::{Admission, Engine, EngineConfig, EngineStats, Rejection, RejectionKind};
pub use export::{DfaSpec, ExportFormat};
pub use governance::{CostAccumulator, GovernanceZone};
pub use ir::{IrKind, IrNode, IrStream};
pub use registry::{DfaState, Pattern, PatternKind, PatternRegistry, Transition, ValidatorKind};

pub use obi_uscn::OBI_CANONICAL_BUFFER_SIZE;

use thiserror::Error;

/// Maximum number of DFA states a registry will hold
pub const OBI_MAX_STATES: usize = 256;

/// Maximum number of transitions a registry will hold
pub const OBI_MAX_TRANSITIONS: usize = 1024;

/// Maximum length of a pattern's regular expression, in bytes
pub const OBI_MAX_PATTERN_LENGTH: usize = 512;

/// Construction-time and export errors
///
/// Admission-time rejections are structured data ([`Rejection`]), not
/// error-enum control flow; this enum covers the registry and exporter
/// boundaries only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Pattern failed validation at registration
    #[error("invalid pattern: {reason}")]
    InvalidPattern {
        /// Why the pattern was refused
        reason: String,
    },

    /// Registry capacity exhausted
    #[error("registry full: {limit} {what} already registered")]
    RegistryFull {
        /// Which table overflowed
        what: &'static str,
        /// The enforced limit
        limit: usize,
    },

    /// Exporter asked for an unknown specification format
    #[error("unsupported export format: {0:?}")]
    UnsupportedFormat(String),
}

/// Result type for registry and exporter operations
pub type Result<T> = std::result::Result<T, ProtocolError>;
