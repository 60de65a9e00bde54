//! Pattern registry and state table
//!
//! Patterns compile to automata exactly once, at registration; the
//! recognizer only ever reuses compiled patterns. Registration is 1:1
//! with state creation, and transitions are wired explicitly, so the
//! whole table is fixed before the first admission and read-only after.

use regex::bytes::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::governance::DEFAULT_PATTERN_COST_WEIGHT;
use crate::{ProtocolError, Result, OBI_MAX_PATTERN_LENGTH, OBI_MAX_STATES, OBI_MAX_TRANSITIONS};

/// Built-in canonical regexes (evaluated over lowercase canonical bytes)
pub const OBI_PATTERN_PROTOCOL_HEADER: &str = r"^obi-protocol-[0-9]+\.[0-9]+:";
/// Version component inside a protocol header
pub const OBI_PATTERN_VERSION: &str = r"[0-9]+\.[0-9]+";
/// 64-digit hex security token
pub const OBI_PATTERN_SECURITY_TOKEN: &str = r"sec:[a-f0-9]{64}";
/// Schema reference with numeric revision
pub const OBI_PATTERN_SCHEMA_REF: &str = r"schema:[a-za-z0-9_-]+\.[0-9]+";
/// Payload delimiter declaring the payload byte count
pub const OBI_PATTERN_PAYLOAD_DELIMITER: &str = r"payload\|[0-9]+\|";
/// Payload content (extent is bounded by the preceding delimiter)
pub const OBI_PATTERN_DATA_PAYLOAD: &str = r".*";
/// Millisecond-epoch audit marker
pub const OBI_PATTERN_AUDIT_MARKER: &str = r"audit:[0-9]{13}";

/// Semantic role a pattern recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternKind {
    /// Message protocol identification
    ProtocolHeader,
    /// Protocol version component
    VersionParse,
    /// Cryptographic authentication token
    SecurityToken,
    /// Schema validation identifier
    SchemaReference,
    /// Structural payload delimiter
    PayloadDelimiter,
    /// Payload data
    DataPayload,
    /// Audit trail marker
    AuditMarker,
    /// State-transition checkpoint
    TransitionBoundary,
    /// Canonical structural separator
    CanonicalDelimiter,
    /// Graceful-degradation marker
    ErrorRecovery,
}

impl PatternKind {
    /// Accepting states belong to payload and audit patterns only
    pub fn is_accepting(self) -> bool {
        matches!(self, Self::DataPayload | Self::AuditMarker)
    }

    /// Uppercase name, as used in exported state tables
    pub fn name(self) -> &'static str {
        match self {
            Self::ProtocolHeader => "PROTOCOL_HEADER",
            Self::VersionParse => "VERSION_PARSE",
            Self::SecurityToken => "SECURITY_TOKEN",
            Self::SchemaReference => "SCHEMA_REFERENCE",
            Self::PayloadDelimiter => "PAYLOAD_DELIMITER",
            Self::DataPayload => "DATA_PAYLOAD",
            Self::AuditMarker => "AUDIT_MARKER",
            Self::TransitionBoundary => "TRANSITION_BOUNDARY",
            Self::CanonicalDelimiter => "CANONICAL_DELIMITER",
            Self::ErrorRecovery => "ERROR_RECOVERY",
        }
    }
}

/// Guard predicate attached to a transition
///
/// A closed set rather than callbacks, so the table stays serializable
/// and the cost bound stays provable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorKind {
    /// No extra guard; the input class alone decides
    None,
    /// Zero-width: re-validate the version inside the previous match
    VersionInHeader,
    /// Zero-width: zero-trust recheck of the previous token's hex digest
    TokenHexDigest,
    /// Consume the delimiter, then the declared payload extent
    PayloadExtent,
}

/// Named recognizer for one semantic role
#[derive(Debug)]
pub struct Pattern {
    /// Pattern id (equal to its state id)
    pub id: u32,
    /// Semantic role
    pub kind: PatternKind,
    /// Compiled automaton, built once at registration
    pub regex: Regex,
    /// Source expression, kept for export
    pub source: String,
    /// True for payload and audit patterns
    pub is_accepting: bool,
    /// Inputs must not bypass normalization to reach this pattern
    pub requires_zt: bool,
    /// Per-transition weight in the governance charge
    pub cost_weight: f64,
}

/// One node of the recognizer
#[derive(Debug, Clone)]
pub struct DfaState {
    /// State id
    pub id: u32,
    /// Exported name
    pub name: String,
    /// Associated pattern id
    pub pattern: u32,
    /// True for the entry state
    pub is_initial: bool,
}

/// Edge between two states, conditioned on an input class
#[derive(Debug, Clone)]
pub struct Transition {
    /// Source state id
    pub from: u32,
    /// Target state id
    pub to: u32,
    /// Pattern whose matches drive this edge
    pub pattern: u32,
    /// Guard predicate
    pub validator: ValidatorKind,
    /// Weight component of the governance charge
    pub cost_weight: f64,
}

/// Immutable-after-construction pattern and state table
///
/// Build, wire, then freeze in an `Arc` to share across engines.
pub struct PatternRegistry {
    zero_trust: bool,
    patterns: Vec<Pattern>,
    states: Vec<DfaState>,
    transitions: Vec<Transition>,
    outgoing: Vec<Vec<usize>>,
}

impl PatternRegistry {
    /// Empty registry
    pub fn new(zero_trust: bool) -> Self {
        Self {
            zero_trust,
            patterns: Vec::new(),
            states: Vec::new(),
            transitions: Vec::new(),
            outgoing: Vec::new(),
        }
    }

    /// The mandatory layered-protocol recognizer:
    ///
    /// ```text
    /// S0 PROTOCOL_START -> S1 VERSION_PARSING -> S2 SECURITY_TOKEN_EXPECTED
    ///    -> S3 TOKEN_VALIDATION -> S4 SCHEMA_REFERENCE -> S5 PAYLOAD_DELIMITER
    ///    -> S6 DATA_PAYLOAD -> S7 AUDIT_MARKER
    /// ```
    pub fn standard(zero_trust: bool) -> Result<Self> {
        let mut registry = Self::new(zero_trust);

        let s0 = registry.register_named(
            PatternKind::ProtocolHeader,
            OBI_PATTERN_PROTOCOL_HEADER,
            "PROTOCOL_START",
        )?;
        let s1 = registry.register_named(
            PatternKind::VersionParse,
            OBI_PATTERN_VERSION,
            "VERSION_PARSING",
        )?;
        let s2 = registry.register_named(
            PatternKind::SecurityToken,
            OBI_PATTERN_SECURITY_TOKEN,
            "SECURITY_TOKEN_EXPECTED",
        )?;
        let s3 = registry.register_named(PatternKind::TransitionBoundary, "", "TOKEN_VALIDATION")?;
        let s4 = registry.register_named(
            PatternKind::SchemaReference,
            OBI_PATTERN_SCHEMA_REF,
            "SCHEMA_REFERENCE",
        )?;
        let s5 = registry.register_named(
            PatternKind::PayloadDelimiter,
            OBI_PATTERN_PAYLOAD_DELIMITER,
            "PAYLOAD_DELIMITER",
        )?;
        let s6 =
            registry.register_named(PatternKind::DataPayload, OBI_PATTERN_DATA_PAYLOAD, "DATA_PAYLOAD")?;
        let s7 =
            registry.register_named(PatternKind::AuditMarker, OBI_PATTERN_AUDIT_MARKER, "AUDIT_MARKER")?;

        registry.link(s0, s1, s0, ValidatorKind::None)?;
        registry.link(s1, s2, s1, ValidatorKind::VersionInHeader)?;
        registry.link(s2, s3, s2, ValidatorKind::None)?;
        registry.link(s3, s4, s3, ValidatorKind::TokenHexDigest)?;
        registry.link(s4, s5, s4, ValidatorKind::None)?;
        registry.link(s5, s6, s5, ValidatorKind::PayloadExtent)?;
        registry.link(s6, s7, s7, ValidatorKind::None)?;

        tracing::info!(
            states = registry.state_count(),
            transitions = registry.transition_count(),
            zero_trust,
            "pattern registry compiled"
        );

        Ok(registry)
    }

    /// Register one pattern and its state. Returns the state id.
    pub fn register(&mut self, kind: PatternKind, regex: &str) -> Result<u32> {
        let id = self.states.len() as u32;
        let name = format!("{}_{}", kind.name(), id);
        self.register_named(kind, regex, name)
    }

    /// Register with an explicit state name
    pub fn register_named(
        &mut self,
        kind: PatternKind,
        regex: &str,
        name: impl Into<String>,
    ) -> Result<u32> {
        if self.states.len() >= OBI_MAX_STATES {
            return Err(ProtocolError::RegistryFull { what: "states", limit: OBI_MAX_STATES });
        }
        if regex.len() > OBI_MAX_PATTERN_LENGTH {
            return Err(ProtocolError::InvalidPattern {
                reason: format!(
                    "expression is {} bytes, limit is {OBI_MAX_PATTERN_LENGTH}",
                    regex.len()
                ),
            });
        }

        let compiled = RegexBuilder::new(regex)
            .unicode(false)
            .dot_matches_new_line(true)
            .build()
            .map_err(|e| ProtocolError::InvalidPattern { reason: e.to_string() })?;

        let id = self.states.len() as u32;
        self.patterns.push(Pattern {
            id,
            kind,
            regex: compiled,
            source: regex.to_string(),
            is_accepting: kind.is_accepting(),
            requires_zt: self.zero_trust,
            cost_weight: DEFAULT_PATTERN_COST_WEIGHT,
        });
        self.states.push(DfaState {
            id,
            name: name.into(),
            pattern: id,
            is_initial: id == 0,
        });
        self.outgoing.push(Vec::new());
        Ok(id)
    }

    /// Wire a transition driven by `pattern`, guarded by `validator`.
    ///
    /// Transition priority is wiring order.
    pub fn link(&mut self, from: u32, to: u32, pattern: u32, validator: ValidatorKind) -> Result<()> {
        if self.transitions.len() >= OBI_MAX_TRANSITIONS {
            return Err(ProtocolError::RegistryFull {
                what: "transitions",
                limit: OBI_MAX_TRANSITIONS,
            });
        }
        for (what, id) in [("state", from), ("state", to), ("pattern", pattern)] {
            if id as usize >= self.states.len() {
                return Err(ProtocolError::InvalidPattern {
                    reason: format!("transition references unknown {what} {id}"),
                });
            }
        }

        let cost_weight = self.patterns[pattern as usize].cost_weight;
        self.outgoing[from as usize].push(self.transitions.len());
        self.transitions.push(Transition { from, to, pattern, validator, cost_weight });
        Ok(())
    }

    /// Zero-trust flag this registry was built with
    pub fn zero_trust(&self) -> bool {
        self.zero_trust
    }

    /// Number of registered states
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Number of wired transitions
    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    /// Entry state id
    pub fn initial_state(&self) -> u32 {
        0
    }

    /// All patterns, in registration order
    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    /// All states, in registration order
    pub fn states(&self) -> &[DfaState] {
        &self.states
    }

    /// All transitions, in wiring order
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Pattern by id
    pub fn pattern(&self, id: u32) -> &Pattern {
        &self.patterns[id as usize]
    }

    /// State by id
    pub fn state(&self, id: u32) -> &DfaState {
        &self.states[id as usize]
    }

    /// Indices of the transitions leaving `state`, in priority order
    pub fn outgoing(&self, state: u32) -> &[usize] {
        self.outgoing.get(state as usize).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True when `state` accepts
    pub fn is_accepting(&self, state: u32) -> bool {
        self.states
            .get(state as usize)
            .map(|s| self.patterns[s.pattern as usize].is_accepting)
            .unwrap_or(false)
    }
}
