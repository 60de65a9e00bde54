//! Admission engine
//!
//! Drives the compiled state table over canonical input. The walk is
//! synchronous and runs to completion: normalize, pay the structural
//! prelude, then take the best-matching outgoing transition until the
//! input is exhausted or a rejection fires. The recognizer never inspects
//! raw bytes.

use std::sync::Arc;

use obi_uscn::{Normalizer, UscnConfig, UscnError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::governance::{CostAccumulator, GovernanceZone};
use crate::ir::{IrKind, IrNode, IrStream};
use crate::registry::{PatternRegistry, Transition, ValidatorKind};
use crate::ProtocolError;

/// Soft-miss budget when zero trust is off
pub const DEFAULT_RECOVERY_SKIPS: u32 = 8;

/// Sink the engine parks in after a rejection
pub const REJECTED_STATE: u32 = u32::MAX;

/// Engine configuration
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Normalize-before-validate enforcement
    pub zero_trust: bool,
    /// Consecutive error-recovery skips tolerated before `NoMatch`
    pub max_recovery_skips: u32,
    /// Normalizer configuration
    pub uscn: UscnConfig,
}

impl EngineConfig {
    /// Defaults for the given trust mode: strict zero-trust admits no
    /// recovery skips at all.
    pub fn new(zero_trust: bool) -> Self {
        Self {
            zero_trust,
            max_recovery_skips: if zero_trust { 0 } else { DEFAULT_RECOVERY_SKIPS },
            uscn: UscnConfig::default(),
        }
    }
}

/// Why an admission was refused
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RejectionKind {
    /// Empty buffer handed to admission
    #[error("invalid input: empty buffer")]
    InvalidInput,

    /// Canonical form would exceed the buffer bound
    #[error("canonical output would exceed {limit} bytes")]
    BufferOverflow {
        /// The enforced limit
        limit: usize,
    },

    /// A raw-input path was taken where normalization is enforced, by the
    /// engine flag or by a ZT-requiring pattern
    #[error("raw input reached the recognizer with zero trust enforced")]
    Unnormalized,

    /// No outgoing transition matched at the reported byte offset
    #[error("no transition matched at byte {position}")]
    NoMatch {
        /// Canonical byte offset of the failure
        position: usize,
    },

    /// Accumulated governance cost crossed the ceiling
    #[error("governance budget exceeded: accumulated cost {cost}")]
    BudgetExceeded {
        /// Cost at the violating transition
        cost: f64,
    },
}

/// Structured admission refusal
///
/// Carries the rejection kind, the canonical offset where recognition
/// stopped, the cost accumulated so far and whatever IR was emitted
/// before the failure. No exception-style control flow crosses the API.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    /// What went wrong
    pub kind: RejectionKind,
    /// Canonical byte offset of the failure, where one exists
    pub position: Option<usize>,
    /// Cost accumulated up to the failure
    pub cost: f64,
    /// IR emitted before the failure, ending in an error-condition marker
    pub partial_ir: IrStream,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "admission rejected: {}", self.kind)
    }
}

impl std::error::Error for Rejection {}

/// Successful admission
#[derive(Debug, Clone)]
pub struct Admission {
    /// Recognized lexemes in byte-position order
    pub ir: IrStream,
    /// Final accumulated governance cost
    pub cost: f64,
    /// Zone the cost landed in (never the governance zone)
    pub zone: GovernanceZone,
    /// Accepting state the walk ended in
    pub final_state: u32,
}

/// Engine counters
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EngineStats {
    /// Messages admitted
    pub admissions: u64,
    /// Messages rejected
    pub rejections: u64,
    /// Error-recovery byte skips taken
    pub soft_misses: u64,
    /// IR nodes emitted across admissions
    pub nodes_emitted: u64,
    /// Canonical bytes of admitted messages
    pub bytes_admitted: u64,
    /// Admissions that landed in the warning zone
    pub warnings: u64,
}

/// One configured recognizer session
///
/// Owns its per-admission state; the pattern registry is shared read-only.
/// One admission runs at a time; callers needing parallel admissions
/// instantiate one engine per thread over the same registry.
pub struct Engine {
    registry: Arc<PatternRegistry>,
    normalizer: Normalizer,
    config: EngineConfig,
    current_state: u32,
    cost: CostAccumulator,
    stats: EngineStats,
}

/// Outcome of probing one transition at the current position
struct TransitionMatch {
    transition: usize,
    consumed: usize,
    structural_len: usize,
    payload_len: usize,
    /// (pattern id, content range) of the node to emit, if any
    emit: Option<(u32, std::ops::Range<usize>)>,
}

impl Engine {
    /// Engine over the standard layered-protocol registry
    pub fn new(zero_trust: bool) -> Result<Self, ProtocolError> {
        let registry = Arc::new(PatternRegistry::standard(zero_trust)?);
        Ok(Self::with_registry(registry, EngineConfig::new(zero_trust)))
    }

    /// Engine over a shared, frozen registry
    pub fn with_registry(registry: Arc<PatternRegistry>, config: EngineConfig) -> Self {
        let normalizer = Normalizer::new(config.uscn);
        let current_state = registry.initial_state();
        Self {
            registry,
            normalizer,
            config,
            current_state,
            cost: CostAccumulator::new(),
            stats: EngineStats::default(),
        }
    }

    /// Admit one raw message: normalize, recognize, gate.
    pub fn admit(&mut self, input: &[u8]) -> Result<Admission, Rejection> {
        self.reset();
        if input.is_empty() {
            return Err(self.reject(RejectionKind::InvalidInput, None, IrStream::new()));
        }

        let canonical = match self.normalizer.normalize(input) {
            Ok(c) => c,
            Err(UscnError::BufferOverflow { limit }) => {
                return Err(self.reject(RejectionKind::BufferOverflow { limit }, None, IrStream::new()));
            }
            Err(UscnError::InvalidUtf8 { valid_up_to }) => {
                return Err(self.reject(
                    RejectionKind::InvalidInput,
                    Some(valid_up_to),
                    IrStream::new(),
                ));
            }
        };

        self.run(canonical.as_bytes(), true)
    }

    /// Admit input the caller claims is already canonical.
    ///
    /// With zero trust on, the claim is verified up front: input that is
    /// not a normalization fixed point rejects as `Unnormalized`.
    /// Independently of the engine flag, the walk refuses to drive any
    /// transition whose pattern carries `requires_zt` over input that
    /// bypassed normalization.
    pub fn admit_canonical(&mut self, input: &[u8]) -> Result<Admission, Rejection> {
        self.reset();
        if input.is_empty() {
            return Err(self.reject(RejectionKind::InvalidInput, None, IrStream::new()));
        }
        let canonical_input = self.normalizer.is_canonical(input);
        if self.config.zero_trust && !canonical_input {
            return Err(self.reject(RejectionKind::Unnormalized, Some(0), IrStream::new()));
        }
        self.run(input, canonical_input)
    }

    fn run(&mut self, canonical: &[u8], normalized: bool) -> Result<Admission, Rejection> {
        let prelude = self.cost.structural_prelude(
            self.registry.state_count(),
            self.registry.transition_count(),
            self.config.zero_trust,
        );
        tracing::trace!(prelude, len = canonical.len(), "admission started");

        let mut ir = IrStream::new();
        let mut pos = 0usize;
        let mut skips = 0u32;
        let mut zero_width_run = 0u32;
        // Range of the previous consuming match, for zero-width guards.
        let mut last_match: Option<std::ops::Range<usize>> = None;

        loop {
            let outgoing = self.registry.outgoing(self.current_state);
            if outgoing.is_empty() {
                break;
            }

            // A pattern flagged requires-ZT never drives a transition
            // over input that bypassed normalization.
            if !normalized {
                let blocked = outgoing.iter().any(|&ti| {
                    let t = &self.registry.transitions()[ti];
                    self.registry.pattern(t.pattern).requires_zt
                });
                if blocked {
                    return Err(self.reject(RejectionKind::Unnormalized, Some(pos), ir));
                }
            }

            // Longest match wins. Probes run in wiring order, and a tie
            // keeps the incumbent, so equal-length candidates resolve to
            // the earlier registration (and with it the lower target id).
            let mut best: Option<TransitionMatch> = None;
            for &ti in outgoing {
                let Some(probe) = self.probe(ti, canonical, pos, last_match.clone()) else {
                    continue;
                };
                if best.as_ref().map_or(true, |b| probe.consumed > b.consumed) {
                    best = Some(probe);
                }
            }

            let Some(step) = best else {
                if pos >= canonical.len() {
                    break;
                }
                if skips >= self.config.max_recovery_skips {
                    return Err(self.reject(RejectionKind::NoMatch { position: pos }, Some(pos), ir));
                }
                skips += 1;
                self.stats.soft_misses += 1;
                tracing::debug!(position = pos, skips, "soft miss, skipping one byte");
                pos += 1;
                continue;
            };

            if step.consumed == 0 {
                zero_width_run += 1;
                // A mis-wired registry must not spin on validators.
                if zero_width_run as usize > self.registry.state_count() {
                    return Err(self.reject(RejectionKind::NoMatch { position: pos }, Some(pos), ir));
                }
            } else {
                zero_width_run = 0;
                skips = 0;
                last_match = Some(pos..pos + step.consumed);
            }

            let transition = &self.registry.transitions()[step.transition];
            let increment =
                self.cost.charge(transition.cost_weight, step.structural_len, step.payload_len);

            if let Some((pattern_id, range)) = step.emit {
                let kind = IrKind::from_pattern(self.registry.pattern(pattern_id).kind);
                ir.push(IrNode {
                    kind,
                    content: canonical[range].to_vec(),
                    source_state: self.current_state,
                    cost: increment,
                });
                self.stats.nodes_emitted += 1;
            }

            tracing::trace!(
                from = self.current_state,
                to = transition.to,
                consumed = step.consumed,
                cost = self.cost.value(),
                "transition"
            );
            pos += step.consumed;
            self.current_state = transition.to;

            if self.cost.exceeded() {
                let cost = self.cost.value();
                return Err(self.reject(
                    RejectionKind::BudgetExceeded { cost },
                    Some(pos),
                    ir,
                ));
            }
        }

        if pos < canonical.len() || !self.registry.is_accepting(self.current_state) {
            return Err(self.reject(RejectionKind::NoMatch { position: pos }, Some(pos), ir));
        }

        let cost = self.cost.value();
        let zone = self.cost.zone();
        self.stats.admissions += 1;
        self.stats.bytes_admitted += canonical.len() as u64;
        if zone == GovernanceZone::Warning {
            self.stats.warnings += 1;
            tracing::warn!(cost, final_state = self.current_state, "admission in warning zone");
        } else {
            tracing::debug!(
                cost,
                nodes = ir.len(),
                final_state = self.current_state,
                "admission complete"
            );
        }

        Ok(Admission { ir, cost, zone, final_state: self.current_state })
    }

    /// Probe one transition at `pos`. Returns `None` when its guard does
    /// not hold.
    fn probe(
        &self,
        transition_index: usize,
        canonical: &[u8],
        pos: usize,
        last_match: Option<std::ops::Range<usize>>,
    ) -> Option<TransitionMatch> {
        let transition = &self.registry.transitions()[transition_index];
        let pattern = self.registry.pattern(transition.pattern);

        match transition.validator {
            ValidatorKind::None => {
                let m = pattern.regex.find(&canonical[pos..])?;
                if m.start() != 0 || m.end() == 0 {
                    return None;
                }
                let consumed = m.end();
                let (structural, payload) =
                    if pattern.is_accepting { (0, consumed) } else { (consumed, 0) };
                Some(TransitionMatch {
                    transition: transition_index,
                    consumed,
                    structural_len: structural,
                    payload_len: payload,
                    emit: Some((transition.pattern, pos..pos + consumed)),
                })
            }
            ValidatorKind::VersionInHeader => {
                let previous = &canonical[last_match?];
                pattern.regex.is_match(previous).then(|| TransitionMatch {
                    transition: transition_index,
                    consumed: 0,
                    structural_len: 0,
                    payload_len: 0,
                    emit: None,
                })
            }
            ValidatorKind::TokenHexDigest => {
                let previous = &canonical[last_match?];
                let digest = previous.strip_prefix(b"sec:").unwrap_or(previous);
                let valid = digest.len() == 64
                    && digest.iter().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase());
                valid.then(|| TransitionMatch {
                    transition: transition_index,
                    consumed: 0,
                    structural_len: 0,
                    payload_len: 0,
                    emit: None,
                })
            }
            ValidatorKind::PayloadExtent => {
                self.probe_payload(transition_index, transition, canonical, pos)
            }
        }
    }

    /// Delimiter plus declared payload extent as one step: `payload|N|`
    /// announces N, the following min(N, remaining) bytes must match the
    /// target state's payload pattern, and the emitted node carries
    /// exactly those payload bytes.
    fn probe_payload(
        &self,
        transition_index: usize,
        transition: &Transition,
        canonical: &[u8],
        pos: usize,
    ) -> Option<TransitionMatch> {
        let delimiter = self.registry.pattern(transition.pattern);
        let m = delimiter.regex.find(&canonical[pos..])?;
        if m.start() != 0 {
            return None;
        }
        let delimiter_len = m.end();

        let digits = &canonical[pos..pos + delimiter_len];
        let declared: usize = digits
            .iter()
            .filter(|b| b.is_ascii_digit())
            .fold(0usize, |n, &b| n.saturating_mul(10).saturating_add((b - b'0') as usize));

        let payload_start = pos + delimiter_len;
        let available = canonical.len() - payload_start;
        let extent = declared.min(available);

        let payload_pattern = self
            .registry
            .pattern(self.registry.state(transition.to).pattern);
        let payload = &canonical[payload_start..payload_start + extent];
        let matched = payload_pattern
            .regex
            .find(payload)
            .and_then(|pm| (pm.start() == 0).then(|| pm.end()));
        // An empty declared extent is still a valid (empty) payload.
        let payload_len = if extent == 0 { 0 } else { matched? };

        Some(TransitionMatch {
            transition: transition_index,
            consumed: delimiter_len + payload_len,
            structural_len: delimiter_len,
            payload_len,
            emit: Some((
                self.registry.state(transition.to).pattern,
                payload_start..payload_start + payload_len,
            )),
        })
    }

    fn reject(
        &mut self,
        kind: RejectionKind,
        position: Option<usize>,
        mut partial_ir: IrStream,
    ) -> Rejection {
        if let Some(offset) = position {
            // Mark the rejection point inside the stream itself.
            partial_ir.push(IrNode {
                kind: IrKind::ErrorCondition,
                content: Vec::new(),
                source_state: self.current_state,
                cost: 0.0,
            });
            tracing::debug!(%kind, offset, "admission rejected");
        } else {
            tracing::debug!(%kind, "admission rejected");
        }
        self.stats.rejections += 1;
        self.current_state = REJECTED_STATE;
        Rejection { kind, position, cost: self.cost.value(), partial_ir }
    }

    /// Reset per-admission state (done implicitly by every admit call)
    pub fn reset(&mut self) {
        self.current_state = self.registry.initial_state();
        self.cost = CostAccumulator::new();
    }

    /// Accumulated governance cost of the last admission
    pub fn cost(&self) -> f64 {
        self.cost.value()
    }

    /// Current DFA state ([`REJECTED_STATE`] after a rejection)
    pub fn current_state(&self) -> u32 {
        self.current_state
    }

    /// Shared pattern registry
    pub fn registry(&self) -> &Arc<PatternRegistry> {
        &self.registry
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Canonical-equivalence predicate under this engine's normalizer
    pub fn equivalent(&self, a: &[u8], b: &[u8]) -> bool {
        self.normalizer.equivalent(a, b)
    }

    /// Engine counters
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> String {
        "A".repeat(64)
    }

    fn happy_message() -> Vec<u8> {
        format!(
            "OBI-PROTOCOL-1.0:SEC:{}SCHEMA:msg.1PAYLOAD|5|helloAUDIT:1700000000000",
            token()
        )
        .into_bytes()
    }

    #[test]
    fn test_happy_path_ir_and_final_state() {
        let mut engine = Engine::new(true).expect("engine");
        let admission = engine.admit(&happy_message()).expect("admitted");

        assert_eq!(
            admission.ir.kinds(),
            vec![
                IrKind::ProtocolMessage,
                IrKind::SecurityContext,
                IrKind::SchemaValidation,
                IrKind::PayloadBlock,
                IrKind::AuditRecord,
            ]
        );
        assert_eq!(admission.final_state, 7);
        assert!(admission.cost <= 0.5, "cost {} out of autonomous zone", admission.cost);
        assert_eq!(admission.zone, GovernanceZone::Autonomous);
        assert_eq!(engine.current_state(), 7);
    }

    #[test]
    fn test_ir_contents_are_canonical_copies() {
        let mut engine = Engine::new(true).expect("engine");
        let admission = engine.admit(&happy_message()).expect("admitted");
        let nodes = admission.ir.as_slice();
        assert_eq!(nodes[0].content, b"obi-protocol-1.0:");
        assert_eq!(nodes[1].content, format!("sec:{}", token().to_lowercase()).into_bytes());
        assert_eq!(nodes[2].content, b"schema:msg.1");
        assert_eq!(nodes[3].content, b"hello");
        assert_eq!(nodes[4].content, b"audit:1700000000000");
        // Source states are the states each match began in.
        let sources: Vec<u32> = nodes.iter().map(|n| n.source_state).collect();
        assert_eq!(sources, vec![0, 2, 4, 5, 6]);
    }

    #[test]
    fn test_message_may_stop_at_payload_state() {
        let mut engine = Engine::new(true).expect("engine");
        let input = format!("OBI-PROTOCOL-1.0:SEC:{}SCHEMA:msg.1PAYLOAD|5|hello", token());
        let admission = engine.admit(input.as_bytes()).expect("admitted without audit marker");
        assert_eq!(admission.final_state, 6);
        assert_eq!(
            admission.ir.kinds(),
            vec![
                IrKind::ProtocolMessage,
                IrKind::SecurityContext,
                IrKind::SchemaValidation,
                IrKind::PayloadBlock,
            ]
        );
    }

    #[test]
    fn test_empty_input_is_invalid() {
        let mut engine = Engine::new(true).expect("engine");
        let rejection = engine.admit(b"").unwrap_err();
        assert_eq!(rejection.kind, RejectionKind::InvalidInput);
        assert!(rejection.partial_ir.is_empty());
    }

    #[test]
    fn test_short_token_no_match_at_token_offset() {
        let mut engine = Engine::new(true).expect("engine");
        let input = format!("OBI-PROTOCOL-1.0:SEC:{}", "A".repeat(63));
        let rejection = engine.admit(input.as_bytes()).unwrap_err();
        assert_eq!(rejection.kind, RejectionKind::NoMatch { position: 17 });
        assert_eq!(rejection.position, Some(17));
        // Header was recognized before the failure; the stream ends in
        // the error-condition marker.
        let kinds = rejection.partial_ir.kinds();
        assert_eq!(kinds, vec![IrKind::ProtocolMessage, IrKind::ErrorCondition]);
        assert_eq!(engine.current_state(), REJECTED_STATE);
    }

    #[test]
    fn test_trailing_garbage_rejects() {
        let mut engine = Engine::new(true).expect("engine");
        let mut input = happy_message();
        input.extend_from_slice(b"zzz");
        let rejection = engine.admit(&input).unwrap_err();
        assert!(matches!(rejection.kind, RejectionKind::NoMatch { .. }));
    }

    #[test]
    fn test_case_variants_admit_identically() {
        let mut engine = Engine::new(true).expect("engine");
        let upper = format!("OBI-PROTOCOL-1.0:SEC:{}SCHEMA:msg.1PAYLOAD|5|hello", token());
        let lower = upper.to_lowercase();
        let a = engine.admit(upper.as_bytes()).expect("upper admitted");
        let b = engine.admit(lower.as_bytes()).expect("lower admitted");
        assert_eq!(a.ir, b.ir);
        assert_eq!(a.final_state, b.final_state);
    }

    #[test]
    fn test_encoded_payload_variant_yields_identical_ir() {
        // A path-traversal spelling inside the payload canonicalizes
        // before the declared extent is taken, so both spellings admit
        // to the same IR.
        let mut engine = Engine::new(true).expect("engine");
        let encoded = format!(
            "OBI-PROTOCOL-1.0:SEC:{}SCHEMA:msg.1PAYLOAD|3|%2e%2e%2fAUDIT:1700000000000",
            token()
        );
        let plain = format!(
            "OBI-PROTOCOL-1.0:SEC:{}SCHEMA:msg.1PAYLOAD|3|../AUDIT:1700000000000",
            token()
        );
        let a = engine.admit(encoded.as_bytes()).expect("encoded admitted");
        let b = engine.admit(plain.as_bytes()).expect("plain admitted");
        assert_eq!(a.ir, b.ir);
        assert_eq!(a.ir.as_slice()[3].content, b"../");
    }

    #[test]
    fn test_empty_declared_payload() {
        let mut engine = Engine::new(true).expect("engine");
        let input = format!(
            "OBI-PROTOCOL-1.0:SEC:{}SCHEMA:msg.1PAYLOAD|0|AUDIT:1700000000000",
            token()
        );
        let admission = engine.admit(input.as_bytes()).expect("admitted");
        let payload = &admission.ir.as_slice()[3];
        assert_eq!(payload.kind, IrKind::PayloadBlock);
        assert!(payload.content.is_empty());
        assert_eq!(admission.final_state, 7);
    }

    #[test]
    fn test_budget_exceeded_returns_partial_ir() {
        let mut engine = Engine::new(true).expect("engine");
        // A stretched schema reference drives the structural match-length
        // term past the governance ceiling mid-admission.
        let input = format!(
            "OBI-PROTOCOL-1.0:SEC:{}SCHEMA:{}.1PAYLOAD|5|helloAUDIT:1700000000000",
            token(),
            "x".repeat(1200)
        );
        let rejection = engine.admit(input.as_bytes()).unwrap_err();
        match rejection.kind {
            RejectionKind::BudgetExceeded { cost } => assert!(cost > 0.6, "cost {cost}"),
            other => panic!("expected BudgetExceeded, got {other:?}"),
        }
        assert!(rejection.cost > 0.6);
        assert_eq!(
            rejection.partial_ir.kinds(),
            vec![
                IrKind::ProtocolMessage,
                IrKind::SecurityContext,
                IrKind::SchemaValidation,
                IrKind::ErrorCondition,
            ]
        );
    }

    #[test]
    fn test_warning_zone_admission() {
        let mut engine = Engine::new(true).expect("engine");
        let input = format!(
            "OBI-PROTOCOL-1.0:SEC:{}SCHEMA:{}.1PAYLOAD|5|helloAUDIT:1700000000000",
            token(),
            "x".repeat(700)
        );
        let admission = engine.admit(input.as_bytes()).expect("admitted with warning");
        assert_eq!(admission.zone, GovernanceZone::Warning);
        assert!(admission.cost > 0.5 && admission.cost <= 0.6, "cost {}", admission.cost);
        assert_eq!(engine.stats().warnings, 1);
    }

    #[test]
    fn test_full_capacity_message_admits() {
        // Exactly 8192 canonical bytes, grammar-conformant: the payload
        // length term is scaled against the buffer capacity, so the
        // message stays admissible.
        let mut engine = Engine::new(true).expect("engine");
        let payload = "p".repeat(8063);
        let input = format!(
            "OBI-PROTOCOL-1.0:SEC:{}SCHEMA:msg.1PAYLOAD|8063|{}AUDIT:1700000000000",
            token(),
            payload
        );
        assert_eq!(input.len(), 8192);
        let admission = engine.admit(input.as_bytes()).expect("admitted at capacity");
        assert_eq!(admission.final_state, 7);
        assert!(admission.cost <= 0.6);
    }

    #[test]
    fn test_expansion_overflow_rejects_without_ir() {
        let mut engine = Engine::new(true).expect("engine");
        let input = b"%2f".repeat(crate::OBI_CANONICAL_BUFFER_SIZE + 1);
        let rejection = engine.admit(&input).unwrap_err();
        assert_eq!(
            rejection.kind,
            RejectionKind::BufferOverflow { limit: crate::OBI_CANONICAL_BUFFER_SIZE }
        );
        assert!(rejection.partial_ir.is_empty());
    }

    #[test]
    fn test_admit_canonical_enforces_zero_trust() {
        let mut engine = Engine::new(true).expect("engine");
        let raw = happy_message();
        let rejection = engine.admit_canonical(&raw).unwrap_err();
        assert_eq!(rejection.kind, RejectionKind::Unnormalized);

        let canonical = String::from_utf8(raw).expect("ascii").to_lowercase();
        let admission = engine.admit_canonical(canonical.as_bytes()).expect("canonical admitted");
        assert_eq!(admission.final_state, 7);
    }

    #[test]
    fn test_zero_trust_patterns_reject_raw_input_under_open_config() {
        // The engine flag is off, but every pattern in a zero-trust
        // registry carries requires_zt: raw input is refused at the first
        // transition it would drive.
        let registry = Arc::new(PatternRegistry::standard(true).expect("registry"));
        let mut engine = Engine::with_registry(registry, EngineConfig::new(false));
        let rejection = engine.admit_canonical(&happy_message()).unwrap_err();
        assert_eq!(rejection.kind, RejectionKind::Unnormalized);
        assert_eq!(rejection.position, Some(0));

        // The same bytes through the normalizing path admit fine.
        let admission = engine.admit(&happy_message()).expect("admitted");
        assert_eq!(admission.final_state, 7);
    }

    #[test]
    fn test_admit_canonical_without_zero_trust_trusts_caller() {
        let mut engine = Engine::new(false).expect("engine");
        let canonical =
            format!("obi-protocol-1.0:sec:{}schema:msg.1payload|5|hello", token().to_lowercase());
        let admission = engine.admit_canonical(canonical.as_bytes()).expect("admitted");
        assert_eq!(admission.final_state, 6);
    }

    #[test]
    fn test_recovery_skips_allow_slack_outside_zero_trust() {
        // Three bytes of garbage between the schema and the delimiter:
        // strict zero trust rejects, the open profile skips past them.
        let body = format!("OBI-PROTOCOL-1.0:SEC:{}SCHEMA:msg.1@@@PAYLOAD|5|hello", token());

        let mut strict = Engine::new(true).expect("engine");
        let rejection = strict.admit(body.as_bytes()).unwrap_err();
        assert!(matches!(rejection.kind, RejectionKind::NoMatch { .. }));

        let mut open = Engine::new(false).expect("engine");
        let admission = open.admit(body.as_bytes()).expect("admitted with skips");
        assert_eq!(admission.final_state, 6);
        assert_eq!(open.stats().soft_misses, 3);
    }

    #[test]
    fn test_cost_resets_between_admissions() {
        let mut engine = Engine::new(true).expect("engine");
        let first = engine.admit(&happy_message()).expect("admitted");
        let second = engine.admit(&happy_message()).expect("admitted again");
        assert!((first.cost - second.cost).abs() < 1e-12);
        assert_eq!(engine.stats().admissions, 2);
    }

    #[test]
    fn test_engines_share_a_registry() {
        let registry = Arc::new(PatternRegistry::standard(true).expect("registry"));
        let mut a = Engine::with_registry(Arc::clone(&registry), EngineConfig::new(true));
        let mut b = Engine::with_registry(registry, EngineConfig::new(true));
        assert!(a.admit(&happy_message()).is_ok());
        assert!(b.admit(&happy_message()).is_ok());
    }

    #[test]
    fn test_equivalence_predicate_on_engine() {
        let engine = Engine::new(true).expect("engine");
        assert!(engine.equivalent(b"%2e%2e%2f", b"../"));
        assert!(!engine.equivalent(b"a", b"b"));
    }
}
