//! Sinphasé governance accounting
//!
//! Bounds the work the engine performs per admission. Each admission pays
//! a structural prelude for the compiled automaton, then a per-transition
//! charge of the transition's weight plus a scaled match-length term.
//! Consumed length is scaled by span: structural matches against
//! [`STRUCTURAL_LENGTH_SCALE`], payload-bearing (accepting) matches
//! against the canonical buffer capacity. A full-capacity conformant
//! payload stays inside the budget; a stretched structural match does
//! not.

use serde::{Deserialize, Serialize};

use crate::OBI_CANONICAL_BUFFER_SIZE;

/// Upper bound of the autonomous zone
pub const AUTONOMOUS_COST_THRESHOLD: f64 = 0.5;

/// Upper bound of the warning zone; beyond it admission is rejected
pub const GOVERNANCE_COST_THRESHOLD: f64 = 0.6;

/// Weight of the match-length term in the per-transition charge
pub const MATCH_LENGTH_FACTOR: f64 = 0.1;

/// Prelude cost per registered state
pub const STATE_COMPLEXITY_FACTOR: f64 = 0.01;

/// Prelude cost per registered transition
pub const TRANSITION_COMPLEXITY_FACTOR: f64 = 0.005;

/// Fixed prelude overhead when zero trust is enforced
pub const ZERO_TRUST_OVERHEAD: f64 = 0.05;

/// Span a structural match's length is scaled against, in bytes
pub const STRUCTURAL_LENGTH_SCALE: f64 = 256.0;

/// Default cost weight for a registered pattern's transitions
pub const DEFAULT_PATTERN_COST_WEIGHT: f64 = 0.01;

/// Governance zone an accumulated cost falls in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GovernanceZone {
    /// Cost within the silent-admission budget
    Autonomous,
    /// Admitted, but flagged for observability
    Warning,
    /// Over budget; admission is refused
    Governance,
}

impl GovernanceZone {
    /// Classify an accumulated cost
    pub fn for_cost(cost: f64) -> Self {
        if cost <= AUTONOMOUS_COST_THRESHOLD {
            Self::Autonomous
        } else if cost <= GOVERNANCE_COST_THRESHOLD {
            Self::Warning
        } else {
            Self::Governance
        }
    }
}

impl std::fmt::Display for GovernanceZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Autonomous => write!(f, "autonomous"),
            Self::Warning => write!(f, "warning"),
            Self::Governance => write!(f, "governance"),
        }
    }
}

/// Monotonic per-admission cost counter
#[derive(Debug, Clone, Copy, Default)]
pub struct CostAccumulator {
    value: f64,
}

impl CostAccumulator {
    /// Fresh accumulator at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Charge the structural prelude for a compiled automaton.
    ///
    /// Returns the prelude amount.
    pub fn structural_prelude(
        &mut self,
        state_count: usize,
        transition_count: usize,
        zero_trust: bool,
    ) -> f64 {
        let mut prelude = STATE_COMPLEXITY_FACTOR * state_count as f64
            + TRANSITION_COMPLEXITY_FACTOR * transition_count as f64;
        if zero_trust {
            prelude += ZERO_TRUST_OVERHEAD;
        }
        self.value += prelude;
        prelude
    }

    /// Charge one transition: weight plus the scaled match-length term.
    ///
    /// Returns the increment, which is always non-negative.
    pub fn charge(&mut self, cost_weight: f64, structural_len: usize, payload_len: usize) -> f64 {
        let increment = cost_weight
            + MATCH_LENGTH_FACTOR * (structural_len as f64 / STRUCTURAL_LENGTH_SCALE)
            + MATCH_LENGTH_FACTOR * (payload_len as f64 / OBI_CANONICAL_BUFFER_SIZE as f64);
        self.value += increment;
        increment
    }

    /// Accumulated cost so far
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Zone the current cost falls in
    pub fn zone(&self) -> GovernanceZone {
        GovernanceZone::for_cost(self.value)
    }

    /// True once the governance ceiling is crossed
    pub fn exceeded(&self) -> bool {
        self.value > GOVERNANCE_COST_THRESHOLD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_boundaries() {
        assert_eq!(GovernanceZone::for_cost(0.0), GovernanceZone::Autonomous);
        assert_eq!(GovernanceZone::for_cost(0.5), GovernanceZone::Autonomous);
        assert_eq!(GovernanceZone::for_cost(0.500001), GovernanceZone::Warning);
        assert_eq!(GovernanceZone::for_cost(0.6), GovernanceZone::Warning);
        assert_eq!(GovernanceZone::for_cost(0.600001), GovernanceZone::Governance);
    }

    #[test]
    fn test_structural_prelude() {
        let mut acc = CostAccumulator::new();
        let prelude = acc.structural_prelude(8, 7, true);
        let expected = 0.01 * 8.0 + 0.005 * 7.0 + 0.05;
        assert!((prelude - expected).abs() < 1e-12);
        assert!((acc.value() - expected).abs() < 1e-12);

        let mut open = CostAccumulator::new();
        let no_zt = open.structural_prelude(8, 7, false);
        assert!((no_zt - (expected - 0.05)).abs() < 1e-12);
    }

    #[test]
    fn test_charge_is_monotonic() {
        let mut acc = CostAccumulator::new();
        let mut last = 0.0;
        for (weight, structural, payload) in
            [(0.01, 17, 0), (0.01, 0, 0), (0.01, 68, 0), (0.01, 10, 8000)]
        {
            let increment = acc.charge(weight, structural, payload);
            assert!(increment >= 0.0);
            assert!(acc.value() >= last);
            last = acc.value();
        }
    }

    #[test]
    fn test_payload_bytes_are_cheap_structural_bytes_are_not() {
        let mut payload = CostAccumulator::new();
        payload.charge(0.0, 0, 8000);
        let mut structural = CostAccumulator::new();
        structural.charge(0.0, 8000, 0);
        // A full-capacity payload stays deep in the autonomous zone; the
        // same bytes matched structurally blow the ceiling.
        assert!(payload.value() < 0.1);
        assert!(structural.exceeded());
    }

    #[test]
    fn test_exceeded_tracks_ceiling() {
        let mut acc = CostAccumulator::new();
        acc.charge(0.6, 0, 0);
        assert!(!acc.exceeded());
        acc.charge(0.001, 0, 0);
        assert!(acc.exceeded());
        assert_eq!(acc.zone(), GovernanceZone::Governance);
    }
}
