//! Cross-language DFA specification export
//!
//! Serializes the compiled recognizer (states, transition matrix,
//! encoding map, governance thresholds) so non-Rust endpoints can rebuild
//! an equivalent admission automaton. YAML and JSON are the interchange
//! formats; the C header render carries the binding constants for
//! embedded consumers.

use serde::{Deserialize, Serialize};

use crate::dfa::Engine;
use crate::governance::{AUTONOMOUS_COST_THRESHOLD, GOVERNANCE_COST_THRESHOLD};
use crate::registry::{PatternKind, ValidatorKind};
use crate::{
    ProtocolError, Result, OBI_CANONICAL_BUFFER_SIZE, OBI_MAX_PATTERN_LENGTH, OBI_MAX_STATES,
    OBI_MAX_TRANSITIONS,
};

/// Protocol family version recognized by the standard header pattern
const PROTOCOL_VERSION: &str = "1.0";
/// Version of the serialized specification layout
const SCHEMA_VERSION: &str = "1.0.0";

/// Requested serialization format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// YAML interchange document
    Yaml,
    /// JSON interchange document
    Json,
    /// C header with the binding constants and state table
    CHeader,
}

impl std::str::FromStr for ExportFormat {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "yaml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            "c-header" => Ok(Self::CHeader),
            other => Err(ProtocolError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Governance thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceSpec {
    /// Autonomous-zone ceiling
    pub cost_threshold: f64,
    /// Warning-zone ceiling; admission is refused beyond it
    pub warning_threshold: f64,
}

/// One encoding-map entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UscnMappingSpec {
    /// Encoded spelling
    pub encoded: String,
    /// Canonical replacement
    pub canonical: String,
    /// Exploit class
    pub security_risk: String,
}

/// One recognizer state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSpec {
    /// State id
    pub id: u32,
    /// State name
    pub name: String,
    /// Associated pattern kind
    pub pattern_type: PatternKind,
    /// Pattern expression over canonical bytes
    pub regex: String,
    /// True for the entry state
    pub is_initial: bool,
    /// True for accepting states
    pub is_accepting: bool,
    /// Target state ids of outgoing transitions, in priority order
    pub transitions: Vec<u32>,
}

/// One transition-matrix row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionSpec {
    /// Source state id
    pub from: u32,
    /// Target state id
    pub to: u32,
    /// Pattern kind driving the edge
    pub input_class: PatternKind,
    /// Guard predicate
    pub validator: ValidatorKind,
    /// Weight component of the governance charge
    pub cost_weight: f64,
}

/// Serializable recognizer specification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DfaSpec {
    /// Protocol family version
    pub protocol_version: String,
    /// Serialized-layout version
    pub schema_version: String,
    /// Zero-trust enforcement flag
    pub zero_trust_enforced: bool,
    /// Whether inputs pass through USCN before recognition
    pub uscn_normalization_enabled: bool,
    /// Governance thresholds
    pub governance: GovernanceSpec,
    /// Encoding map, in application order
    pub uscn_mappings: Vec<UscnMappingSpec>,
    /// State table
    pub states: Vec<StateSpec>,
    /// Flat transition matrix
    pub transition_matrix: Vec<TransitionSpec>,
}

impl DfaSpec {
    /// Snapshot an engine's compiled tables
    pub fn from_engine(engine: &Engine) -> Self {
        let registry = engine.registry();

        let uscn_mappings = obi_uscn::ENCODING_MAP
            .iter()
            .map(|rule| UscnMappingSpec {
                encoded: rule.encoded.to_string(),
                canonical: rule.canonical.to_string(),
                security_risk: rule.risk.to_string(),
            })
            .collect();

        let states = registry
            .states()
            .iter()
            .map(|state| {
                let pattern = registry.pattern(state.pattern);
                StateSpec {
                    id: state.id,
                    name: state.name.clone(),
                    pattern_type: pattern.kind,
                    regex: pattern.source.clone(),
                    is_initial: state.is_initial,
                    is_accepting: pattern.is_accepting,
                    transitions: registry
                        .outgoing(state.id)
                        .iter()
                        .map(|&ti| registry.transitions()[ti].to)
                        .collect(),
                }
            })
            .collect();

        let transition_matrix = registry
            .transitions()
            .iter()
            .map(|t| TransitionSpec {
                from: t.from,
                to: t.to,
                input_class: registry.pattern(t.pattern).kind,
                validator: t.validator,
                cost_weight: t.cost_weight,
            })
            .collect();

        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            zero_trust_enforced: registry.zero_trust(),
            uscn_normalization_enabled: engine.config().uscn.encoding_normalize,
            governance: GovernanceSpec {
                cost_threshold: AUTONOMOUS_COST_THRESHOLD,
                warning_threshold: GOVERNANCE_COST_THRESHOLD,
            },
            uscn_mappings,
            states,
            transition_matrix,
        }
    }

    /// Render in the requested format
    pub fn render(&self, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Yaml => serde_yaml::to_string(self)
                .map_err(|e| ProtocolError::UnsupportedFormat(format!("yaml: {e}"))),
            ExportFormat::Json => serde_json::to_string_pretty(self)
                .map_err(|e| ProtocolError::UnsupportedFormat(format!("json: {e}"))),
            ExportFormat::CHeader => Ok(self.render_c_header()),
        }
    }

    fn render_c_header(&self) -> String {
        let mut out = String::new();
        out.push_str("/* Generated OBIBuf DFA specification. Do not edit. */\n");
        out.push_str("#ifndef OBIBUF_DFA_SPEC_H\n#define OBIBUF_DFA_SPEC_H\n\n");
        out.push_str(&format!("#define OBI_PROTOCOL_VERSION \"{}\"\n", self.protocol_version));
        out.push_str(&format!("#define OBI_SCHEMA_VERSION \"{}\"\n", self.schema_version));
        out.push_str(&format!("#define OBI_MAX_STATES {OBI_MAX_STATES}\n"));
        out.push_str(&format!("#define OBI_MAX_TRANSITIONS {OBI_MAX_TRANSITIONS}\n"));
        out.push_str(&format!("#define OBI_MAX_PATTERN_LENGTH {OBI_MAX_PATTERN_LENGTH}\n"));
        out.push_str(&format!("#define OBI_CANONICAL_BUFFER_SIZE {OBI_CANONICAL_BUFFER_SIZE}\n"));
        out.push_str(&format!(
            "#define OBI_ZERO_TRUST_ENFORCED {}\n",
            u8::from(self.zero_trust_enforced)
        ));
        out.push_str(&format!("#define OBI_COST_THRESHOLD {}\n", self.governance.cost_threshold));
        out.push_str(&format!(
            "#define OBI_WARNING_THRESHOLD {}\n\n",
            self.governance.warning_threshold
        ));

        for state in &self.states {
            out.push_str(&format!("#define OBI_STATE_{} {}\n", state.name, state.id));
        }

        out.push_str("\n/* transition matrix: from -> to (validator) */\n");
        for t in &self.transition_matrix {
            out.push_str(&format!(
                "/* S{} -> S{} on {} ({:?}), weight {} */\n",
                t.from,
                t.to,
                t.input_class.name(),
                t.validator,
                t.cost_weight
            ));
        }

        out.push_str("\n#endif /* OBIBUF_DFA_SPEC_H */\n");
        out
    }
}

impl Engine {
    /// Serialize this engine's recognizer specification
    pub fn export_spec(&self, format: ExportFormat) -> Result<String> {
        DfaSpec::from_engine(self).render(format)
    }
}
