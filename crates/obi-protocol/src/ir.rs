//! Intermediate representation
//!
//! Recognition emits one node per matched lexeme, in byte-position order.
//! Every node owns a copy of its canonical content, so the stream stays
//! valid after the admission's canonical buffer is released.

use serde::{Deserialize, Serialize};

use crate::registry::PatternKind;

/// Kind of a recognized lexeme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IrKind {
    /// Protocol identification header
    ProtocolMessage,
    /// Cryptographic authentication token
    SecurityContext,
    /// Payload data block
    PayloadBlock,
    /// Schema validation identifier
    SchemaValidation,
    /// Audit trail marker
    AuditRecord,
    /// Rejection marker or unclassified match
    ErrorCondition,
}

impl IrKind {
    /// Map a pattern kind to the IR kind its matches produce
    pub fn from_pattern(kind: PatternKind) -> Self {
        match kind {
            PatternKind::ProtocolHeader => Self::ProtocolMessage,
            PatternKind::SecurityToken => Self::SecurityContext,
            PatternKind::DataPayload => Self::PayloadBlock,
            PatternKind::SchemaReference => Self::SchemaValidation,
            PatternKind::AuditMarker => Self::AuditRecord,
            _ => Self::ErrorCondition,
        }
    }
}

impl std::fmt::Display for IrKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProtocolMessage => write!(f, "protocol_message"),
            Self::SecurityContext => write!(f, "security_context"),
            Self::PayloadBlock => write!(f, "payload_block"),
            Self::SchemaValidation => write!(f, "schema_validation"),
            Self::AuditRecord => write!(f, "audit_record"),
            Self::ErrorCondition => write!(f, "error_condition"),
        }
    }
}

/// One recognized lexeme
#[derive(Debug, Clone, PartialEq)]
pub struct IrNode {
    /// What was recognized
    pub kind: IrKind,
    /// Owned copy of the exact canonical bytes of the match
    pub content: Vec<u8>,
    /// State the recognizer was in when the match began
    pub source_state: u32,
    /// Governance cost charged for this transition
    pub cost: f64,
}

impl IrNode {
    /// Content as text, lossy for non-UTF-8 payload bytes
    pub fn content_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }
}

/// Ordered, owning sequence of IR nodes
///
/// Emission order equals byte-position order of the matches; that ordering
/// is part of the admission contract.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IrStream {
    nodes: Vec<IrNode>,
}

impl IrStream {
    /// Empty stream
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, node: IrNode) {
        self.nodes.push(node);
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when nothing was recognized
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate nodes in emission order
    pub fn iter(&self) -> std::slice::Iter<'_, IrNode> {
        self.nodes.iter()
    }

    /// Node kinds in emission order
    pub fn kinds(&self) -> Vec<IrKind> {
        self.nodes.iter().map(|n| n.kind).collect()
    }

    /// Nodes as a slice
    pub fn as_slice(&self) -> &[IrNode] {
        &self.nodes
    }
}

impl IntoIterator for IrStream {
    type Item = IrNode;
    type IntoIter = std::vec::IntoIter<IrNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.into_iter()
    }
}

impl<'a> IntoIterator for &'a IrStream {
    type Item = &'a IrNode;
    type IntoIter = std::slice::Iter<'a, IrNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_to_ir_mapping() {
        assert_eq!(IrKind::from_pattern(PatternKind::ProtocolHeader), IrKind::ProtocolMessage);
        assert_eq!(IrKind::from_pattern(PatternKind::SecurityToken), IrKind::SecurityContext);
        assert_eq!(IrKind::from_pattern(PatternKind::DataPayload), IrKind::PayloadBlock);
        assert_eq!(IrKind::from_pattern(PatternKind::SchemaReference), IrKind::SchemaValidation);
        assert_eq!(IrKind::from_pattern(PatternKind::AuditMarker), IrKind::AuditRecord);
        // Everything without a dedicated IR kind marks an error condition.
        assert_eq!(IrKind::from_pattern(PatternKind::VersionParse), IrKind::ErrorCondition);
        assert_eq!(IrKind::from_pattern(PatternKind::TransitionBoundary), IrKind::ErrorCondition);
        assert_eq!(IrKind::from_pattern(PatternKind::ErrorRecovery), IrKind::ErrorCondition);
    }

    #[test]
    fn test_stream_preserves_emission_order() {
        let mut stream = IrStream::new();
        for (i, kind) in [IrKind::ProtocolMessage, IrKind::SecurityContext, IrKind::PayloadBlock]
            .into_iter()
            .enumerate()
        {
            stream.push(IrNode {
                kind,
                content: vec![i as u8],
                source_state: i as u32,
                cost: 0.01,
            });
        }
        assert_eq!(
            stream.kinds(),
            vec![IrKind::ProtocolMessage, IrKind::SecurityContext, IrKind::PayloadBlock]
        );
        assert_eq!(stream.len(), 3);
    }

    #[test]
    fn test_node_owns_its_content() {
        let source = vec![b'h', b'i'];
        let node = IrNode {
            kind: IrKind::PayloadBlock,
            content: source.clone(),
            source_state: 5,
            cost: 0.0,
        };
        drop(source);
        assert_eq!(node.content_lossy(), "hi");
    }
}
