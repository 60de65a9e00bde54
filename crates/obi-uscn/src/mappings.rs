//! Encoding-substitution table
//!
//! Every byte sequence that must not reach a validation decision in its
//! raw form, paired with its canonical rewrite and the exploit class it
//! covers. Order matters: longer rules shadow shorter overlapping ones,
//! and equal-length duplicates resolve to the earlier entry.

use serde::{Deserialize, Serialize};

/// Exploit class covered by an encoding rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SecurityRisk {
    /// `../` spellings that escape a path root
    PathTraversal,
    /// Overlong UTF-8 encodings of ASCII structure characters
    Utf8Overlong,
    /// Partially-encoded traversal sequences
    MixedEncoding,
    /// Plain percent-encoding of a single character
    Basic,
    /// Encoded protocol delimiters
    Delimiter,
    /// Encoded whitespace
    Whitespace,
}

impl std::fmt::Display for SecurityRisk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PathTraversal => write!(f, "path-traversal"),
            Self::Utf8Overlong => write!(f, "utf8-overlong"),
            Self::MixedEncoding => write!(f, "mixed-encoding"),
            Self::Basic => write!(f, "basic"),
            Self::Delimiter => write!(f, "delimiter"),
            Self::Whitespace => write!(f, "whitespace"),
        }
    }
}

/// One rewrite of an exploit-prone byte sequence to its canonical form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingRule {
    /// Encoded spelling, matched ASCII case-insensitively
    pub encoded: &'static str,
    /// Canonical replacement
    pub canonical: &'static str,
    /// Exploit class this rule defuses
    pub risk: SecurityRisk,
}

/// The mandatory rewrite table.
///
/// `%c0%af` appears twice on purpose: the path-traversal reading takes
/// precedence over the bare-delimiter reading, so the second entry is
/// declared but shadowed. Matching over the table is leftmost-longest.
pub const ENCODING_MAP: &[EncodingRule] = &[
    EncodingRule { encoded: "%2e%2e%2f", canonical: "../", risk: SecurityRisk::PathTraversal },
    EncodingRule { encoded: "%c0%af", canonical: "../", risk: SecurityRisk::Utf8Overlong },
    EncodingRule { encoded: ".%2e/", canonical: "../", risk: SecurityRisk::MixedEncoding },
    EncodingRule { encoded: "%2e%2e/", canonical: "../", risk: SecurityRisk::MixedEncoding },
    EncodingRule { encoded: "%c0%ae", canonical: ".", risk: SecurityRisk::Utf8Overlong },
    EncodingRule { encoded: "%c0%af", canonical: "/", risk: SecurityRisk::Utf8Overlong },
    EncodingRule { encoded: "%2f", canonical: "/", risk: SecurityRisk::Basic },
    EncodingRule { encoded: "%2e", canonical: ".", risk: SecurityRisk::Basic },
    EncodingRule { encoded: "%20", canonical: " ", risk: SecurityRisk::Whitespace },
    EncodingRule { encoded: "%3A", canonical: ":", risk: SecurityRisk::Delimiter },
    EncodingRule { encoded: "%7C", canonical: "|", risk: SecurityRisk::Delimiter },
];
