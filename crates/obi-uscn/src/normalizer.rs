//! Canonicalization pipeline
//!
//! Substitution runs over a pre-built Aho-Corasick automaton so the scan
//! is O(n) regardless of table size; the automaton is built once per
//! normalizer and shared for the life of the engine that owns it.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};

use crate::mappings::{EncodingRule, ENCODING_MAP};
use crate::{Result, UscnConfig, UscnError, OBI_CANONICAL_BUFFER_SIZE};

/// Bounded canonical byte sequence produced by normalization
#[derive(Debug, Clone)]
pub struct CanonicalBuffer {
    bytes: Vec<u8>,
    origin_hash: [u8; 32],
}

impl CanonicalBuffer {
    /// Canonical bytes
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the buffer, yielding the canonical bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Canonical length in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when the canonical form is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// BLAKE3 hash of the raw input this buffer was derived from
    pub fn origin_hash(&self) -> &[u8; 32] {
        &self.origin_hash
    }
}

/// Stateless canonicalization transformer
///
/// Holds the compiled substitution automaton and the fold configuration.
/// Normalization itself keeps no state between calls; a normalizer may be
/// shared by reference across threads.
pub struct Normalizer {
    automaton: AhoCorasick,
    rules: Vec<&'static EncodingRule>,
    config: UscnConfig,
}

impl Normalizer {
    /// Build a normalizer over the mandatory encoding map
    pub fn new(config: UscnConfig) -> Self {
        // Equal-length duplicates resolve to the earlier table entry, so
        // shadowed encodings never reach the automaton.
        let mut rules: Vec<&'static EncodingRule> = Vec::with_capacity(ENCODING_MAP.len());
        for rule in ENCODING_MAP {
            if !rules.iter().any(|r| r.encoded.eq_ignore_ascii_case(rule.encoded)) {
                rules.push(rule);
            }
        }

        let automaton = AhoCorasickBuilder::new()
            .match_kind(MatchKind::LeftmostLongest)
            .ascii_case_insensitive(true)
            .build(rules.iter().map(|r| r.encoded))
            .expect("encoding map automaton");

        Self { automaton, rules, config }
    }

    /// Active configuration
    pub fn config(&self) -> &UscnConfig {
        &self.config
    }

    /// Reduce `input` to its canonical form.
    ///
    /// Fails with [`UscnError::BufferOverflow`] when the substituted
    /// stream exceeds [`OBI_CANONICAL_BUFFER_SIZE`]; no partial buffer is
    /// produced.
    pub fn normalize(&self, input: &[u8]) -> Result<CanonicalBuffer> {
        let origin_hash = *blake3::hash(input).as_bytes();

        // Phase 1: encoding substitution. The bound applies to the
        // substituted stream; the later folds only shrink it.
        let mut bytes = if self.config.encoding_normalize {
            self.substitute(input)?
        } else {
            if input.len() > OBI_CANONICAL_BUFFER_SIZE {
                return Err(UscnError::BufferOverflow { limit: OBI_CANONICAL_BUFFER_SIZE });
            }
            input.to_vec()
        };

        // Phase 2: ASCII case folding
        if self.config.case_fold {
            bytes.make_ascii_lowercase();
        }

        // Phase 3: whitespace folding. Runs collapse to one space;
        // leading/trailing whitespace stays, collapsed.
        if self.config.whitespace_fold {
            let mut write = 0;
            let mut in_run = false;
            for read in 0..bytes.len() {
                let b = bytes[read];
                if matches!(b, b' ' | b'\t' | b'\r' | b'\n') {
                    if !in_run {
                        bytes[write] = b' ';
                        write += 1;
                        in_run = true;
                    }
                } else {
                    bytes[write] = b;
                    write += 1;
                    in_run = false;
                }
            }
            bytes.truncate(write);
        }

        if self.config.strict_utf8 {
            if let Err(e) = std::str::from_utf8(&bytes) {
                return Err(UscnError::InvalidUtf8 { valid_up_to: e.valid_up_to() });
            }
        }

        Ok(CanonicalBuffer { bytes, origin_hash })
    }

    fn substitute(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(input.len().min(OBI_CANONICAL_BUFFER_SIZE));
        let mut last = 0;
        let mut substitutions = 0usize;

        for m in self.automaton.find_iter(input) {
            let rule = self.rules[m.pattern().as_usize()];
            Self::append(&mut out, &input[last..m.start()])?;
            Self::append(&mut out, rule.canonical.as_bytes())?;
            last = m.end();
            substitutions += 1;
        }
        Self::append(&mut out, &input[last..])?;

        if substitutions > 0 {
            tracing::debug!(substitutions, input_len = input.len(), "applied encoding rewrites");
        }
        Ok(out)
    }

    fn append(out: &mut Vec<u8>, chunk: &[u8]) -> Result<()> {
        if out.len() + chunk.len() > OBI_CANONICAL_BUFFER_SIZE {
            return Err(UscnError::BufferOverflow { limit: OBI_CANONICAL_BUFFER_SIZE });
        }
        out.extend_from_slice(chunk);
        Ok(())
    }

    /// True when `input` is already a normalization fixed point
    pub fn is_canonical(&self, input: &[u8]) -> bool {
        self.normalize(input).map(|c| c.as_bytes() == input).unwrap_or(false)
    }

    /// Canonical equivalence: both inputs normalize to the same bytes.
    ///
    /// False when either side fails to normalize.
    pub fn equivalent(&self, a: &[u8], b: &[u8]) -> bool {
        match (self.normalize(a), self.normalize(b)) {
            (Ok(ca), Ok(cb)) => ca.as_bytes() == cb.as_bytes(),
            _ => false,
        }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(UscnConfig::default())
    }
}

/// Normalize `input` under `config`
pub fn normalize(input: &[u8], config: &UscnConfig) -> Result<CanonicalBuffer> {
    Normalizer::new(*config).normalize(input)
}

/// Canonical equivalence under the default configuration
pub fn equivalent(a: &[u8], b: &[u8]) -> bool {
    Normalizer::default().equivalent(a, b)
}
