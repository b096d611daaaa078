//! Data model shared by every layer
//!
//! - [`Record`]: one domain → answer rewrite
//! - [`RecordSet`]: a mapping holding at most one answer per domain
//! - [`Node`]: one remote control endpoint plus its credential
//! - [`Credential`]: precomputed `Basic` credential, opaque to the engine

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Domain → answer mapping.
///
/// Ordered so that add calls are issued in a stable order across runs.
pub type RecordSet = BTreeMap<String, String>;

/// A single DNS rewrite as it appears on the wire
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    /// Domain being rewritten (natural key within a mapping)
    pub domain: String,
    /// Rewrite target; never validated
    pub answer: String,
}

impl Record {
    /// Create a new record
    pub fn new(domain: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            answer: answer.into(),
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.domain, self.answer)
    }
}

/// Collect records into a [`RecordSet`]; later duplicates win.
pub fn to_record_set<'a>(records: impl IntoIterator<Item = &'a Record>) -> RecordSet {
    records
        .into_iter()
        .map(|r| (r.domain.clone(), r.answer.clone()))
        .collect()
}

/// Merge two record sets.
///
/// The result contains every domain of both inputs. When a domain appears in
/// both, the answer from `incoming` wins (last writer wins), so folding a
/// sequence of sets left to right gives precedence to the later ones.
pub fn merge(base: &RecordSet, incoming: &RecordSet) -> RecordSet {
    let mut merged = base.clone();
    for (domain, answer) in incoming {
        merged.insert(domain.clone(), answer.clone());
    }
    merged
}

/// Opaque `Basic` credential: base64 of `username:password`.
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    /// Wrap an already-encoded credential
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Encode a username/password pair
    pub fn from_login(username: &str, password: &str) -> Self {
        Self(STANDARD.encode(format!("{}:{}", username, password)))
    }

    /// The encoded value, ready to follow `Basic `
    ///
    /// ⚠️ NEVER log this value
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the credential is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<REDACTED>)")
    }
}

/// A managed DNS-control node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Unique name within the registry
    pub name: String,
    /// Management base URL, e.g. `https://ns.example.org`
    pub base_url: String,
    /// Credential sent with every request
    pub credential: Credential,
}

impl Node {
    /// Create a new node
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        credential: Credential,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            credential,
        }
    }
}
