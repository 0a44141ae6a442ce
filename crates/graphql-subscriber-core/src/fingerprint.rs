//! Subscription fingerprints.
//!
//! A fingerprint identifies a subscription by its operation name and query
//! text, ignoring whitespace. Requests with the same fingerprint share one
//! server-side subscription, and the fingerprint doubles as the wire `id`.

use std::borrow::Borrow;
use std::fmt;

use sha2::{Digest, Sha256};

/// Stable identifier of a logical subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap an already computed identifier, e.g. an `id` received from the server.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the fingerprint, returning the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Fingerprint {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Fingerprint {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Derives a [`Fingerprint`] from an operation name and query.
///
/// Implementations must be pure: the same inputs always give the same
/// fingerprint, across calls and processes.
pub trait FingerprintStrategy: Send + Sync {
    /// Compute the fingerprint of `(operation_name, query)`.
    fn fingerprint(&self, operation_name: &str, query: &str) -> Fingerprint;
}

/// Concatenate the operation name with the query stripped of all whitespace.
///
/// Whitespace is the ECMAScript `\s` class: Unicode `White_Space` without
/// U+0085 (NEXT LINE), plus U+FEFF (BYTE ORDER MARK), so the key equals the
/// one JavaScript produces with `query.replace(/\s/g, "")`.
pub fn normalized_key(operation_name: &str, query: &str) -> String {
    let mut key = String::with_capacity(operation_name.len() + query.len());
    key.push_str(operation_name);
    key.extend(query.chars().filter(|&c| !is_query_whitespace(c)));
    key
}

fn is_query_whitespace(c: char) -> bool {
    match c {
        '\u{85}' => false,
        '\u{feff}' => true,
        c => c.is_whitespace(),
    }
}

/// SHA-256 over the normalized key, hex encoded. The default strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashedFingerprint;

impl FingerprintStrategy for HashedFingerprint {
    fn fingerprint(&self, operation_name: &str, query: &str) -> Fingerprint {
        let digest = Sha256::digest(normalized_key(operation_name, query).as_bytes());
        Fingerprint(hex::encode(digest))
    }
}

/// The normalized key itself, unhashed.
///
/// Readable on the wire and in logs, at the cost of long ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawFingerprint;

impl FingerprintStrategy for RawFingerprint {
    fn fingerprint(&self, operation_name: &str, query: &str) -> Fingerprint {
        Fingerprint(normalized_key(operation_name, query))
    }
}
