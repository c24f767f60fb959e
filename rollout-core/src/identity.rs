//! Content-derived identity.
//!
//! Every ID in a [`Context`](crate::Context) is a lowercase hex SHA-256 digest
//! over a length-prefixed field sequence, so `("ab", "c")` and `("a", "bc")`
//! never collide. Hashes depend only on declared content, never on wall-clock
//! time or upload order.

use sha2::{Digest, Sha256};

/// Incremental, field-oriented SHA-256 hasher.
pub struct ContentHasher {
    inner: Sha256,
}

impl ContentHasher {
    /// Start a hasher scoped to `domain` (e.g. `"compute"`), so equal field
    /// sequences in different roles hash differently.
    pub fn new(domain: &str) -> Self {
        let mut hasher = Self {
            inner: Sha256::new(),
        };
        hasher.field(domain);
        hasher
    }

    /// Append one length-prefixed field.
    pub fn field(&mut self, value: impl AsRef<[u8]>) -> &mut Self {
        let bytes = value.as_ref();
        self.inner.update((bytes.len() as u64).to_le_bytes());
        self.inner.update(bytes);
        self
    }

    /// Append an optional field; `None` and `Some("")` hash differently.
    pub fn optional<T: AsRef<[u8]>>(&mut self, value: Option<T>) -> &mut Self {
        match value {
            Some(value) => {
                self.inner.update([1u8]);
                self.field(value)
            }
            None => {
                self.inner.update([0u8]);
                self
            }
        }
    }

    /// Append a numeric field in little-endian form.
    pub fn number(&mut self, value: u32) -> &mut Self {
        self.field(value.to_le_bytes())
    }

    /// Consume the hasher and return the hex digest.
    pub fn finish(self) -> String {
        hex::encode(self.inner.finalize())
    }
}

/// SHA-256 hex digest of raw bytes (used for project archives).
pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(fields: &[&str]) -> String {
        let mut h = ContentHasher::new("test");
        for f in fields {
            h.field(f);
        }
        h.finish()
    }

    #[test]
    fn same_fields_same_digest() {
        assert_eq!(hash(&["a", "b"]), hash(&["a", "b"]));
    }

    #[test]
    fn field_boundaries_are_significant() {
        assert_ne!(hash(&["ab", "c"]), hash(&["a", "bc"]));
    }

    #[test]
    fn domain_separates_digests() {
        let mut a = ContentHasher::new("api");
        a.field("x");
        let mut b = ContentHasher::new("compute");
        b.field("x");
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn none_differs_from_empty() {
        let mut a = ContentHasher::new("t");
        a.optional(None::<&str>);
        let mut b = ContentHasher::new("t");
        b.optional(Some(""));
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn digest_bytes_is_hex_sha256() {
        assert_eq!(
            digest_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
