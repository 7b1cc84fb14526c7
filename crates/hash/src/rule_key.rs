//! Structural rule keys

use crate::Hash;
use blake3::Hasher;

/// Accumulates named fields into a single hash.
///
/// Each field is written as a length-prefixed name, a type tag and a
/// length-prefixed value, so two different field sequences never produce
/// the same byte stream.
#[derive(Debug, Clone)]
pub struct RuleKeyBuilder {
    hasher: Hasher,
}

impl RuleKeyBuilder {
    #[must_use]
    pub fn new(rule_type: &str) -> Self {
        let mut builder = Self {
            hasher: Hasher::new(),
        };
        builder.field("type", b's', rule_type.as_bytes());
        builder
    }

    fn field(&mut self, name: &str, tag: u8, value: &[u8]) {
        self.hasher.update(&(name.len() as u64).to_le_bytes());
        self.hasher.update(name.as_bytes());
        self.hasher.update(&[tag]);
        self.hasher.update(&(value.len() as u64).to_le_bytes());
        self.hasher.update(value);
    }

    #[must_use]
    pub fn set_str(mut self, name: &str, value: &str) -> Self {
        self.field(name, b's', value.as_bytes());
        self
    }

    #[must_use]
    pub fn set_bool(mut self, name: &str, value: bool) -> Self {
        self.field(name, b'b', &[u8::from(value)]);
        self
    }

    #[must_use]
    pub fn set_u64(mut self, name: &str, value: u64) -> Self {
        self.field(name, b'n', &value.to_le_bytes());
        self
    }

    /// Record an optional string; absence is distinct from the empty string.
    #[must_use]
    pub fn set_opt_str(mut self, name: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.field(name, b's', v.as_bytes()),
            None => self.field(name, b'0', &[]),
        }
        self
    }

    /// Record a list of strings in the given order.
    #[must_use]
    pub fn set_strings<I, S>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let values: Vec<S> = values.into_iter().collect();
        self.field(name, b'l', &(values.len() as u64).to_le_bytes());
        for value in &values {
            self.field("", b's', value.as_ref().as_bytes());
        }
        self
    }

    #[must_use]
    pub fn set_hash(mut self, name: &str, value: &Hash) -> Self {
        self.field(name, b'h', value.as_bytes());
        self
    }

    #[must_use]
    pub fn build(self) -> Hash {
        Hash::from_bytes(*self.hasher.finalize().as_bytes())
    }
}
