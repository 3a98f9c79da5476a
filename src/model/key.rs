//! The key entity: one decoded value from the snapshot or the live stream.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use regex::bytes::Regex;

/// A single decoded key.
///
/// Every value read from the snapshot (and every key synthesized from a live
/// command) carries the database index it belongs to, its name, an optional
/// expiry, and one of the six value variants.
#[derive(Debug, Clone, PartialEq)]
pub struct Key {
    /// Database index the key lives in (zero by default).
    pub db: u32,
    /// Key name. Binary-safe.
    pub name: Bytes,
    /// Expiry in milliseconds since the Unix epoch, `None` when persistent.
    /// The 4-byte seconds on-wire encoding is normalized to milliseconds.
    pub expire_ms: Option<u64>,
    /// The decoded value.
    pub value: Value,
}

/// The value variants a key can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A single byte string.
    String(Bytes),
    /// A sequence of byte strings in insertion order.
    List(Vec<Bytes>),
    /// An unordered set of unique byte strings.
    Set(HashSet<Bytes>),
    /// An unordered set of 64-bit integers. Narrow on-wire elements are
    /// sign-extended into the uniform 64-bit representation.
    IntegerSet(HashSet<u64>),
    /// A field → value mapping.
    Hash(HashMap<Bytes, Bytes>),
    /// A member → score mapping; members are unique, scores are IEEE-754
    /// doubles.
    SortedSet(HashMap<Bytes, f64>),
}

impl Key {
    /// Create a key in database zero with no expiry.
    pub fn new(name: impl Into<Bytes>, value: Value) -> Self {
        Self {
            db: 0,
            name: name.into(),
            expire_ms: None,
            value,
        }
    }

    /// Builder-style database index.
    pub fn with_db(mut self, db: u32) -> Self {
        self.db = db;
        self
    }

    /// Builder-style expiry; zero means absent.
    pub fn with_expire_ms(mut self, expire_ms: u64) -> Self {
        self.expire_ms = if expire_ms == 0 { None } else { Some(expire_ms) };
        self
    }

    /// Rewrite the key name with a regex substitution. Consumers use this to
    /// strip or rewrite namespace prefixes; it has no effect on decoding.
    pub fn replace_name(&mut self, pattern: &Regex, replacement: &[u8]) {
        let rewritten = pattern.replace_all(&self.name, replacement);
        self.name = Bytes::copy_from_slice(&rewritten);
    }

    /// Short name of the value variant, for logs.
    pub fn type_name(&self) -> &'static str {
        match self.value {
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::IntegerSet(_) => "intset",
            Value::Hash(_) => "hash",
            Value::SortedSet(_) => "zset",
        }
    }
}

impl Value {
    pub fn as_string(&self) -> Option<&Bytes> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Bytes]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&HashSet<Bytes>> {
        match self {
            Value::Set(members) => Some(members),
            _ => None,
        }
    }

    pub fn as_integer_set(&self) -> Option<&HashSet<u64>> {
        match self {
            Value::IntegerSet(members) => Some(members),
            _ => None,
        }
    }

    pub fn as_hash(&self) -> Option<&HashMap<Bytes, Bytes>> {
        match self {
            Value::Hash(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_sorted_set(&self) -> Option<&HashMap<Bytes, f64>> {
        match self {
            Value::SortedSet(members) => Some(members),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_defaults() {
        let key = Key::new("plain", Value::String(Bytes::from("v")));
        assert_eq!(key.db, 0);
        assert!(key.expire_ms.is_none());
        assert_eq!(key.type_name(), "string");
    }

    #[test]
    fn test_zero_expiry_is_absent() {
        let key = Key::new("k", Value::String(Bytes::new())).with_expire_ms(0);
        assert!(key.expire_ms.is_none());

        let key = key.with_expire_ms(1_700_000_000_000);
        assert_eq!(key.expire_ms, Some(1_700_000_000_000));
    }

    #[test]
    fn test_replace_name() {
        let mut key = Key::new("cache:user:42", Value::String(Bytes::new()));
        let pattern = Regex::new(r"^cache:").unwrap();
        key.replace_name(&pattern, b"");
        assert_eq!(key.name, Bytes::from("user:42"));
    }

    #[test]
    fn test_replace_name_no_match_keeps_name() {
        let mut key = Key::new("user:42", Value::String(Bytes::new()));
        let pattern = Regex::new(r"^cache:").unwrap();
        key.replace_name(&pattern, b"x:");
        assert_eq!(key.name, Bytes::from("user:42"));
    }

    #[test]
    fn test_value_accessors() {
        let value = Value::List(vec![Bytes::from("a"), Bytes::from("b")]);
        assert_eq!(value.as_list().unwrap().len(), 2);
        assert!(value.as_hash().is_none());

        let mut scored = HashMap::new();
        scored.insert(Bytes::from("m"), 1.5);
        let value = Value::SortedSet(scored);
        assert_eq!(*value.as_sorted_set().unwrap().get(&Bytes::from("m")).unwrap(), 1.5);
    }
}
