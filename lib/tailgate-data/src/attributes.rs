use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// An attribute value.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// A boolean value.
    Bool(bool),

    /// A signed integer value.
    Int(i64),

    /// A floating-point value.
    Double(f64),

    /// A string value.
    Str(String),
}

impl AttributeValue {
    /// Returns the value as a string slice, if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as a boolean, if it is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as an integer, if it is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as a double, if it is a double.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Double(d) => write!(f, "{}", d),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

/// A set of key/value attributes.
///
/// Keys are unique, and iteration follows insertion order. Inserting an existing key overwrites its value in place.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AttributeMap {
    entries: IndexMap<String, AttributeValue>,
}

impl AttributeMap {
    /// Creates an empty attribute set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value`, returning the previous value if one was present.
    pub fn insert<K, V>(&mut self, key: K, value: V) -> Option<AttributeValue>
    where
        K: Into<String>,
        V: Into<AttributeValue>,
    {
        self.entries.insert(key.into(), value.into())
    }

    /// Sets `key` to the string `value`.
    pub fn insert_str(&mut self, key: &str, value: &str) {
        match self.entries.get_mut(key) {
            Some(existing) => *existing = AttributeValue::from(value),
            None => {
                self.entries.insert(key.to_string(), AttributeValue::from(value));
            }
        }
    }

    /// Sets `key` to `value`.
    ///
    /// This variant is specifically for use in builder-style APIs.
    pub fn with<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<AttributeValue>,
    {
        self.insert(key, value);
        self
    }

    /// Returns the value of `key`, if present.
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.entries.get(key)
    }

    /// Returns the value of `key` if it is present and is a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(AttributeValue::as_str)
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the number of attributes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no attributes.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns an iterator over the attributes, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K, V> FromIterator<(K, V)> for AttributeMap
where
    K: Into<String>,
    V: Into<AttributeValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attributes = Self::new();
        for (k, v) in iter {
            attributes.insert(k, v);
        }
        attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_overwrites_in_place() {
        let mut attributes = AttributeMap::new().with("a", 1i64).with("b", "two");
        attributes.insert_str("a", "one");

        let keys = attributes.iter().map(|(k, _)| k).collect::<Vec<_>>();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(attributes.get_str("a"), Some("one"));
        assert_eq!(attributes.len(), 2);
    }

    #[test]
    fn typed_accessors() {
        let attributes = AttributeMap::new()
            .with("str", "value")
            .with("bool", true)
            .with("int", 7i64)
            .with("double", 0.5);

        assert_eq!(attributes.get_str("str"), Some("value"));
        assert_eq!(attributes.get_str("int"), None);
        assert_eq!(attributes.get("bool").and_then(AttributeValue::as_bool), Some(true));
        assert_eq!(attributes.get("int").and_then(AttributeValue::as_int), Some(7));
        assert_eq!(attributes.get("double").and_then(AttributeValue::as_double), Some(0.5));
        assert!(attributes.get("missing").is_none());
    }

    #[test]
    fn deserializes_untagged_values() {
        let attributes: AttributeMap =
            serde_json::from_str(r#"{"s": "x", "b": false, "i": 3, "d": 1.5}"#).unwrap();

        assert_eq!(attributes.get("s"), Some(&AttributeValue::Str("x".to_string())));
        assert_eq!(attributes.get("b"), Some(&AttributeValue::Bool(false)));
        assert_eq!(attributes.get("i"), Some(&AttributeValue::Int(3)));
        assert_eq!(attributes.get("d"), Some(&AttributeValue::Double(1.5)));
    }
}
