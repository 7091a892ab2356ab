//! Cache Key Module
//!
//! Turns resolver output into a stable, comparable cache key.

use std::fmt;
use std::hash::Hasher;

use rustc_hash::FxHasher;
use serde::Serialize;
use serde_json::{Number, Value};

use crate::error::{Result, ThrottleError};

/// Largest magnitude below which every integral `f64` is exact (2^53).
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

// == Cache Key ==
/// Canonical identity of one invocation.
///
/// Scalars stringify into `Text`, structured key material is reduced to a
/// deterministic structural `Hash`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheKey {
    /// Stringified scalar key material
    Text(String),
    /// Structural hash of an array or object
    Hash(u64),
}

impl CacheKey {
    // == Resolve ==
    /// Builds the cache key for any serializable key material.
    ///
    /// - A single-element sequence collapses to its element's key
    /// - `null`, booleans, numbers and strings stringify; an integral float
    ///   keys like the integer it equals, so `1.0` and `1` share a key
    /// - Any other sequence or map is hashed over its canonical JSON form
    ///   (map keys sorted), so equal structures always share a key
    pub fn resolve<M>(material: &M) -> Result<Self>
    where
        M: Serialize + ?Sized,
    {
        let value =
            serde_json::to_value(material).map_err(|e| ThrottleError::Key(e.to_string()))?;
        Ok(Self::from_value(normalize(value)))
    }

    fn from_value(value: Value) -> Self {
        match value {
            Value::Array(mut items) if items.len() == 1 => {
                Self::from_value(items.pop().unwrap_or(Value::Null))
            }
            Value::String(s) => Self::Text(s),
            Value::Null => Self::Text("null".to_string()),
            Value::Bool(b) => Self::Text(b.to_string()),
            Value::Number(n) => Self::Text(n.to_string()),
            structured @ (Value::Array(_) | Value::Object(_)) => {
                let mut hasher = FxHasher::default();
                hasher.write(structured.to_string().as_bytes());
                Self::Hash(hasher.finish())
            }
        }
    }
}

/// Rewrites integral floats as integers, recursively.
fn normalize(value: Value) -> Value {
    match value {
        Value::Number(n) => Value::Number(integral(&n).unwrap_or(n)),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(field, value)| (field, normalize(value)))
                .collect(),
        ),
        other => other,
    }
}

fn integral(n: &Number) -> Option<Number> {
    let f = n.as_f64().filter(|_| n.is_f64())?;
    (f.fract() == 0.0 && f.abs() < MAX_EXACT_FLOAT).then(|| Number::from(f as i64))
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Hash(h) => write!(f, "#{h:016x}"),
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::{BTreeMap, HashMap};

    #[derive(Serialize)]
    struct Account {
        id: u32,
        region: &'static str,
    }

    #[test]
    fn test_scalars_stringify() {
        assert_eq!(CacheKey::resolve(&1333).unwrap(), CacheKey::from("1333"));
        assert_eq!(CacheKey::resolve("abc").unwrap(), CacheKey::from("abc"));
        assert_eq!(CacheKey::resolve(&true).unwrap(), CacheKey::from("true"));
        assert_eq!(CacheKey::resolve(&()).unwrap(), CacheKey::from("null"));
    }

    #[test]
    fn test_integral_floats_key_like_integers() {
        assert_eq!(CacheKey::resolve(&1.0).unwrap(), CacheKey::from("1"));
        assert_eq!(CacheKey::resolve(&-0.0).unwrap(), CacheKey::from("0"));
        assert_eq!(CacheKey::resolve(&1.5).unwrap(), CacheKey::from("1.5"));
        assert_eq!(
            CacheKey::resolve(&(1.0, 2.0)).unwrap(),
            CacheKey::resolve(&(1, 2)).unwrap()
        );

        let mut fractional = BTreeMap::new();
        fractional.insert("limit", 10.0);
        let mut whole = BTreeMap::new();
        whole.insert("limit", 10);
        assert_eq!(
            CacheKey::resolve(&fractional).unwrap(),
            CacheKey::resolve(&whole).unwrap()
        );
    }

    #[test]
    fn test_single_element_collapses() {
        assert_eq!(CacheKey::resolve(&(1,)).unwrap(), CacheKey::from("1"));
        assert_eq!(CacheKey::resolve(&vec![vec![7]]).unwrap(), CacheKey::from("7"));
    }

    #[test]
    fn test_structures_hash() {
        let a = CacheKey::resolve(&(1, 2)).unwrap();
        let b = CacheKey::resolve(&(1, 2)).unwrap();
        let c = CacheKey::resolve(&(2, 1)).unwrap();

        assert!(matches!(a, CacheKey::Hash(_)));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_objects_hash_independent_of_insertion_order() {
        let mut first = HashMap::new();
        first.insert("b", 2);
        first.insert("a", 1);
        let mut second = BTreeMap::new();
        second.insert("a", 1);
        second.insert("b", 2);

        assert_eq!(
            CacheKey::resolve(&first).unwrap(),
            CacheKey::resolve(&second).unwrap()
        );
    }

    #[test]
    fn test_struct_key_material() {
        let a = CacheKey::resolve(&Account { id: 1, region: "eu" }).unwrap();
        let b = CacheKey::resolve(&Account { id: 1, region: "eu" }).unwrap();
        let c = CacheKey::resolve(&Account { id: 2, region: "eu" }).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_datetime_stringifies() {
        let date = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let key = CacheKey::resolve(&date).unwrap();

        assert!(matches!(key, CacheKey::Text(ref s) if s.starts_with("2024-01-02T03:04:05")));
    }

    #[test]
    fn test_unserializable_material_is_an_error() {
        let mut map = HashMap::new();
        map.insert((1, 2), "tuple keys are not valid JSON object keys");

        assert!(matches!(
            CacheKey::resolve(&map),
            Err(ThrottleError::Key(_))
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(CacheKey::from("abc").to_string(), "abc");
        assert_eq!(CacheKey::Hash(255).to_string(), "#00000000000000ff");
    }
}
