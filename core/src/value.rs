//! Scalar values, records and JSON payloads.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::Value as Json;

/// Column name to value map for one row.
pub type Attributes = BTreeMap<String, Value>;

/// A JSON object supplied as input for fill and nested relation data.
pub type Payload = serde_json::Map<String, Json>;

/// A scalar column value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    #[inline]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Real(f) if f.fract() == 0.0 => Some(*f as i64),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Real(f) => Some(*f),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Null => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Converts a JSON scalar. Arrays and objects have no scalar form.
    pub fn from_json(json: &Json) -> Option<Self> {
        match json {
            Json::Null => Some(Self::Null),
            Json::Bool(b) => Some(Self::Integer(i64::from(*b))),
            Json::Number(n) => n
                .as_i64()
                .map(Self::Integer)
                .or_else(|| n.as_f64().map(Self::Real)),
            Json::String(s) => Some(Self::Text(s.clone())),
            Json::Array(_) | Json::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> Json {
        match self {
            Self::Null => Json::Null,
            Self::Integer(i) => Json::from(*i),
            Self::Real(f) => serde_json::Number::from_f64(*f).map_or(Json::Null, Json::Number),
            Self::Text(s) => Json::String(s.clone()),
        }
    }

    /// SQL-style comparison: NULL compares to nothing, numbers compare
    /// numerically (numeric text is coerced), text compares bytewise.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Null, _) | (_, Self::Null) => None,
            (Self::Text(a), Self::Text(b)) => Some(a.as_str().cmp(b.as_str())),
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (a, b) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        }
    }

    /// Total order used for sorting: NULL < numbers < text.
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        fn rank(v: &Value) -> u8 {
            match v {
                Value::Null => 0,
                Value::Integer(_) | Value::Real(_) => 1,
                Value::Text(_) => 2,
            }
        }
        match rank(self).cmp(&rank(other)) {
            Ordering::Equal => self.compare(other).unwrap_or(Ordering::Equal),
            unequal => unequal,
        }
    }

    /// SQL `LIKE` with `%` and `_` wildcards. Case folding covers ASCII
    /// letters only, as SQLite's built-in `LIKE` does.
    pub fn like(&self, pattern: &str) -> bool {
        let subject = match self {
            Self::Null => return false,
            Self::Text(s) => s.clone(),
            other => other.to_string(),
        };
        like_match(
            &subject.to_ascii_lowercase().chars().collect::<Vec<_>>(),
            &pattern.to_ascii_lowercase().chars().collect::<Vec<_>>(),
        )
    }
}

fn like_match(subject: &[char], pattern: &[char]) -> bool {
    // Classic two-pointer wildcard match with backtracking on the last `%`.
    let (mut s, mut p) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while s < subject.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == subject[s]) {
            s += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            star = Some((p, s));
            p += 1;
        } else if let Some((star_p, star_s)) = star {
            p = star_p + 1;
            s = star_s + 1;
            star = Some((star_p, star_s + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| *c == '%')
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Real(r) => write!(f, "{r}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

macro_rules! value_from_int {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Self::Integer(i64::from(value))
            }
        })*
    };
}

value_from_int!(i8, i16, i32, i64, u8, u16, u32, bool);

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::Real(f64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// One row of an entity, plus whatever was eager loaded onto it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub attributes: Attributes,
    pub relations: BTreeMap<String, Vec<Record>>,
    pub pivot: Option<Attributes>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_attributes(attributes: Attributes) -> Self {
        Self {
            attributes,
            ..Self::default()
        }
    }

    /// Primary key, assuming the conventional `id` column.
    pub fn id(&self) -> Option<i64> {
        self.key("id")
    }

    pub fn key(&self, column: &str) -> Option<i64> {
        self.attributes.get(column).and_then(Value::as_i64)
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.attributes.get(column)
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(column.into(), value.into());
    }

    pub fn relation(&self, name: &str) -> &[Record] {
        self.relations.get(name).map_or(&[], Vec::as_slice)
    }

    /// JSON object view: attributes, then relations nested by name, then the
    /// pivot under `"pivot"`.
    pub fn to_json(&self) -> Json {
        let mut object: serde_json::Map<String, Json> = self
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        for (name, related) in &self.relations {
            object.insert(
                name.clone(),
                Json::Array(related.iter().map(Record::to_json).collect()),
            );
        }
        if let Some(pivot) = &self.pivot {
            object.insert(
                "pivot".to_string(),
                Json::Object(pivot.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()),
            );
        }
        Json::Object(object)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Reads a payload's `id`, treating absent, null, zero and blank as "no id".
pub fn payload_id(payload: &Payload) -> Option<i64> {
    payload
        .get("id")
        .and_then(Value::from_json)
        .and_then(|v| v.as_i64())
        .filter(|id| *id != 0)
}
