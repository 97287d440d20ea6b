//! Generic tagged value for records flowing through the field engine.
//!
//! Mirrors `serde_json::Value` with one extra variant, [`Record::Date`], so
//! date properties survive a decrypt as typed instants instead of strings.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// A JSON-like tree with a first-class date variant.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Record {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Date(DateTime<Utc>),
    Array(Vec<Record>),
    Object(BTreeMap<String, Record>),
}

impl Record {
    /// Empty object.
    pub fn object() -> Self {
        Record::Object(BTreeMap::new())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Record::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Record::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Record::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Record::Number(n) => n.as_u64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Record::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            Record::Date(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Record>> {
        match self {
            Record::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Record>> {
        match self {
            Record::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut BTreeMap<String, Record>> {
        match self {
            Record::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Field lookup on objects; `None` for every other variant.
    pub fn get(&self, key: &str) -> Option<&Record> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Sets a field, turning `self` into an object first if it is not one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Record>) -> Option<Record> {
        if !matches!(self, Record::Object(_)) {
            *self = Record::object();
        }
        match self {
            Record::Object(map) => map.insert(key.into(), value.into()),
            _ => None,
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Record> {
        self.as_object_mut().and_then(|map| map.remove(key))
    }

    /// Parses an RFC 3339 timestamp into a [`Record::Date`].
    pub fn parse_date(text: &str) -> Option<Record> {
        DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|d| Record::Date(d.with_timezone(&Utc)))
    }

    /// Converts to plain JSON. Dates become RFC 3339 strings with
    /// millisecond precision.
    pub fn to_value(&self) -> Value {
        match self {
            Record::Null => Value::Null,
            Record::Bool(b) => Value::Bool(*b),
            Record::Number(n) => Value::Number(n.clone()),
            Record::String(s) => Value::String(s.clone()),
            Record::Date(d) => Value::String(format_date(d)),
            Record::Array(items) => Value::Array(items.iter().map(Record::to_value).collect()),
            Record::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }
}

/// `2024-01-02T03:04:05.678Z`
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl From<Value> for Record {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Record::Null,
            Value::Bool(b) => Record::Bool(b),
            Value::Number(n) => Record::Number(n),
            Value::String(s) => Record::String(s),
            Value::Array(items) => Record::Array(items.into_iter().map(Record::from).collect()),
            Value::Object(map) => {
                Record::Object(map.into_iter().map(|(k, v)| (k, Record::from(v))).collect())
            }
        }
    }
}

impl From<&Record> for Value {
    fn from(record: &Record) -> Self {
        record.to_value()
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        record.to_value()
    }
}

impl From<&str> for Record {
    fn from(s: &str) -> Self {
        Record::String(s.to_string())
    }
}

impl From<String> for Record {
    fn from(s: String) -> Self {
        Record::String(s)
    }
}

impl From<bool> for Record {
    fn from(b: bool) -> Self {
        Record::Bool(b)
    }
}

impl From<i64> for Record {
    fn from(n: i64) -> Self {
        Record::Number(n.into())
    }
}

impl From<u64> for Record {
    fn from(n: u64) -> Self {
        Record::Number(n.into())
    }
}

impl From<usize> for Record {
    fn from(n: usize) -> Self {
        Record::Number((n as u64).into())
    }
}

impl From<DateTime<Utc>> for Record {
    fn from(d: DateTime<Utc>) -> Self {
        Record::Date(d)
    }
}

impl<T: Into<Record>> From<Vec<T>> for Record {
    fn from(items: Vec<T>) -> Self {
        Record::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Record>> From<Option<T>> for Record {
    fn from(value: Option<T>) -> Self {
        value.map_or(Record::Null, Into::into)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Record::Null => serializer.serialize_unit(),
            Record::Bool(b) => serializer.serialize_bool(*b),
            Record::Number(n) => n.serialize(serializer),
            Record::String(s) => serializer.serialize_str(s),
            Record::Date(d) => serializer.serialize_str(&format_date(d)),
            Record::Array(items) => items.serialize(serializer),
            Record::Object(map) => map.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Record::from)
    }
}
