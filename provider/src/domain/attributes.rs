//! Declarative attribute model shared by every object kind.
//!
//! The orchestrator hands each reconciler a [`Record`]: a mapping from
//! attribute name to a dynamically typed [`Value`]. A key that is missing
//! from the record is *absent*; a key mapped to [`Value::Null`] is *null*.
//! [`Field`] keeps those two states apart from a known value so default
//! filling and drift comparison stay unambiguous.
//!
//! Translators read records through [`Decoder`] and build them through
//! [`RecordBuilder`]. Both track an [`AttributePath`] so failures name the
//! offending attribute, e.g. `principals[0].roles[1].id`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Placeholder written in place of sensitive values in diagnostics.
pub const REDACTED: &str = "<redacted>";

/// A dynamically typed declarative value.
///
/// `List` keeps element order and compares element-wise. `Set` compares
/// order-independently; duplicates are counted.
#[derive(Debug, Clone)]
pub enum Value {
    /// Explicit null.
    Null,
    /// Boolean scalar.
    Bool(bool),
    /// Integer scalar.
    Int(i64),
    /// String scalar.
    String(String),
    /// Ordered collection.
    List(Vec<Value>),
    /// Unordered collection.
    Set(Vec<Value>),
    /// Nested record.
    Object(Record),
}

impl Value {
    /// Build a string value.
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Build an ordered list of strings.
    pub fn string_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(|item| Self::String(item.into())).collect())
    }

    /// Build an unordered set of strings.
    pub fn string_set<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Set(items.into_iter().map(|item| Self::String(item.into())).collect())
    }

    /// Return the string payload when this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Return the nested record when this is an object.
    pub fn as_object(&self) -> Option<&Record> {
        match self {
            Self::Object(record) => Some(record),
            _ => None,
        }
    }

    /// Short type label used in decode errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Object(_) => "object",
        }
    }

    /// Convert a JSON document into a declarative value.
    ///
    /// Arrays become ordered lists; translators accept either collection
    /// shape on decode and emit the declared shape on encode.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] when a number is not a 64-bit integer.
    pub fn from_json(json: serde_json::Value) -> Result<Self, DecodeError> {
        from_json_at(json, &AttributePath::root())
    }

    /// Render this value as a JSON document.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(value) => serde_json::Value::Bool(*value),
            Self::Int(value) => serde_json::Value::from(*value),
            Self::String(value) => serde_json::Value::String(value.clone()),
            Self::List(items) | Self::Set(items) => {
                serde_json::Value::Array(items.iter().map(Self::to_json).collect())
            }
            Self::Object(record) => record.to_json(),
        }
    }

    fn redact_leaves(&self, sensitive: &[&str]) -> Self {
        match self {
            Self::List(items) => {
                Self::List(items.iter().map(|v| v.redact_leaves(sensitive)).collect())
            }
            Self::Set(items) => {
                Self::Set(items.iter().map(|v| v.redact_leaves(sensitive)).collect())
            }
            Self::Object(record) => Self::Object(record.redacted(sensitive)),
            other => other.clone(),
        }
    }

    fn collect_sensitive(&self, sensitive: &[&str], out: &mut Vec<String>) {
        match self {
            Self::List(items) | Self::Set(items) => {
                for item in items {
                    item.collect_sensitive(sensitive, out);
                }
            }
            Self::Object(record) => record.collect_sensitive(sensitive, out),
            _ => {}
        }
    }
}

fn from_json_at(json: serde_json::Value, path: &AttributePath) -> Result<Value, DecodeError> {
    Ok(match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(value) => Value::Bool(value),
        serde_json::Value::Number(number) => match number.as_i64() {
            Some(value) => Value::Int(value),
            None => {
                return Err(DecodeError::new(
                    path.clone(),
                    format!("number {number} is not a 64-bit integer"),
                ));
            }
        },
        serde_json::Value::String(value) => Value::String(value),
        serde_json::Value::Array(items) => Value::List(
            items
                .into_iter()
                .enumerate()
                .map(|(index, item)| from_json_at(item, &path.index(index)))
                .collect::<Result<_, _>>()?,
        ),
        serde_json::Value::Object(map) => {
            let mut record = Record::new();
            for (key, item) in map {
                let value = from_json_at(item, &path.attr(&key))?;
                record.insert(key, value);
            }
            Value::Object(record)
        }
    })
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            // Arrays read back from the wire are lists until a schema
            // reshapes them, so a set matches a list with the same members.
            (Self::Set(a), Self::Set(b) | Self::List(b)) | (Self::List(a), Self::Set(b)) => {
                same_members(a, b)
            }
            (Self::Object(a), Self::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

fn same_members(left: &[Value], right: &[Value]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    let mut unmatched: Vec<&Value> = right.iter().collect();
    for item in left {
        match unmatched.iter().position(|candidate| *candidate == item) {
            Some(position) => {
                unmatched.swap_remove(position);
            }
            None => return false,
        }
    }
    true
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Self::from_json(json).map_err(serde::de::Error::custom)
    }
}

/// A named mapping from attribute to value. Missing keys are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an attribute as a three-state field.
    pub fn field(&self, name: &str) -> Field<&Value> {
        match self.0.get(name) {
            None => Field::Absent,
            Some(Value::Null) => Field::Null,
            Some(value) => Field::Known(value),
        }
    }

    /// Raw lookup; `None` means absent.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Set an attribute, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(name.into(), value)
    }

    /// Remove an attribute, making it absent.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    /// Iterate attributes in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of attributes present.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no attribute is present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Return a copy with every attribute named in `sensitive` replaced by
    /// [`REDACTED`], at any nesting depth. Null and absent values are kept.
    pub fn redacted(&self, sensitive: &[&str]) -> Self {
        let inner = self
            .0
            .iter()
            .map(|(name, value)| {
                let redacted = if sensitive.contains(&name.as_str()) && *value != Value::Null {
                    Value::string(REDACTED)
                } else {
                    value.redact_leaves(sensitive)
                };
                (name.clone(), redacted)
            })
            .collect();
        Self(inner)
    }

    /// Collect the non-empty string values of sensitive attributes.
    pub fn sensitive_values(&self, sensitive: &[&str]) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_sensitive(sensitive, &mut out);
        out
    }

    fn collect_sensitive(&self, sensitive: &[&str], out: &mut Vec<String>) {
        for (name, value) in &self.0 {
            match value {
                Value::String(text) if sensitive.contains(&name.as_str()) => {
                    if !text.is_empty() {
                        out.push(text.clone());
                    }
                }
                other => other.collect_sensitive(sensitive, out),
            }
        }
    }

    /// Render as a JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.0
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect(),
        )
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self(BTreeMap::deserialize(deserializer)?))
    }
}

/// Three-state view of a declarative attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field<T> {
    /// The attribute is not present at all.
    Absent,
    /// The attribute is present and explicitly null.
    Null,
    /// The attribute carries a value.
    Known(T),
}

impl<T> Field<T> {
    /// Return the known value, or `None` when absent or null.
    pub fn known(self) -> Option<T> {
        match self {
            Self::Known(value) => Some(value),
            Self::Absent | Self::Null => None,
        }
    }

    /// Whether the attribute is absent or null.
    pub fn is_unset(&self) -> bool {
        !matches!(self, Self::Known(_))
    }

    /// Map the known value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Field<U> {
        match self {
            Self::Absent => Field::Absent,
            Self::Null => Field::Null,
            Self::Known(value) => Field::Known(f(value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSegment {
    Attr(String),
    Index(usize),
}

/// Location of an attribute inside a record, rendered as
/// `principals[0].roles[1].id`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributePath(Vec<PathSegment>);

impl AttributePath {
    /// The record itself.
    pub fn root() -> Self {
        Self::default()
    }

    /// Path to a named child attribute.
    pub fn attr(&self, name: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Attr(name.to_owned()));
        Self(segments)
    }

    /// Path to a collection element.
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        Self(segments)
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        for (position, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Attr(name) if position == 0 => f.write_str(name)?,
                PathSegment::Attr(name) => write!(f, ".{name}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// Translation failure while reading a declarative record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid attribute {path}: {message}")]
pub struct DecodeError {
    /// Offending attribute.
    pub path: AttributePath,
    /// What was wrong with it.
    pub message: String,
}

impl DecodeError {
    /// Build an error for `path`.
    pub fn new(path: AttributePath, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
        }
    }
}

/// Translation failure while producing a declarative record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot encode attribute {path}: {message}")]
pub struct EncodeError {
    /// Offending attribute.
    pub path: AttributePath,
    /// What was wrong with it.
    pub message: String,
}

impl EncodeError {
    /// Build an error for `path`.
    pub fn new(path: AttributePath, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
        }
    }
}

/// Typed reader over a declarative record.
///
/// Every accessor fills the declared default for absent or null values, so
/// translators never hand unset values to the domain.
#[derive(Debug, Clone, Copy)]
pub struct Decoder<'a> {
    record: &'a Record,
    path: &'a AttributePath,
}

impl<'a> Decoder<'a> {
    /// Read `record` located at `path`.
    pub fn new(record: &'a Record, path: &'a AttributePath) -> Self {
        Self { record, path }
    }

    /// Path of the record being read.
    pub fn path(&self) -> &AttributePath {
        self.path
    }

    /// Underlying record.
    pub fn record(&self) -> &'a Record {
        self.record
    }

    fn mismatch(&self, name: &str, expected: &str, found: &Value) -> DecodeError {
        DecodeError::new(
            self.path.attr(name),
            format!("expected {expected}, found {}", found.kind_name()),
        )
    }

    /// Read an optional string.
    ///
    /// # Errors
    ///
    /// Fails when the value is present but not a string.
    pub fn string(&self, name: &str) -> Result<Field<String>, DecodeError> {
        match self.record.field(name) {
            Field::Absent => Ok(Field::Absent),
            Field::Null => Ok(Field::Null),
            Field::Known(Value::String(value)) => Ok(Field::Known(value.clone())),
            Field::Known(other) => Err(self.mismatch(name, "string", other)),
        }
    }

    /// Read a string, substituting `default` when unset.
    ///
    /// # Errors
    ///
    /// Fails when the value is present but not a string.
    pub fn string_or(&self, name: &str, default: &str) -> Result<String, DecodeError> {
        Ok(self
            .string(name)?
            .known()
            .unwrap_or_else(|| default.to_owned()))
    }

    /// Read a string that must be set.
    ///
    /// # Errors
    ///
    /// Fails when the value is unset or not a string.
    pub fn required_string(&self, name: &str) -> Result<String, DecodeError> {
        self.string(name)?
            .known()
            .ok_or_else(|| DecodeError::new(self.path.attr(name), "required attribute is not set"))
    }

    /// Read a boolean, substituting `default` when unset.
    ///
    /// # Errors
    ///
    /// Fails when the value is present but not a boolean.
    pub fn bool_or(&self, name: &str, default: bool) -> Result<bool, DecodeError> {
        match self.record.field(name) {
            Field::Absent | Field::Null => Ok(default),
            Field::Known(Value::Bool(value)) => Ok(*value),
            Field::Known(other) => Err(self.mismatch(name, "bool", other)),
        }
    }

    /// Read an optional integer.
    ///
    /// # Errors
    ///
    /// Fails when the value is present but not an integer.
    pub fn int(&self, name: &str) -> Result<Option<i64>, DecodeError> {
        match self.record.field(name) {
            Field::Absent | Field::Null => Ok(None),
            Field::Known(Value::Int(value)) => Ok(Some(*value)),
            Field::Known(other) => Err(self.mismatch(name, "int", other)),
        }
    }

    /// Read an integer that must fit `T`, substituting `default` when unset.
    ///
    /// # Errors
    ///
    /// Fails when the value is not an integer or out of range for `T`.
    pub fn int_in<T>(&self, name: &str, default: T) -> Result<T, DecodeError>
    where
        T: TryFrom<i64> + fmt::Display,
    {
        match self.int(name)? {
            None => Ok(default),
            Some(value) => T::try_from(value).map_err(|_| {
                DecodeError::new(self.path.attr(name), format!("{value} is out of range"))
            }),
        }
    }

    fn collection(&self, name: &str) -> Result<&'a [Value], DecodeError> {
        match self.record.field(name) {
            Field::Absent | Field::Null => Ok(&[]),
            Field::Known(Value::List(items) | Value::Set(items)) => Ok(items.as_slice()),
            Field::Known(other) => Err(self.mismatch(name, "collection", other)),
        }
    }

    /// Read a string collection. Unset collections decode to empty.
    ///
    /// # Errors
    ///
    /// Fails when the value is not a collection or an element is not a
    /// string.
    pub fn strings(&self, name: &str) -> Result<Vec<String>, DecodeError> {
        let base = self.path.attr(name);
        self.collection(name)?
            .iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::String(value) => Ok(value.clone()),
                other => Err(DecodeError::new(
                    base.index(index),
                    format!("expected string, found {}", other.kind_name()),
                )),
            })
            .collect()
    }

    /// Read a collection of nested records element-wise, preserving order.
    ///
    /// # Errors
    ///
    /// Fails when the value is not a collection, an element is not an
    /// object, or `read` fails on an element.
    pub fn objects<T>(
        &self,
        name: &str,
        read: impl Fn(Decoder<'_>) -> Result<T, DecodeError>,
    ) -> Result<Vec<T>, DecodeError> {
        let base = self.path.attr(name);
        self.collection(name)?
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let element_path = base.index(index);
                match item {
                    Value::Object(record) => read(Decoder::new(record, &element_path)),
                    other => Err(DecodeError::new(
                        element_path.clone(),
                        format!("expected object, found {}", other.kind_name()),
                    )),
                }
            })
            .collect()
    }

    /// Read an optional nested record.
    ///
    /// # Errors
    ///
    /// Fails when the value is present but not an object, or `read` fails.
    pub fn object<T>(
        &self,
        name: &str,
        read: impl FnOnce(Decoder<'_>) -> Result<T, DecodeError>,
    ) -> Result<Option<T>, DecodeError> {
        match self.record.field(name) {
            Field::Absent | Field::Null => Ok(None),
            Field::Known(Value::Object(record)) => {
                let nested = self.path.attr(name);
                read(Decoder::new(record, &nested)).map(Some)
            }
            Field::Known(other) => Err(self.mismatch(name, "object", other)),
        }
    }
}

/// Builder for declarative records on the encode path.
#[derive(Debug, Default)]
pub struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    /// Start an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a string attribute.
    #[must_use]
    pub fn string(mut self, name: &str, value: impl Into<String>) -> Self {
        self.record.insert(name, Value::String(value.into()));
        self
    }

    /// Set a string attribute, or null when `None`.
    #[must_use]
    pub fn optional_string(mut self, name: &str, value: Option<&str>) -> Self {
        let value = value.map_or(Value::Null, Value::string);
        self.record.insert(name, value);
        self
    }

    /// Set a boolean attribute.
    #[must_use]
    pub fn bool(mut self, name: &str, value: bool) -> Self {
        self.record.insert(name, Value::Bool(value));
        self
    }

    /// Set an integer attribute.
    #[must_use]
    pub fn int(mut self, name: &str, value: impl Into<i64>) -> Self {
        self.record.insert(name, Value::Int(value.into()));
        self
    }

    /// Set an ordered string collection; empty input yields an empty list.
    #[must_use]
    pub fn list(mut self, name: &str, items: &[String]) -> Self {
        self.record.insert(name, Value::string_list(items.iter().cloned()));
        self
    }

    /// Set an unordered string collection; empty input yields an empty set.
    #[must_use]
    pub fn set(mut self, name: &str, items: &[String]) -> Self {
        self.record.insert(name, Value::string_set(items.iter().cloned()));
        self
    }

    /// Set an ordered collection of nested records.
    #[must_use]
    pub fn objects(mut self, name: &str, items: Vec<Record>) -> Self {
        self.record
            .insert(name, Value::List(items.into_iter().map(Value::Object).collect()));
        self
    }

    /// Set a nested record, or null when `None`.
    #[must_use]
    pub fn object(mut self, name: &str, item: Option<Record>) -> Self {
        self.record.insert(name, item.map_or(Value::Null, Value::Object));
        self
    }

    /// Set an arbitrary value.
    #[must_use]
    pub fn value(mut self, name: &str, value: Value) -> Self {
        self.record.insert(name, value);
        self
    }

    /// Finish the record.
    pub fn build(self) -> Record {
        self.record
    }
}
