use std::fmt::Display;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

/// Layout of every timestamp a station writes: local time, second precision.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("a schema needs at least one field")]
    Empty,
    #[error("field {0} has an empty name")]
    EmptyName(usize),
    #[error("field name {0:?} appears more than once")]
    Duplicate(String),
}

/// Ordered field names shared by every record and every sink of one manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Arc<[String]>,
}

impl Schema {
    pub fn new<I, S>(fields: I) -> Result<Schema, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if fields.is_empty() {
            return Err(SchemaError::Empty);
        }
        for (index, name) in fields.iter().enumerate() {
            if name.is_empty() {
                return Err(SchemaError::EmptyName(index));
            }
            if fields[..index].contains(name) {
                return Err(SchemaError::Duplicate(name.clone()));
            }
        }
        Ok(Schema {
            fields: fields.into(),
        })
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// One measured value. Strings in `TIMESTAMP_FORMAT` become `Timestamp` when
/// decoded so the relational sink can bind them to time columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged, from = "WireValue")]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Timestamp(String),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireValue {
    Null(()),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<WireValue> for Value {
    fn from(wire: WireValue) -> Self {
        match wire {
            WireValue::Null(()) => Value::Null,
            WireValue::Integer(i) => Value::Integer(i),
            WireValue::Float(f) => Value::Float(f),
            WireValue::Text(s) => {
                if NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT).is_ok() {
                    Value::Timestamp(s)
                } else {
                    Value::Text(s)
                }
            }
        }
    }
}

impl Value {
    pub fn timestamp_now() -> Value {
        Value::Timestamp(chrono::Local::now().format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Text form used by delimited files. Null is the empty field and floats
    /// keep a trailing `.0` when integral.
    pub fn to_field(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => format!("{f:?}"),
            Value::Timestamp(s) | Value::Text(s) => s.clone(),
        }
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(option: Option<T>) -> Self {
        option.map(Into::into).unwrap_or(Value::Null)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            other => f.write_str(&other.to_field()),
        }
    }
}

/// An immutable measurement sample. Clones share the same values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    values: Arc<[Value]>,
}

impl Record {
    pub fn new(values: Vec<Value>) -> Record {
        Record {
            values: values.into(),
        }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn fits(&self, schema: &Schema) -> bool {
        self.values.len() == schema.len()
    }

    /// Pairs each value with its field name for keyed serialization.
    pub fn keyed<'a>(&'a self, schema: &'a Schema) -> KeyedRecord<'a> {
        KeyedRecord {
            schema,
            record: self,
        }
    }
}

impl FromIterator<Value> for Record {
    fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
        Record::new(iter.into_iter().collect())
    }
}

pub struct KeyedRecord<'a> {
    schema: &'a Schema,
    record: &'a Record,
}

impl Serialize for KeyedRecord<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.schema.len()))?;
        for (name, value) in self.schema.fields().iter().zip(self.record.values()) {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_rejects_bad_field_lists() {
        assert_eq!(Schema::new(Vec::<String>::new()), Err(SchemaError::Empty));
        assert_eq!(Schema::new(["time", ""]), Err(SchemaError::EmptyName(1)));
        assert_eq!(
            Schema::new(["time", "rain", "time"]),
            Err(SchemaError::Duplicate("time".to_string()))
        );
        assert_eq!(Schema::new(["time", "rain"]).unwrap().len(), 2);
    }

    #[test]
    fn decodes_json_values_by_shape() {
        let record: Record =
            serde_json::from_str(r#"["2023-04-01 12:00:00", 1.5, 3, "NNW", null]"#).unwrap();
        assert_eq!(
            record.values(),
            &[
                Value::Timestamp("2023-04-01 12:00:00".to_string()),
                Value::Float(1.5),
                Value::Integer(3),
                Value::Text("NNW".to_string()),
                Value::Null,
            ]
        );
    }

    #[test]
    fn field_text_keeps_float_shape() {
        assert_eq!(Value::Float(3.0).to_field(), "3.0");
        assert_eq!(Value::Float(1.1).to_field(), "1.1");
        assert_eq!(Value::Integer(7).to_field(), "7");
        assert_eq!(Value::Null.to_field(), "");
    }

    #[test]
    fn keyed_record_follows_schema_order() {
        let schema = Schema::new(["time", "ws_ave", "w_dir"]).unwrap();
        let record = Record::new(vec!["t1".into(), 1.1.into(), Value::Null]);
        let json = serde_json::to_string(&record.keyed(&schema)).unwrap();
        assert_eq!(json, r#"{"time":"t1","ws_ave":1.1,"w_dir":null}"#);
    }
}
