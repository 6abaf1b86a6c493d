use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Serialize, Serializer};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATETIME_MICROS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// A single column value decoded from a binlog row.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    /// Binary column content, emitted as base64.
    Bytes(Vec<u8>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Json(serde_json::Value),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

impl Serialize for Cell {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Cell::Null => serializer.serialize_unit(),
            Cell::Bool(value) => serializer.serialize_bool(*value),
            Cell::I64(value) => serializer.serialize_i64(*value),
            Cell::U64(value) => serializer.serialize_u64(*value),
            Cell::F32(value) => serializer.serialize_f32(*value),
            Cell::F64(value) => serializer.serialize_f64(*value),
            Cell::String(value) => serializer.serialize_str(value),
            Cell::Bytes(value) => serializer.serialize_str(&BASE64.encode(value)),
            Cell::Date(value) => serializer.collect_str(&value.format(DATE_FORMAT)),
            Cell::DateTime(value) => {
                // Sub-second digits are only emitted when present.
                let format = if value.nanosecond() == 0 {
                    DATETIME_FORMAT
                } else {
                    DATETIME_MICROS_FORMAT
                };
                serializer.collect_str(&value.format(format))
            }
            Cell::Json(value) => value.serialize(serializer),
        }
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Bool(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::I64(value)
    }
}

impl From<u64> for Cell {
    fn from(value: u64) -> Self {
        Cell::U64(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::F64(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::String(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::String(value)
    }
}

impl<T> From<Option<T>> for Cell
where
    T: Into<Cell>,
{
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Null)
    }
}
