use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use mysql_async::Value;
use mysql_async::binlog::value::BinlogValue;

use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::types::Cell;

/// Column types whose content is kept as raw bytes instead of being decoded as text.
const BINARY_DATA_TYPES: &[&str] = &[
    "binary",
    "varbinary",
    "tinyblob",
    "blob",
    "mediumblob",
    "longblob",
    "bit",
    "geometry",
    "point",
    "linestring",
    "polygon",
    "multipoint",
    "multilinestring",
    "multipolygon",
    "geometrycollection",
];

/// Converts a decoded binlog column value into a [`Cell`].
///
/// `data_type` is the column's `DATA_TYPE` as reported by `information_schema.columns`. It
/// disambiguates values the binlog encodes identically, such as text and blobs or dates
/// and date-times.
pub fn binlog_value_to_cell(value: BinlogValue<'_>, data_type: &str) -> EtlResult<Cell> {
    match value {
        BinlogValue::Value(value) => value_to_cell(value, data_type),
        BinlogValue::Jsonb(jsonb) => {
            let json = serde_json::Value::try_from(jsonb).map_err(|err| {
                etl_error!(
                    ErrorKind::ConversionError,
                    "Invalid JSON column value",
                    err
                )
            })?;

            Ok(Cell::Json(json))
        }
        BinlogValue::JsonDiff(_) => {
            bail!(
                ErrorKind::ProtocolViolation,
                "Partial JSON update in binlog",
                "Row images with partial JSON updates cannot be mapped to full documents, set binlog_row_value_options to an empty value on the source"
            );
        }
    }
}

/// Converts a plain MySQL value into a [`Cell`].
pub fn value_to_cell(value: Value, data_type: &str) -> EtlResult<Cell> {
    let cell = match value {
        Value::NULL => Cell::Null,
        Value::Int(value) => Cell::I64(value),
        Value::UInt(value) => Cell::U64(value),
        Value::Float(value) => Cell::F32(value),
        Value::Double(value) => Cell::F64(value),
        Value::Bytes(bytes) => bytes_to_cell(bytes, data_type),
        Value::Date(year, month, day, hour, minute, second, micros) => {
            date_to_cell(data_type, year, month, day, hour, minute, second, micros)
        }
        Value::Time(negative, days, hours, minutes, seconds, micros) => {
            Cell::String(format_time(negative, days, hours, minutes, seconds, micros))
        }
    };

    Ok(cell)
}

fn is_binary_type(data_type: &str) -> bool {
    BINARY_DATA_TYPES
        .iter()
        .any(|binary| data_type.eq_ignore_ascii_case(binary))
}

fn bytes_to_cell(bytes: Vec<u8>, data_type: &str) -> Cell {
    if is_binary_type(data_type) {
        return Cell::Bytes(bytes);
    }

    // Text columns with a non UTF-8 charset still reach sinks, as bytes.
    match String::from_utf8(bytes) {
        Ok(text) => Cell::String(text),
        Err(err) => Cell::Bytes(err.into_bytes()),
    }
}

#[allow(clippy::too_many_arguments)]
fn date_to_cell(
    data_type: &str,
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
    micros: u32,
) -> Cell {
    let Some(date) = NaiveDate::from_ymd_opt(year.into(), month.into(), day.into()) else {
        // Zero dates such as `0000-00-00` have no calendar representation.
        return Cell::String(format!(
            "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"
        ));
    };

    if data_type.eq_ignore_ascii_case("date") {
        return Cell::Date(date);
    }

    match NaiveTime::from_hms_micro_opt(hour.into(), minute.into(), second.into(), micros) {
        Some(time) => Cell::DateTime(NaiveDateTime::new(date, time)),
        None => Cell::String(format!(
            "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}.{micros:06}"
        )),
    }
}

fn format_time(negative: bool, days: u32, hours: u8, minutes: u8, seconds: u8, micros: u32) -> String {
    let sign = if negative { "-" } else { "" };
    let hours = u64::from(days) * 24 + u64::from(hours);

    if micros == 0 {
        format!("{sign}{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{sign}{hours:02}:{minutes:02}:{seconds:02}.{micros:06}")
    }
}
