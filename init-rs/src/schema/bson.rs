use chrono::{DateTime, SecondsFormat, Utc};
use regex_lite::Regex;
use serde_json::{json, Map, Value};
use std::sync::OnceLock;

/// Key used by extended JSON to mark a date value.
pub const DATE_KEY: &str = "$date";

/// Shape of the string inside a date value. Written in the common subset of
/// regex-lite and Postgres regular expressions so both stores apply the same
/// rule.
pub const DATE_PATTERN: &str =
    r"^[0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}:[0-9]{2}(\.[0-9]+)?(Z|[+-][0-9]{2}:[0-9]{2})$";

fn date_regex() -> Option<&'static Regex> {
    static DATE_RE: OnceLock<Option<Regex>> = OnceLock::new();
    DATE_RE.get_or_init(|| Regex::new(DATE_PATTERN).ok()).as_ref()
}

/// True for `{"$date": "<timestamp>"}`: exactly one key, a string matching
/// `DATE_PATTERN`.
pub fn is_date(map: &Map<String, Value>) -> bool {
    if map.len() != 1 {
        return false;
    }
    match (map.get(DATE_KEY).and_then(Value::as_str), date_regex()) {
        (Some(raw), Some(re)) => re.is_match(raw),
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BsonType {
    String,
    Date,
    Object,
    Array,
    Bool,
    Int,
    Long,
    Double,
    Null,
}

impl BsonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BsonType::String => "string",
            BsonType::Date => "date",
            BsonType::Object => "object",
            BsonType::Array => "array",
            BsonType::Bool => "bool",
            BsonType::Int => "int",
            BsonType::Long => "long",
            BsonType::Double => "double",
            BsonType::Null => "null",
        }
    }

    /// Classifies a JSON value. `{"$date": "<rfc3339>"}` is a date, any
    /// other object is an object.
    pub fn of(value: &Value) -> BsonType {
        match value {
            Value::Null => BsonType::Null,
            Value::Bool(_) => BsonType::Bool,
            Value::String(_) => BsonType::String,
            Value::Array(_) => BsonType::Array,
            Value::Number(n) => match n.as_i64() {
                Some(i) if i32::try_from(i).is_ok() => BsonType::Int,
                Some(_) => BsonType::Long,
                None if n.is_u64() => BsonType::Long,
                None => BsonType::Double,
            },
            Value::Object(map) => {
                if is_date(map) {
                    BsonType::Date
                } else {
                    BsonType::Object
                }
            }
        }
    }

    /// Postgres `jsonb_typeof` result a value of this type is stored as.
    pub fn jsonb_type(&self) -> &'static str {
        match self {
            BsonType::String => "string",
            BsonType::Date | BsonType::Object => "object",
            BsonType::Array => "array",
            BsonType::Bool => "boolean",
            BsonType::Int | BsonType::Long | BsonType::Double => "number",
            BsonType::Null => "null",
        }
    }
}

impl std::fmt::Display for BsonType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn parse_date(map: &Map<String, Value>) -> Option<DateTime<Utc>> {
    if !is_date(map) {
        return None;
    }
    let raw = map.get(DATE_KEY)?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Builds an extended JSON date value.
pub fn date(at: DateTime<Utc>) -> Value {
    json!({ DATE_KEY: at.to_rfc3339_opts(SecondsFormat::Millis, true) })
}

/// Reads an extended JSON date value back. `None` for values that have the
/// date shape but name no real instant, e.g. month 13.
pub fn as_date(value: &Value) -> Option<DateTime<Utc>> {
    value.as_object().and_then(parse_date)
}
