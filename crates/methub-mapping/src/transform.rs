use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The closed set of per-rule value transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    Uppercase,
    Lowercase,
    Trim,
    Number,
    Boolean,
    String,
    DateIso,
    JsonParse,
    JsonStringify,
    ArrayFirst,
    ArrayLast,
    ArrayJoin,
    PhoneClean,
    EmailLower,
}

/// Outcome of applying a transform to a resolved value.
pub enum Applied {
    /// The transformed value to write.
    Value(Value),
    /// Coercion produced nothing (empty string to number, NaN, empty array).
    Absent,
    /// The input type does not fit the transform.
    TypeError,
}

impl Transform {
    /// Apply the transform. Never panics; bad input degrades to
    /// [`Applied::Absent`] or [`Applied::TypeError`].
    pub fn apply(&self, value: &Value) -> Applied {
        match self {
            Transform::Uppercase => match value.as_str() {
                Some(s) => Applied::Value(Value::String(s.to_uppercase())),
                None => Applied::TypeError,
            },
            Transform::Lowercase => match value.as_str() {
                Some(s) => Applied::Value(Value::String(s.to_lowercase())),
                None => Applied::TypeError,
            },
            Transform::Trim => match value.as_str() {
                Some(s) => Applied::Value(Value::String(s.trim().to_string())),
                None => Applied::TypeError,
            },
            Transform::Number => coerce_number(value),
            Transform::Boolean => coerce_boolean(value),
            Transform::String => coerce_string(value),
            Transform::DateIso => parse_date(value),
            Transform::JsonParse => match value.as_str() {
                Some(s) => match serde_json::from_str::<Value>(s) {
                    Ok(v) => Applied::Value(v),
                    Err(_) => Applied::TypeError,
                },
                None => Applied::TypeError,
            },
            Transform::JsonStringify => match serde_json::to_string(value) {
                Ok(s) => Applied::Value(Value::String(s)),
                Err(_) => Applied::TypeError,
            },
            Transform::ArrayFirst => match value.as_array() {
                Some(arr) => match arr.first() {
                    Some(v) => Applied::Value(v.clone()),
                    None => Applied::Absent,
                },
                None => Applied::Value(value.clone()),
            },
            Transform::ArrayLast => match value.as_array() {
                Some(arr) => match arr.last() {
                    Some(v) => Applied::Value(v.clone()),
                    None => Applied::Absent,
                },
                None => Applied::Value(value.clone()),
            },
            Transform::ArrayJoin => match value.as_array() {
                Some(arr) => {
                    let parts: Vec<String> = arr.iter().map(scalar_to_string).collect();
                    Applied::Value(Value::String(parts.join(",")))
                }
                None => Applied::TypeError,
            },
            Transform::PhoneClean => match value.as_str() {
                Some(s) => {
                    let plus = s.trim_start().starts_with('+');
                    let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
                    let cleaned = if plus { format!("+{digits}") } else { digits };
                    Applied::Value(Value::String(cleaned))
                }
                None => Applied::TypeError,
            },
            Transform::EmailLower => match value.as_str() {
                Some(s) => Applied::Value(Value::String(s.trim().to_lowercase())),
                None => Applied::TypeError,
            },
        }
    }
}

impl std::fmt::Display for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Transform::Uppercase => "uppercase",
            Transform::Lowercase => "lowercase",
            Transform::Trim => "trim",
            Transform::Number => "number",
            Transform::Boolean => "boolean",
            Transform::String => "string",
            Transform::DateIso => "date_iso",
            Transform::JsonParse => "json_parse",
            Transform::JsonStringify => "json_stringify",
            Transform::ArrayFirst => "array_first",
            Transform::ArrayLast => "array_last",
            Transform::ArrayJoin => "array_join",
            Transform::PhoneClean => "phone_clean",
            Transform::EmailLower => "email_lower",
        };
        write!(f, "{name}")
    }
}

fn coerce_number(value: &Value) -> Applied {
    match value {
        Value::Number(_) => Applied::Value(value.clone()),
        Value::Bool(b) => Applied::Value(Value::from(if *b { 1 } else { 0 })),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Applied::Absent;
            }
            match trimmed.parse::<f64>() {
                Ok(n) if n.is_finite() => match serde_json::Number::from_f64(n) {
                    Some(num) => Applied::Value(Value::Number(num)),
                    None => Applied::Absent,
                },
                Ok(_) => Applied::Absent,
                Err(_) => Applied::TypeError,
            }
        }
        _ => Applied::TypeError,
    }
}

fn coerce_boolean(value: &Value) -> Applied {
    match value {
        Value::Bool(_) => Applied::Value(value.clone()),
        Value::Number(n) => Applied::Value(Value::Bool(n.as_f64().unwrap_or(0.0) != 0.0)),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "" => Applied::Absent,
            "true" | "yes" | "1" => Applied::Value(Value::Bool(true)),
            "false" | "no" | "0" => Applied::Value(Value::Bool(false)),
            _ => Applied::TypeError,
        },
        _ => Applied::TypeError,
    }
}

fn coerce_string(value: &Value) -> Applied {
    match value {
        Value::String(_) => Applied::Value(value.clone()),
        Value::Number(n) => Applied::Value(Value::String(n.to_string())),
        Value::Bool(b) => Applied::Value(Value::String(b.to_string())),
        Value::Null => Applied::Absent,
        _ => Applied::TypeError,
    }
}

/// Accepts RFC3339 strings, unix seconds and unix milliseconds (numbers or
/// numeric strings); emits an RFC3339 UTC string.
fn parse_date(value: &Value) -> Applied {
    let parsed: Option<DateTime<Utc>> = match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Applied::Absent;
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
                Some(dt.with_timezone(&Utc))
            } else if let Ok(n) = trimmed.parse::<i64>() {
                from_epoch(n)
            } else {
                None
            }
        }
        Value::Number(n) => n.as_i64().and_then(from_epoch),
        _ => None,
    };

    match parsed {
        Some(dt) => Applied::Value(Value::String(
            dt.to_rfc3339_opts(SecondsFormat::Secs, true),
        )),
        None => Applied::TypeError,
    }
}

// Values at or above 10^12 are treated as milliseconds (seconds would put
// them past the year 33000).
fn from_epoch(n: i64) -> Option<DateTime<Utc>> {
    if n.abs() >= 1_000_000_000_000 {
        Utc.timestamp_millis_opt(n).single()
    } else {
        Utc.timestamp_opt(n, 0).single()
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
