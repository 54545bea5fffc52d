use serde_json::{Map, Value};

/// Outcome of reading one loosely-typed field from a source record.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Decoded<T> {
    Found(T),
    Fallback(T),
}

impl<T> Decoded<T> {
    pub(crate) fn into_inner(self) -> T {
        match self {
            Self::Found(value) | Self::Fallback(value) => value,
        }
    }

    pub(crate) fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

/// Text form of a scalar. Whole floats print without a fractional part so
/// `2.0` and `2` address the same problem.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => {
            if let Some(integer) = number.as_i64() {
                return Some(integer.to_string());
            }
            if let Some(integer) = number.as_u64() {
                return Some(integer.to_string());
            }
            number.as_f64().map(|float| {
                if float.fract() == 0.0 && float.abs() < 1e15 {
                    format!("{}", float as i64)
                } else {
                    float.to_string()
                }
            })
        }
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// First non-empty scalar among the accepted spellings of a field.
pub(crate) fn text_field(record: &Map<String, Value>, keys: &[&str]) -> Decoded<String> {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .filter_map(scalar_text)
        .map(|text| text.trim().to_string())
        .find(|text| !text.is_empty())
        .map_or_else(|| Decoded::Fallback(String::new()), Decoded::Found)
}

/// Scalar field kept verbatim (no trimming), empty when missing.
pub(crate) fn raw_text_field(record: &Map<String, Value>, key: &str) -> String {
    record.get(key).and_then(scalar_text).unwrap_or_default()
}

/// Ordered list of opaque text; non-string items are rendered as JSON.
pub(crate) fn text_list_field(record: &Map<String, Value>, keys: &[&str]) -> Decoded<Vec<String>> {
    let Some(Value::Array(items)) = keys.iter().find_map(|key| record.get(*key)) else {
        return Decoded::Fallback(Vec::new());
    };

    Decoded::Found(items.iter().map(render_opaque).collect())
}

pub(crate) fn render_opaque(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub(crate) fn f64_field(record: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .find_map(|value| match value {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        })
}

pub(crate) fn u64_field(record: &Map<String, Value>, keys: &[&str]) -> Option<u64> {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .find_map(|value| match value {
            Value::Number(number) => number
                .as_u64()
                .or_else(|| number.as_f64().filter(|float| *float >= 0.0).map(|float| float as u64)),
            Value::String(text) => text.trim().parse::<u64>().ok(),
            _ => None,
        })
}
