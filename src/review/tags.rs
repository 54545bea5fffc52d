use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use super::fields::{render_opaque, scalar_text};

// Matches single-quoted strings, double-quoted strings (left alone) and the
// bare `None` literal that Python-style dumps emit.
static LOOSE_LITERAL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"'((?:[^'\\]|\\.)*)'|"(?:[^"\\]|\\.)*"|\bNone\b"#).ok()
});

/// Decodes a tag field into an ordered list of tags. Never fails.
pub fn parse_tags(raw: &Value) -> Vec<String> {
    match raw {
        Value::Array(items) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(render_opaque)
            .collect(),
        Value::Null | Value::Object(_) => Vec::new(),
        scalar => scalar_text(scalar)
            .map(|text| parse_tag_text(&text))
            .unwrap_or_default(),
    }
}

pub fn parse_tag_text(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if let Some(tags) = decode_strict(trimmed) {
        return tags;
    }

    if let Some(tags) = normalize_loose(trimmed).and_then(|normalized| decode_strict(&normalized)) {
        return tags;
    }

    split_on_commas(trimmed)
}

fn decode_strict(text: &str) -> Option<Vec<String>> {
    match serde_json::from_str::<Value>(text).ok()? {
        Value::Array(items) => Some(
            items
                .iter()
                .filter(|item| !item.is_null())
                .map(render_opaque)
                .collect(),
        ),
        _ => None,
    }
}

fn normalize_loose(text: &str) -> Option<String> {
    let pattern = LOOSE_LITERAL.as_ref()?;
    let normalized = pattern.replace_all(text, |captures: &Captures<'_>| {
        if let Some(inner) = captures.get(1) {
            let unescaped = inner.as_str().replace("\\'", "'");
            return serde_json::to_string(&unescaped).unwrap_or_else(|_| "null".to_string());
        }
        let matched = &captures[0];
        if matched == "None" {
            "null".to_string()
        } else {
            matched.to_string()
        }
    });
    Some(normalized.into_owned())
}

fn split_on_commas(text: &str) -> Vec<String> {
    text.split(',')
        .map(|fragment| {
            fragment
                .trim()
                .trim_matches(|character| matches!(character, '[' | ']' | '\'' | '"'))
                .trim()
        })
        .filter(|fragment| !fragment.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}
