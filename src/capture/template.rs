use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::Value;

use super::CaptureStore;
use crate::error::CaptureError;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Everything outside the RFC 3986 unreserved set is escaped, so a value
/// can never add a path segment, a query or a fragment.
const URL_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Splits text into literal runs and `{{name}}` references. On an opening
/// pair without a close, or an empty or brace-bearing name, returns the
/// offending fragment.
fn segments(input: &str) -> Result<Vec<Segment<'_>>, &str> {
    let mut out = Vec::new();
    let mut rest = input;

    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            return Err(&rest[start..]);
        };
        let name = after_open[..end].trim();
        if name.is_empty() || name.contains(['{', '}']) {
            return Err(&rest[start..start + OPEN.len() + end + CLOSE.len()]);
        }
        if start > 0 {
            out.push(Segment::Literal(&rest[..start]));
        }
        out.push(Segment::Reference(name));
        rest = &after_open[end + CLOSE.len()..];
    }

    if !rest.is_empty() {
        out.push(Segment::Literal(rest));
    }
    Ok(out)
}

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Literal(&'a str),
    Reference(&'a str),
}

/// Names referenced by `{{name}}` placeholders in `input`, in order of
/// appearance. Malformed text yields no names; see [`malformed`].
pub fn references(input: &str) -> Vec<String> {
    segments(input)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Reference(name) => Some(name.to_string()),
            Segment::Literal(_) => None,
        })
        .collect()
}

/// Names referenced anywhere inside string values of a JSON document.
pub fn json_references(value: &Value) -> Vec<String> {
    let mut names = Vec::new();
    walk_strings(value, &mut |text: &str| names.extend(references(text)));
    names
}

/// The first malformed placeholder in `input`, if any.
pub fn malformed(input: &str) -> Option<String> {
    segments(input).err().map(str::to_string)
}

pub fn json_malformed(value: &Value) -> Vec<String> {
    let mut fragments = Vec::new();
    walk_strings(value, &mut |text: &str| fragments.extend(malformed(text)));
    fragments
}

fn walk_strings(value: &Value, visit: &mut impl FnMut(&str)) {
    match value {
        Value::String(text) => visit(text),
        Value::Array(items) => items.iter().for_each(|item| walk_strings(item, visit)),
        Value::Object(map) => map.values().for_each(|item| walk_strings(item, visit)),
        _ => {}
    }
}

fn parse<'a>(input: &'a str, location: &str) -> Result<Vec<Segment<'a>>, CaptureError> {
    segments(input).map_err(|fragment| CaptureError::MalformedPlaceholder {
        fragment: fragment.to_string(),
        location: location.to_string(),
    })
}

fn render(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Text form of a value bound for a URL. Only non-empty scalars qualify,
/// and a bare `.` or `..` would still be read as a dot segment once escaped.
fn render_url(name: &str, value: &Value) -> Result<String, CaptureError> {
    let invalid = |reason: &str| CaptureError::InvalidUrlValue {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    let text = match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Null => return Err(invalid("value is null")),
        Value::Array(_) | Value::Object(_) => return Err(invalid("value is not a scalar")),
    };
    match text.as_str() {
        "" => Err(invalid("value is empty")),
        "." | ".." => Err(invalid("value is a dot segment")),
        _ => Ok(text),
    }
}

fn lookup<'a>(
    store: &'a CaptureStore,
    name: &str,
    location: &str,
) -> Result<&'a Value, CaptureError> {
    store.value(name).map_err(|err| match err {
        CaptureError::UnknownCapture { name } => CaptureError::UnresolvedReference {
            name,
            location: location.to_string(),
        },
        other => other,
    })
}

/// Replace every `{{name}}` in `input` with the text form of its value.
/// `location` names the request part being resolved, for error messages.
pub fn interpolate(
    input: &str,
    store: &CaptureStore,
    location: &str,
) -> Result<String, CaptureError> {
    let mut result = String::with_capacity(input.len());
    for segment in parse(input, location)? {
        match segment {
            Segment::Literal(text) => result.push_str(text),
            Segment::Reference(name) => result.push_str(&render(lookup(store, name, location)?)),
        }
    }
    Ok(result)
}

/// Like [`interpolate`], for a URL: each value is percent-encoded as a
/// single path segment or query value. Literal text is left alone.
pub fn interpolate_url(input: &str, store: &CaptureStore) -> Result<String, CaptureError> {
    let mut result = String::with_capacity(input.len());
    for segment in parse(input, "url")? {
        match segment {
            Segment::Literal(text) => result.push_str(text),
            Segment::Reference(name) => {
                let text = render_url(name, lookup(store, name, "url")?)?;
                result.extend(utf8_percent_encode(&text, URL_VALUE));
            }
        }
    }
    Ok(result)
}

/// Resolve placeholders inside a JSON document. A string that is exactly
/// one placeholder takes the referenced value with its JSON type intact;
/// placeholders embedded in longer strings are rendered as text.
pub fn interpolate_json(
    value: &Value,
    store: &CaptureStore,
    location: &str,
) -> Result<Value, CaptureError> {
    match value {
        Value::String(text) => match parse(text, location)?.as_slice() {
            [Segment::Reference(name)] => Ok(lookup(store, name, location)?.clone()),
            _ => Ok(Value::String(interpolate(text, store, location)?)),
        },
        Value::Array(items) => items
            .iter()
            .map(|item| interpolate_json(item, store, location))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => map
            .iter()
            .map(|(key, item)| Ok((key.clone(), interpolate_json(item, store, location)?)))
            .collect::<Result<serde_json::Map<_, _>, CaptureError>>()
            .map(Value::Object),
        other => Ok(other.clone()),
    }
}
