use chrono::{DateTime, NaiveDate};
use serde_json::{Map, Value};
use std::borrow::Cow;

/// Read access to a schema-flexible record by dot-separated field path.
///
/// Missing segments resolve to `None` rather than an error so that filters and
/// statistics can treat absence uniformly.
pub trait Record {
    fn field(&self, path: &str) -> Option<&Value>;
}

impl Record for Value {
    fn field(&self, path: &str) -> Option<&Value> {
        let mut current = self;
        for segment in path.split('.') {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

impl Record for Map<String, Value> {
    fn field(&self, path: &str) -> Option<&Value> {
        let (head, rest) = match path.split_once('.') {
            Some((h, r)) => (h, Some(r)),
            None => (path, None),
        };
        let v = self.get(head)?;
        match rest {
            Some(r) => v.field(r),
            None => Some(v),
        }
    }
}

impl<T: Record + ?Sized> Record for &T {
    fn field(&self, path: &str) -> Option<&Value> {
        (**self).field(path)
    }
}

/// Non-null value at `path`.
pub fn present<'a, R: Record + ?Sized>(record: &'a R, path: &str) -> Option<&'a Value> {
    record.field(path).filter(|v| !v.is_null())
}

/// Raw identifier of a document: `_id`, falling back to `id`.
pub fn id_value(v: &Value) -> Option<&Value> {
    v.get("_id")
        .filter(|x| !x.is_null())
        .or_else(|| v.get("id").filter(|x| !x.is_null()))
}

/// Identifier of a document as text.
pub fn record_id(v: &Value) -> Option<Cow<'_, str>> {
    scalar_text(id_value(v)?)
}

/// Text form of a scalar. Objects, arrays and null have none.
pub fn scalar_text(v: &Value) -> Option<Cow<'_, str>> {
    match v {
        Value::String(s) => Some(Cow::Borrowed(s.as_str())),
        Value::Number(n) => Some(Cow::Owned(n.to_string())),
        Value::Bool(b) => Some(Cow::Owned(b.to_string())),
        _ => None,
    }
}

/// Numeric reading of a value; numeric strings are accepted.
pub fn as_number(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Calendar day of a `YYYY-MM-DD` or RFC 3339 string.
pub fn as_date(v: &Value) -> Option<NaiveDate> {
    let s = v.as_str()?.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    // Mongo-style timestamps without an offset, e.g. 2024-03-01T00:00:00.000
    s.get(..10)
        .filter(|_| s.as_bytes().get(10) == Some(&b'T'))
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
}

/// Strict equality, except numbers compare by value (`3 == 3.0`).
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Equality against a field that may hold a raw id or a populated sub-document.
pub fn matches_ref(field: Option<&Value>, expected: &Value) -> bool {
    let Some(field) = field else {
        return false;
    };
    if values_equal(field, expected) {
        return true;
    }
    field
        .get("_id")
        .map(|id| values_equal(id, expected))
        .unwrap_or(false)
}

/// Filter values that mean "no constraint".
pub fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => {
            let t = s.trim();
            t.is_empty() || t.eq_ignore_ascii_case("all")
        }
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}
