use crate::decl::{self, DeclError};
use crate::record::{self, Record};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How a filter key narrows records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Predicate {
    /// `field == value`, or `field._id == value` for populated references.
    Equals { field: String },
    /// Inclusive numeric range; value is `{ min, max }`.
    Range { field: String },
    /// Case-insensitive substring on any of `fields`. Array fields match on
    /// any scalar element.
    Contains { fields: Vec<String> },
    /// Exact boolean match.
    Boolean { field: String },
    /// Inclusive calendar-day range; value is `{ from, to }` or a single day.
    DateRange { field: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDef {
    pub key: String,
    #[serde(flatten)]
    pub predicate: Predicate,
}

impl FilterDef {
    pub fn equals(key: &str, field: &str) -> Self {
        Self::new(key, Predicate::Equals { field: field.into() })
    }

    pub fn range(key: &str, field: &str) -> Self {
        Self::new(key, Predicate::Range { field: field.into() })
    }

    pub fn contains(key: &str, fields: &[&str]) -> Self {
        Self::new(
            key,
            Predicate::Contains {
                fields: fields.iter().map(|f| f.to_string()).collect(),
            },
        )
    }

    pub fn boolean(key: &str, field: &str) -> Self {
        Self::new(key, Predicate::Boolean { field: field.into() })
    }

    pub fn date_range(key: &str, field: &str) -> Self {
        Self::new(key, Predicate::DateRange { field: field.into() })
    }

    fn new(key: &str, predicate: Predicate) -> Self {
        Self {
            key: key.to_string(),
            predicate,
        }
    }
}

/// Searchable fields plus the ordered filter declarations of one screen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    #[serde(default)]
    pub search_fields: Vec<String>,
    #[serde(default)]
    pub filters: Vec<FilterDef>,
}

impl FilterSpec {
    pub fn get(&self, key: &str) -> Option<&FilterDef> {
        self.filters.iter().find(|d| d.key == key)
    }

    pub fn validate(&self) -> Result<(), DeclError> {
        for f in &self.search_fields {
            decl::check_path("searchFields", f, f)?;
        }
        decl::check_unique("filters", self.filters.iter().map(|d| d.key.as_str()))?;
        for def in &self.filters {
            match &def.predicate {
                Predicate::Equals { field }
                | Predicate::Range { field }
                | Predicate::Boolean { field }
                | Predicate::DateRange { field } => decl::check_path("filter", &def.key, field)?,
                Predicate::Contains { fields } => {
                    if fields.is_empty() {
                        return Err(DeclError::NoFields(def.key.clone()));
                    }
                    for f in fields {
                        decl::check_path("filter", &def.key, f)?;
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Bounds<T> {
    min: Option<T>,
    max: Option<T>,
}

impl<T: PartialOrd + Copy> Bounds<T> {
    fn is_open(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    fn admits(&self, v: T) -> bool {
        self.min.map_or(true, |m| v >= m) && self.max.map_or(true, |m| v <= m)
    }
}

/// A filter entry with a usable value, ready to test records.
#[derive(Debug)]
enum Active<'a> {
    Contains { fields: &'a [String], term: String },
    Equals { field: &'a str, value: &'a Value },
    Strict { field: &'a str, value: &'a Value },
    Range { field: &'a str, bounds: Bounds<f64> },
    Boolean { field: &'a str, expected: bool },
    DateRange { field: &'a str, bounds: Bounds<NaiveDate> },
}

impl<'a> Active<'a> {
    /// `None` when the value is blank or malformed, i.e. imposes no constraint.
    fn compile(def: &'a FilterDef, value: &'a Value) -> Option<Self> {
        if record::is_blank(value) {
            return None;
        }
        match &def.predicate {
            Predicate::Equals { field } => Some(Active::Equals { field, value }),
            Predicate::Contains { fields } => {
                let term = search_term(record::scalar_text(value)?.as_ref())?;
                Some(Active::Contains { fields, term })
            }
            Predicate::Range { field } => {
                let bounds = numeric_bounds(value);
                (!bounds.is_open()).then_some(Active::Range { field, bounds })
            }
            Predicate::Boolean { field } => {
                let expected = match value {
                    Value::Bool(b) => *b,
                    Value::String(s) if s.trim().eq_ignore_ascii_case("true") => true,
                    Value::String(s) if s.trim().eq_ignore_ascii_case("false") => false,
                    _ => return None,
                };
                Some(Active::Boolean { field, expected })
            }
            Predicate::DateRange { field } => {
                let bounds = date_bounds(value);
                (!bounds.is_open()).then_some(Active::DateRange { field, bounds })
            }
        }
    }

    fn matches<R: Record + ?Sized>(&self, r: &R) -> bool {
        match self {
            Active::Contains { fields, term } => fields
                .iter()
                .any(|f| record::present(r, f).map_or(false, |v| text_contains(v, term))),
            Active::Equals { field, value } => record::matches_ref(r.field(field), value),
            Active::Strict { field, value } => r
                .field(field)
                .map(|v| record::values_equal(v, value))
                .unwrap_or(false),
            Active::Range { field, bounds } => record::present(r, field)
                .and_then(record::as_number)
                .map(|n| bounds.admits(n))
                .unwrap_or(false),
            Active::Boolean { field, expected } => {
                matches!(r.field(field), Some(Value::Bool(b)) if b == expected)
            }
            Active::DateRange { field, bounds } => record::present(r, field)
                .and_then(record::as_date)
                .map(|d| bounds.admits(d))
                .unwrap_or(false),
        }
    }
}

fn search_term(raw: &str) -> Option<String> {
    let t = raw.trim();
    (!t.is_empty()).then(|| t.to_lowercase())
}

/// Substring test on a scalar, or on any scalar element of an array.
fn text_contains(v: &Value, term: &str) -> bool {
    match v {
        Value::Array(items) => items.iter().any(|item| text_contains_scalar(item, term)),
        other => text_contains_scalar(other, term),
    }
}

fn text_contains_scalar(v: &Value, term: &str) -> bool {
    record::scalar_text(v)
        .map(|text| text.to_lowercase().contains(term))
        .unwrap_or(false)
}

fn numeric_bounds(value: &Value) -> Bounds<f64> {
    let bound = |k: &str| value.get(k).and_then(record::as_number);
    Bounds {
        min: bound("min"),
        max: bound("max"),
    }
}

fn date_bounds(value: &Value) -> Bounds<NaiveDate> {
    if value.is_string() {
        let day = record::as_date(value);
        return Bounds { min: day, max: day };
    }
    let bound = |keys: [&str; 2]| {
        keys.iter()
            .find_map(|k| value.get(*k).filter(|v| !v.is_null()))
            .and_then(record::as_date)
    };
    Bounds {
        min: bound(["from", "min"]),
        max: bound(["to", "max"]),
    }
}

/// Narrow `records` by the search term and every non-blank filter value.
///
/// Filters compose by AND. Keys in `values` that `spec` does not declare fall
/// back to strict equality on the field of the same name. The result borrows
/// from `records` and keeps their relative order.
pub fn apply<'r, R: Record>(
    spec: &FilterSpec,
    records: &'r [R],
    search: &str,
    values: &Map<String, Value>,
) -> Vec<&'r R> {
    let mut active = Vec::new();
    if let Some(term) = search_term(search) {
        active.push(Active::Contains {
            fields: &spec.search_fields,
            term,
        });
    }
    for def in &spec.filters {
        if let Some(a) = values.get(&def.key).and_then(|v| Active::compile(def, v)) {
            active.push(a);
        }
    }
    for (key, value) in values {
        if spec.get(key).is_none() && !record::is_blank(value) {
            active.push(Active::Strict { field: key, value });
        }
    }

    records
        .iter()
        .filter(|r| active.iter().all(|a| a.matches(*r)))
        .collect()
}
