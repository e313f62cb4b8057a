use crate::decl::{self, DeclError};
use crate::record::{self, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Categorical breakdown. `paths` are tried in order; the first one that
/// yields a label wins (e.g. `department.name` before raw `department`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDef {
    pub key: String,
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub key: String,
    pub field: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentageDef {
    pub key: String,
    pub field: String,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarySpec {
    #[serde(default)]
    pub groups: Vec<GroupDef>,
    #[serde(default)]
    pub averages: Vec<FieldDef>,
    #[serde(default)]
    pub distinct: Vec<FieldDef>,
    #[serde(default)]
    pub sums: Vec<FieldDef>,
    #[serde(default)]
    pub percentages: Vec<PercentageDef>,
}

impl GroupDef {
    pub fn new(key: &str, paths: &[&str]) -> Self {
        Self {
            key: key.to_string(),
            paths: paths.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl FieldDef {
    pub fn new(key: &str, field: &str) -> Self {
        Self {
            key: key.to_string(),
            field: field.to_string(),
        }
    }
}

impl PercentageDef {
    pub fn new(key: &str, field: &str, values: &[&str]) -> Self {
        Self {
            key: key.to_string(),
            field: field.to_string(),
            values: values.iter().map(|v| Value::from(*v)).collect(),
        }
    }

    /// Share of records whose boolean field is `true`.
    pub fn flag(key: &str, field: &str) -> Self {
        Self {
            key: key.to_string(),
            field: field.to_string(),
            values: vec![Value::Bool(true)],
        }
    }
}

impl SummarySpec {
    pub fn validate(&self) -> Result<(), DeclError> {
        decl::check_unique("groups", self.groups.iter().map(|g| g.key.as_str()))?;
        decl::check_unique("averages", self.averages.iter().map(|f| f.key.as_str()))?;
        decl::check_unique("distinct", self.distinct.iter().map(|f| f.key.as_str()))?;
        decl::check_unique("sums", self.sums.iter().map(|f| f.key.as_str()))?;
        decl::check_unique("percentages", self.percentages.iter().map(|p| p.key.as_str()))?;
        for g in &self.groups {
            if g.paths.is_empty() {
                return Err(DeclError::EmptyPath {
                    what: "group",
                    key: g.key.clone(),
                });
            }
            for p in &g.paths {
                decl::check_path("group", &g.key, p)?;
            }
        }
        for f in self.averages.iter().chain(&self.distinct).chain(&self.sums) {
            decl::check_path("field", &f.key, &f.field)?;
        }
        for p in &self.percentages {
            decl::check_path("percentage", &p.key, &p.field)?;
            if p.values.is_empty() {
                return Err(DeclError::NoValues(p.key.clone()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub total: usize,
    pub groups: BTreeMap<String, BTreeMap<String, usize>>,
    pub averages: BTreeMap<String, f64>,
    pub distinct: BTreeMap<String, usize>,
    pub sums: BTreeMap<String, f64>,
    pub percentages: BTreeMap<String, f64>,
}

#[cfg(test)]
impl StatsSummary {
    pub fn average(&self, key: &str) -> f64 {
        self.averages.get(key).copied().unwrap_or(0.0)
    }

    pub fn group(&self, key: &str) -> Option<&BTreeMap<String, usize>> {
        self.groups.get(key)
    }

    pub fn distinct_count(&self, key: &str) -> usize {
        self.distinct.get(key).copied().unwrap_or(0)
    }
}

/// Bucket label for a grouped value. Populated references fall back to their id.
fn group_label(v: &Value) -> Option<String> {
    let label = match v {
        Value::Object(_) => record::record_id(v)?,
        other => record::scalar_text(other)?,
    };
    (!label.trim().is_empty()).then(|| label.into_owned())
}

/// Identity used for distinct counts. References count by their id, numbers
/// by value (`3 == 3.0`), and a string never collides with a number.
fn distinct_key(v: &Value) -> String {
    if let Some(id) = v.is_object().then(|| record::id_value(v)).flatten() {
        return distinct_key(id);
    }
    match v {
        Value::String(s) => format!("s:{s}"),
        Value::Number(n) => match n.as_f64() {
            Some(f) => format!("n:{}", f + 0.0),
            None => format!("n:{n}"),
        },
        other => format!("j:{other}"),
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n > 0 {
        sum / n as f64
    } else {
        0.0
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole > 0 {
        100.0 * part as f64 / whole as f64
    } else {
        0.0
    }
}

/// Aggregate `records` according to `spec`.
///
/// Callers pick the population: the full collection for dashboard totals or
/// the output of [`crate::filter::apply`] for the visible subset.
pub fn summarize<R: Record>(spec: &SummarySpec, records: &[R]) -> StatsSummary {
    let total = records.len();

    let groups = spec
        .groups
        .iter()
        .map(|g| {
            let mut counts: BTreeMap<String, usize> = BTreeMap::new();
            for r in records {
                let label = g
                    .paths
                    .iter()
                    .find_map(|p| record::present(r, p).and_then(group_label));
                // Records without the field are left out of this breakdown.
                if let Some(label) = label {
                    *counts.entry(label).or_insert(0) += 1;
                }
            }
            (g.key.clone(), counts)
        })
        .collect();

    let averages = spec
        .averages
        .iter()
        .map(|f| {
            let avg = mean(
                records
                    .iter()
                    .filter_map(|r| record::present(r, &f.field).and_then(record::as_number)),
            );
            (f.key.clone(), avg)
        })
        .collect();

    let distinct = spec
        .distinct
        .iter()
        .map(|f| {
            let seen: HashSet<String> = records
                .iter()
                .filter_map(|r| record::present(r, &f.field).map(distinct_key))
                .collect();
            (f.key.clone(), seen.len())
        })
        .collect();

    let sums = spec
        .sums
        .iter()
        .map(|f| {
            let sum: f64 = records
                .iter()
                .filter_map(|r| match record::present(r, &f.field)? {
                    Value::Array(items) => Some(items.len() as f64),
                    other => record::as_number(other),
                })
                .sum();
            (f.key.clone(), sum)
        })
        .collect();

    let percentages = spec
        .percentages
        .iter()
        .map(|p| {
            let hits = records
                .iter()
                .filter(|r| {
                    let field = r.field(&p.field);
                    p.values.iter().any(|v| record::matches_ref(field, v))
                })
                .count();
            (p.key.clone(), percent(hits, total))
        })
        .collect();

    StatsSummary {
        total,
        groups,
        averages,
        distinct,
        sums,
        percentages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{self, FilterDef, FilterSpec};
    use serde_json::{json, Map};

    fn spec() -> SummarySpec {
        SummarySpec {
            groups: vec![
                GroupDef::new("status", &["status"]),
                GroupDef::new("department", &["department.name", "department"]),
            ],
            averages: vec![FieldDef::new("gpa", "gpa")],
            distinct: vec![FieldDef::new("programs", "program")],
            sums: vec![FieldDef::new("enrolled", "students")],
            percentages: vec![PercentageDef::new("activeRate", "status", &["Active"])],
        }
    }

    #[test]
    fn empty_collection_yields_zeroes() {
        let out = summarize::<Value>(&spec(), &[]);
        assert_eq!(out.total, 0);
        assert_eq!(out.average("gpa"), 0.0);
        assert!(!out.average("gpa").is_nan());
        assert_eq!(out.percentages["activeRate"], 0.0);
        assert_eq!(out.distinct_count("programs"), 0);
        assert!(out.group("status").map(|g| g.is_empty()).unwrap_or(false));
    }

    #[test]
    fn missing_group_field_is_excluded_not_unknown() {
        let records = vec![json!({ "status": "Active" }), json!({ "status": "Active" }), json!({})];
        let out = summarize(&spec(), &records);
        let status = out.group("status").expect("status group");
        assert_eq!(status.len(), 1);
        assert_eq!(status.get("Active"), Some(&2));
        assert_eq!(out.total, 3);
    }

    #[test]
    fn group_prefers_populated_name_then_raw_id() {
        let records = vec![
            json!({ "department": { "_id": "d1", "name": "Science" } }),
            json!({ "department": "d2" }),
            json!({ "department": { "_id": "d3" } }),
            json!({ "department": null }),
        ];
        let out = summarize(&spec(), &records);
        let dept = out.group("department").expect("department group");
        assert_eq!(dept.get("Science"), Some(&1));
        assert_eq!(dept.get("d2"), Some(&1));
        assert_eq!(dept.get("d3"), Some(&1));
        assert_eq!(dept.values().sum::<usize>(), 3);
    }

    #[test]
    fn average_ignores_nulls_over_filtered_subset() {
        let records = vec![
            json!({ "name": "Amy", "status": "Active", "gpa": 3.8 }),
            json!({ "name": "Beth", "status": "Inactive", "gpa": 2.1 }),
            json!({ "name": "Cid", "status": "Active", "gpa": null }),
        ];
        let fspec = FilterSpec {
            search_fields: vec!["name".into()],
            filters: vec![FilterDef::equals("status", "status")],
        };
        let mut values = Map::new();
        values.insert("status".into(), json!("Active"));
        let active = filter::apply(&fspec, &records, "", &values);
        let out = summarize(&spec(), &active);
        assert_eq!(out.total, 2);
        assert!((out.average("gpa") - 3.8).abs() < 1e-9);

        let all = summarize(&spec(), &records);
        assert!((all.average("gpa") - 2.95).abs() < 1e-9);
        assert!((all.percentages["activeRate"] - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn distinct_and_sums() {
        let records = vec![
            json!({ "program": "BSc", "students": ["a", "b"] }),
            json!({ "program": "BSc", "students": 3 }),
            json!({ "program": "BA" }),
            json!({ "program": null }),
        ];
        let out = summarize(&spec(), &records);
        assert_eq!(out.distinct_count("programs"), 2);
        assert_eq!(out.sums["enrolled"], 5.0);
    }

    #[test]
    fn distinct_treats_raw_and_populated_refs_alike() {
        let spec = SummarySpec {
            distinct: vec![FieldDef::new("students", "student")],
            ..SummarySpec::default()
        };
        let records = vec![
            json!({ "student": { "_id": "s1", "firstName": "Amy" } }),
            json!({ "student": "s1" }),
            json!({ "student": "s2" }),
        ];
        assert_eq!(summarize(&spec, &records).distinct_count("students"), 2);
    }

    #[test]
    fn distinct_compares_numbers_by_value_and_keeps_kinds_apart() {
        let spec = SummarySpec {
            distinct: vec![FieldDef::new("years", "year")],
            ..SummarySpec::default()
        };
        let records = vec![
            json!({ "year": 3 }),
            json!({ "year": 3.0 }),
            json!({ "year": "3" }),
            json!({ "year": { "_id": 3 } }),
            json!({ "year": true }),
        ];
        assert_eq!(summarize(&spec, &records).distinct_count("years"), 3);
    }

    #[test]
    fn summarize_is_pure() {
        let records = vec![json!({ "status": "Active", "gpa": 3.0 })];
        let before = records.clone();
        let a = summarize(&spec(), &records);
        let b = summarize(&spec(), &records);
        assert_eq!(a, b);
        assert_eq!(records, before);
    }

    #[test]
    fn validate_rejects_pathless_group_and_valueless_percentage() {
        let bad_group = SummarySpec {
            groups: vec![GroupDef::new("x", &[])],
            ..SummarySpec::default()
        };
        assert!(bad_group.validate().is_err());
        let bad_pct = SummarySpec {
            percentages: vec![PercentageDef::new("rate", "status", &[])],
            ..SummarySpec::default()
        };
        assert!(matches!(bad_pct.validate(), Err(DeclError::NoValues(_))));
        assert!(spec().validate().is_ok());
    }
}
