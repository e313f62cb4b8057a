use crate::decl::DeclError;
use crate::filter::{FilterDef, FilterSpec};
use crate::stats::{FieldDef, GroupDef, PercentageDef, SummarySpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Search, filter and summary declarations for one kind of record screen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    #[serde(flatten)]
    pub filter: FilterSpec,
    #[serde(default)]
    pub summary: SummarySpec,
}

impl Profile {
    pub fn validate(&self) -> Result<(), DeclError> {
        if self.name.trim().is_empty() {
            return Err(DeclError::UnnamedProfile);
        }
        self.filter.validate()?;
        self.summary.validate()
    }
}

fn search(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| f.to_string()).collect()
}

fn students() -> Profile {
    Profile {
        name: "students".into(),
        filter: FilterSpec {
            search_fields: search(&["firstName", "lastName", "email", "studentId"]),
            filters: vec![
                FilterDef::equals("status", "status"),
                FilterDef::equals("program", "program"),
                FilterDef::equals("department", "department"),
                FilterDef::equals("year", "year"),
                FilterDef::range("gpa", "gpa"),
                FilterDef::boolean("financialAid", "financialInfo.financialAid"),
            ],
        },
        summary: SummarySpec {
            groups: vec![
                GroupDef::new("status", &["status"]),
                GroupDef::new("program", &["program"]),
                GroupDef::new("department", &["department.name", "department"]),
            ],
            averages: vec![FieldDef::new("gpa", "gpa")],
            distinct: vec![FieldDef::new("programs", "program")],
            sums: vec![],
            percentages: vec![
                PercentageDef::new("activeRate", "status", &["Active"]),
                PercentageDef::flag("financialAidRate", "financialInfo.financialAid"),
            ],
        },
    }
}

fn teachers() -> Profile {
    Profile {
        name: "teachers".into(),
        filter: FilterSpec {
            search_fields: search(&["firstName", "lastName", "email", "employeeId", "specialization"]),
            filters: vec![
                FilterDef::equals("department", "department"),
                FilterDef::equals("status", "status"),
                FilterDef::equals("designation", "designation"),
                FilterDef::range("experience", "experience"),
                FilterDef::contains("subject", &["specialization", "subjects"]),
            ],
        },
        summary: SummarySpec {
            groups: vec![
                GroupDef::new("department", &["department.name", "department"]),
                GroupDef::new("status", &["status"]),
                GroupDef::new("designation", &["designation"]),
            ],
            averages: vec![FieldDef::new("experience", "experience")],
            distinct: vec![FieldDef::new("departments", "department")],
            sums: vec![],
            percentages: vec![PercentageDef::new("activeRate", "status", &["Active"])],
        },
    }
}

fn classes() -> Profile {
    Profile {
        name: "classes".into(),
        filter: FilterSpec {
            search_fields: search(&["name", "code", "room", "course.name", "teacher.lastName"]),
            filters: vec![
                FilterDef::equals("course", "course"),
                FilterDef::equals("teacher", "teacher"),
                FilterDef::equals("semester", "semester"),
                FilterDef::equals("status", "status"),
                FilterDef::range("capacity", "capacity"),
            ],
        },
        summary: SummarySpec {
            groups: vec![
                GroupDef::new("status", &["status"]),
                GroupDef::new("course", &["course.name", "course"]),
                GroupDef::new("semester", &["semester"]),
            ],
            averages: vec![FieldDef::new("capacity", "capacity")],
            distinct: vec![FieldDef::new("teachers", "teacher")],
            sums: vec![
                FieldDef::new("enrolled", "students"),
                FieldDef::new("capacity", "capacity"),
            ],
            percentages: vec![PercentageDef::new("activeRate", "status", &["Active"])],
        },
    }
}

fn attendance() -> Profile {
    Profile {
        name: "attendance".into(),
        filter: FilterSpec {
            search_fields: search(&[
                "student.firstName",
                "student.lastName",
                "student.studentId",
                "class.name",
            ]),
            filters: vec![
                FilterDef::equals("class", "class"),
                FilterDef::equals("student", "student"),
                FilterDef::equals("status", "status"),
                FilterDef::date_range("date", "date"),
            ],
        },
        summary: SummarySpec {
            groups: vec![
                GroupDef::new("status", &["status"]),
                GroupDef::new("class", &["class.name", "class"]),
            ],
            averages: vec![],
            distinct: vec![
                FieldDef::new("students", "student"),
                FieldDef::new("days", "date"),
            ],
            sums: vec![],
            percentages: vec![
                PercentageDef::new("presentRate", "status", &["Present"]),
                PercentageDef::new("absentRate", "status", &["Absent"]),
                PercentageDef::new("lateRate", "status", &["Late"]),
            ],
        },
    }
}

fn grades() -> Profile {
    Profile {
        name: "grades".into(),
        filter: FilterSpec {
            search_fields: search(&[
                "student.firstName",
                "student.lastName",
                "course.name",
                "course.code",
            ]),
            filters: vec![
                FilterDef::equals("course", "course"),
                FilterDef::equals("student", "student"),
                FilterDef::equals("grade", "grade"),
                FilterDef::equals("semester", "semester"),
                FilterDef::range("score", "score"),
            ],
        },
        summary: SummarySpec {
            groups: vec![
                GroupDef::new("grade", &["grade"]),
                GroupDef::new("course", &["course.name", "course"]),
            ],
            averages: vec![FieldDef::new("score", "score")],
            distinct: vec![
                FieldDef::new("students", "student"),
                FieldDef::new("courses", "course"),
            ],
            sums: vec![],
            percentages: vec![PercentageDef::new("failRate", "grade", &["F"])],
        },
    }
}

/// Named profiles: the built-in screens plus any configured additions.
#[derive(Debug, Clone)]
pub struct ProfileSet {
    profiles: BTreeMap<String, Profile>,
}

impl ProfileSet {
    pub fn builtin() -> Self {
        let profiles = [students(), teachers(), classes(), attendance(), grades()]
            .into_iter()
            .map(|p| (p.name.clone(), p))
            .collect();
        Self { profiles }
    }

    /// Add or replace profiles. Invalid entries are returned, not applied.
    pub fn extend(&mut self, extra: Vec<Profile>) -> Vec<(String, DeclError)> {
        let mut rejected = Vec::new();
        for p in extra {
            match p.validate() {
                Ok(()) => {
                    self.profiles.insert(p.name.clone(), p);
                }
                Err(e) => rejected.push((p.name, e)),
            }
        }
        rejected
    }

    pub fn get(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.profiles.keys().map(|k| k.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{filter, stats};
    use serde_json::{json, Map, Value};

    #[test]
    fn builtin_profiles_are_valid() {
        let set = ProfileSet::builtin();
        assert_eq!(
            set.names(),
            vec!["attendance", "classes", "grades", "students", "teachers"]
        );
        for name in set.names() {
            let p = set.get(name).expect("profile");
            assert!(p.validate().is_ok(), "{} invalid", name);
        }
    }

    #[test]
    fn students_profile_filters_and_summarizes() {
        let set = ProfileSet::builtin();
        let p = set.get("students").expect("students");
        let records = vec![
            json!({ "_id": "1", "firstName": "Amy", "lastName": "Ng", "status": "Active", "gpa": 3.8,
                    "department": { "_id": "d1", "name": "Science" },
                    "financialInfo": { "financialAid": true } }),
            json!({ "_id": "2", "firstName": "Beth", "lastName": "Ode", "status": "Inactive", "gpa": 2.1,
                    "department": "d2", "financialInfo": { "financialAid": false } }),
            json!({ "_id": "3", "firstName": "Cid", "lastName": "Park", "status": "Active",
                    "department": { "_id": "d1", "name": "Science" } }),
        ];
        let mut values = Map::new();
        values.insert("department".into(), json!("d1"));
        values.insert("financialAid".into(), json!(""));
        let rows = filter::apply(&p.filter, &records, "", &values);
        assert_eq!(rows.len(), 2);

        let summary = stats::summarize(&p.summary, &records);
        assert_eq!(summary.group("department").and_then(|g| g.get("Science")), Some(&2));
        assert_eq!(summary.group("department").and_then(|g| g.get("d2")), Some(&1));
        assert!((summary.percentages["financialAidRate"] - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn attendance_profile_rates() {
        let set = ProfileSet::builtin();
        let p = set.get("attendance").expect("attendance");
        let records: Vec<Value> = ["Present", "Present", "Absent", "Late"]
            .iter()
            .enumerate()
            .map(|(i, s)| json!({ "student": format!("s{}", i % 2), "status": s, "date": "2024-03-01" }))
            .collect();
        let summary = stats::summarize(&p.summary, &records);
        assert_eq!(summary.percentages["presentRate"], 50.0);
        assert_eq!(summary.percentages["absentRate"], 25.0);
        assert_eq!(summary.distinct_count("students"), 2);
        assert_eq!(summary.distinct_count("days"), 1);
    }

    #[test]
    fn extend_replaces_and_rejects() {
        let mut set = ProfileSet::builtin();
        let custom = Profile {
            name: "grades".into(),
            filter: FilterSpec {
                search_fields: vec!["title".into()],
                filters: vec![],
            },
            summary: SummarySpec::default(),
        };
        let broken = Profile {
            name: "  ".into(),
            ..Profile::default()
        };
        let rejected = set.extend(vec![custom.clone(), broken]);
        assert_eq!(rejected.len(), 1);
        assert_eq!(set.get("grades"), Some(&custom));
        assert_eq!(set.len(), 5);
    }

    #[test]
    fn profile_json_shape_is_flat() {
        let raw = json!({
            "name": "library",
            "searchFields": ["title"],
            "filters": [{ "key": "genre", "kind": "equals", "field": "genre" }],
            "summary": { "groups": [{ "key": "genre", "paths": ["genre"] }] }
        });
        let p: Profile = serde_json::from_value(raw).expect("profile");
        assert_eq!(p.filter.filters.len(), 1);
        assert_eq!(p.summary.groups[0].key, "genre");
        assert!(p.validate().is_ok());
    }
}
