use serde::de::DeserializeOwned;
use serde_json::json;

/// Problems in caller-supplied filter, summary or profile declarations.
#[derive(Debug, thiserror::Error)]
pub enum DeclError {
    #[error("{what} is malformed: {source}")]
    Malformed {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("duplicate key {key:?} in {what}")]
    DuplicateKey { what: &'static str, key: String },
    #[error("{what} {key:?} has an empty field path")]
    EmptyPath { what: &'static str, key: String },
    #[error("contains filter {0:?} lists no fields")]
    NoFields(String),
    #[error("percentage {0:?} lists no values")]
    NoValues(String),
    #[error("profile name must not be empty")]
    UnnamedProfile,
}

impl DeclError {
    pub fn details(&self) -> serde_json::Value {
        match self {
            DeclError::Malformed { what, .. } => json!({ "declaration": what }),
            DeclError::DuplicateKey { what, key } | DeclError::EmptyPath { what, key } => {
                json!({ "declaration": what, "key": key })
            }
            DeclError::NoFields(key) | DeclError::NoValues(key) => json!({ "key": key }),
            DeclError::UnnamedProfile => json!({ "declaration": "profile" }),
        }
    }
}

/// Deserialize a declaration, treating `null` as its default.
pub fn parse<T>(what: &'static str, raw: Option<&serde_json::Value>) -> Result<T, DeclError>
where
    T: DeserializeOwned + Default,
{
    match raw {
        None | Some(serde_json::Value::Null) => Ok(T::default()),
        Some(v) => {
            serde_json::from_value(v.clone()).map_err(|source| DeclError::Malformed { what, source })
        }
    }
}

pub(crate) fn check_path(what: &'static str, key: &str, path: &str) -> Result<(), DeclError> {
    if path.trim().is_empty() || path.split('.').any(|s| s.is_empty()) {
        return Err(DeclError::EmptyPath {
            what,
            key: key.to_string(),
        });
    }
    Ok(())
}

pub(crate) fn check_unique<'a>(
    what: &'static str,
    keys: impl IntoIterator<Item = &'a str>,
) -> Result<(), DeclError> {
    let mut seen = std::collections::HashSet::new();
    for key in keys {
        if !seen.insert(key) {
            return Err(DeclError::DuplicateKey {
                what,
                key: key.to_string(),
            });
        }
    }
    Ok(())
}
