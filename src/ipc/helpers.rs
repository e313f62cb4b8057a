use crate::decl::DeclError;
use crate::ipc::error::err;
use crate::ipc::types::AppState;
use crate::profiles::Profile;
use crate::views::{QueryState, StatsScope, ViewError};
use serde_json::{Map, Value};
use uuid::Uuid;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl HandlerErr {
    pub fn bad_params(message: impl Into<String>) -> Self {
        Self {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<DeclError> for HandlerErr {
    fn from(e: DeclError) -> Self {
        Self {
            code: "bad_params",
            message: e.to_string(),
            details: Some(e.details()),
        }
    }
}

impl From<ViewError> for HandlerErr {
    fn from(e: ViewError) -> Self {
        let code = match e {
            ViewError::UnknownView(_) => "unknown_view",
            ViewError::TooManyRecords { .. } => "bad_params",
        };
        Self {
            code,
            message: e.to_string(),
            details: None,
        }
    }
}

pub fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn optional_str<'a>(params: &'a Value, key: &str) -> Result<Option<&'a str>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be string or null", key))),
    }
}

/// Optional array of strings; null or absent is `None`.
pub fn string_list(params: &Value, key: &str) -> Result<Option<Vec<String>>, HandlerErr> {
    let items = match params.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(HandlerErr::bad_params(format!("{} must be an array of strings", key))),
    };
    items
        .iter()
        .map(|v| {
            v.as_str()
                .map(|s| s.to_string())
                .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an array of strings", key)))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

pub fn records_param(params: &Value, key: &str) -> Result<Vec<Value>, HandlerErr> {
    match params.get(key) {
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be an array", key))),
        None => Err(HandlerErr::bad_params(format!("missing {}", key))),
    }
}

/// Filter values; absent or null means no filters.
pub fn filters_param(params: &Value) -> Result<Map<String, Value>, HandlerErr> {
    match params.get("filters") {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(m)) => Ok(m.clone()),
        Some(_) => Err(HandlerErr::bad_params("filters must be an object")),
    }
}

pub fn query_param(params: &Value) -> Result<QueryState, HandlerErr> {
    Ok(QueryState {
        search_term: optional_str(params, "searchTerm")?.unwrap_or("").to_string(),
        filters: filters_param(params)?,
    })
}

pub fn uuid_param(params: &Value, key: &str) -> Result<Uuid, HandlerErr> {
    let raw = required_str(params, key)?;
    Uuid::parse_str(raw.trim())
        .map_err(|_| HandlerErr::bad_params(format!("{} must be a uuid", key)))
}

pub fn stats_scope(params: &Value, default: StatsScope) -> Result<StatsScope, HandlerErr> {
    match optional_str(params, "statsScope")? {
        None => Ok(default),
        Some(raw) => StatsScope::parse(raw)
            .ok_or_else(|| HandlerErr::bad_params("statsScope must be one of: all, filtered")),
    }
}

pub fn profile<'a>(state: &'a AppState, params: &Value) -> Result<&'a Profile, HandlerErr> {
    profile_named(state, required_str(params, "profile")?)
}

pub fn profile_named<'a>(state: &'a AppState, name: &str) -> Result<&'a Profile, HandlerErr> {
    state.profiles.get(name).ok_or_else(|| HandlerErr {
        code: "unknown_profile",
        message: format!("unknown profile: {}", name),
        details: Some(serde_json::json!({ "known": state.profiles.names() })),
    })
}
