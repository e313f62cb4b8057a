use crate::ipc::error::ok;
use crate::ipc::helpers::{self, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn profiles_get(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    // `profile` is accepted too, matching the other profile-taking methods.
    let name = match helpers::optional_str(params, "name")? {
        Some(name) => name,
        None => helpers::required_str(params, "profile")
            .map_err(|_| HandlerErr::bad_params("missing name"))?,
    };
    let profile = helpers::profile_named(state, name)?;
    Ok(json!({ "profile": profile }))
}

fn handle_profiles_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let profiles: Vec<serde_json::Value> = state
        .profiles
        .names()
        .into_iter()
        .filter_map(|name| state.profiles.get(name))
        .map(|p| {
            json!({
                "name": p.name,
                "searchFields": p.filter.search_fields,
                "filterKeys": p.filter.filters.iter().map(|f| f.key.as_str()).collect::<Vec<_>>(),
            })
        })
        .collect();
    ok(&req.id, json!({ "profiles": profiles }))
}

fn handle_profiles_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    match profiles_get(state, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "profiles.list" => Some(handle_profiles_list(state, req)),
        "profiles.get" => Some(handle_profiles_get(state, req)),
        _ => None,
    }
}
