use crate::decl;
use crate::filter::{self, FilterSpec};
use crate::ipc::error::ok;
use crate::ipc::helpers::{self, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::stats::{self, SummarySpec};
use crate::views::StatsScope;
use serde_json::json;
use std::borrow::Cow;

fn names_profile(params: &serde_json::Value) -> bool {
    params.get("profile").map(|v| !v.is_null()).unwrap_or(false)
}

/// Filter declarations come from a named profile or inline `filterSpec`.
fn filter_spec<'a>(
    state: &'a AppState,
    params: &serde_json::Value,
) -> Result<Cow<'a, FilterSpec>, HandlerErr> {
    if names_profile(params) {
        return Ok(Cow::Borrowed(&helpers::profile(state, params)?.filter));
    }
    let spec: FilterSpec = decl::parse("filterSpec", params.get("filterSpec"))?;
    spec.validate()?;
    Ok(Cow::Owned(spec))
}

fn summary_spec<'a>(
    state: &'a AppState,
    params: &serde_json::Value,
) -> Result<Cow<'a, SummarySpec>, HandlerErr> {
    if names_profile(params) {
        return Ok(Cow::Borrowed(&helpers::profile(state, params)?.summary));
    }
    let spec: SummarySpec = decl::parse("summary", params.get("summary"))?;
    spec.validate()?;
    Ok(Cow::Owned(spec))
}

fn records_apply(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let mut spec = filter_spec(state, params)?;
    // Top-level `searchFields` replaces the declared ones.
    if let Some(fields) = helpers::string_list(params, "searchFields")? {
        spec.to_mut().search_fields = fields;
        spec.validate()?;
    }
    let records = helpers::records_param(params, "records")?;
    let query = helpers::query_param(params)?;
    let rows = filter::apply(&spec, &records, &query.search_term, &query.filters);
    Ok(json!({
        "count": rows.len(),
        "records": rows,
    }))
}

fn records_summarize(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let spec = summary_spec(state, params)?;
    let records = helpers::records_param(params, "records")?;
    Ok(json!(stats::summarize(&spec, &records)))
}

fn records_query(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let profile = helpers::profile(state, params)?;
    let records = helpers::records_param(params, "records")?;
    let query = helpers::query_param(params)?;
    let scope = helpers::stats_scope(params, state.config.stats_scope)?;

    let rows = filter::apply(&profile.filter, &records, &query.search_term, &query.filters);
    let summary = match scope {
        StatsScope::All => stats::summarize(&profile.summary, &records),
        StatsScope::Filtered => stats::summarize(&profile.summary, &rows),
    };
    Ok(json!({
        "profile": profile.name,
        "total": records.len(),
        "filteredCount": rows.len(),
        "rows": rows,
        "statsScope": scope,
        "stats": summary,
    }))
}

fn handle_records_apply(state: &mut AppState, req: &Request) -> serde_json::Value {
    match records_apply(state, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_records_summarize(state: &mut AppState, req: &Request) -> serde_json::Value {
    match records_summarize(state, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_records_query(state: &mut AppState, req: &Request) -> serde_json::Value {
    match records_query(state, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "records.apply" => Some(handle_records_apply(state, req)),
        "records.summarize" => Some(handle_records_summarize(state, req)),
        "records.query" => Some(handle_records_query(state, req)),
        _ => None,
    }
}
