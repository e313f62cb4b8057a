use crate::ipc::error::ok;
use crate::ipc::helpers::{self, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::views::{Delivery, FetchOutcome};
use serde_json::json;

fn view_open(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let profile = helpers::profile(state, params)?.clone();
    let (view_id, ticket) = state.views.open(profile);
    Ok(json!({
        "viewId": view_id.to_string(),
        "fetchTicket": ticket.to_string(),
        "status": "loading",
    }))
}

fn view_deliver(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let view_id = helpers::uuid_param(params, "viewId")?;
    let ticket = helpers::uuid_param(params, "fetchTicket")?;
    let scope = helpers::stats_scope(params, state.config.stats_scope)?;
    let outcome = match params.get("error") {
        Some(e) if !e.is_null() => {
            let message = e
                .as_str()
                .map(|s| s.to_string())
                .or_else(|| e.get("message").and_then(|m| m.as_str()).map(|s| s.to_string()))
                .unwrap_or_else(|| e.to_string());
            FetchOutcome::Failed(message)
        }
        _ => FetchOutcome::Records(helpers::records_param(params, "records")?),
    };

    match state.views.deliver(view_id, ticket, outcome)? {
        Delivery::Discarded(reason) => Ok(json!({
            "discarded": true,
            "reason": reason.as_str(),
        })),
        Delivery::Accepted => {
            let snapshot = state.views.get(view_id)?.snapshot(scope);
            Ok(json!({
                "discarded": false,
                "snapshot": snapshot,
            }))
        }
    }
}

fn view_refetch(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let view_id = helpers::uuid_param(params, "viewId")?;
    let ticket = state.views.refetch(view_id)?;
    Ok(json!({
        "viewId": view_id.to_string(),
        "fetchTicket": ticket.to_string(),
        "status": "loading",
    }))
}

fn view_set_query(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let view_id = helpers::uuid_param(params, "viewId")?;
    let query = helpers::query_param(params)?;
    let scope = helpers::stats_scope(params, state.config.stats_scope)?;
    let view = state.views.set_query(view_id, query)?;
    Ok(json!(view.snapshot(scope)))
}

fn view_snapshot(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let view_id = helpers::uuid_param(params, "viewId")?;
    let scope = helpers::stats_scope(params, state.config.stats_scope)?;
    Ok(json!(state.views.get(view_id)?.snapshot(scope)))
}

fn view_close(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let view_id = helpers::uuid_param(params, "viewId")?;
    Ok(json!({ "closed": state.views.close(view_id) }))
}

type ViewOp = fn(&mut AppState, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>;

fn run(state: &mut AppState, req: &Request, f: ViewOp) -> serde_json::Value {
    match f(state, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f: ViewOp = match req.method.as_str() {
        "view.open" => view_open,
        "view.deliver" => view_deliver,
        "view.refetch" => view_refetch,
        "view.setQuery" => view_set_query,
        "view.snapshot" => view_snapshot,
        "view.close" => view_close,
        _ => return None,
    };
    Some(run(state, req, f))
}
