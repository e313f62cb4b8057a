use crate::filter;
use crate::profiles::Profile;
use crate::stats::{self, StatsSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsScope {
    /// Whole collection, for dashboard totals.
    #[default]
    All,
    /// Only the rows that pass the current query.
    Filtered,
}

impl StatsScope {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "all" => Some(StatsScope::All),
            "filtered" => Some(StatsScope::Filtered),
            _ => None,
        }
    }
}

/// Search box and filter bar contents of one screen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryState {
    #[serde(default)]
    pub search_term: String,
    #[serde(default)]
    pub filters: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewStatus {
    Loading,
    Ready,
    Error,
}

pub enum FetchOutcome {
    Records(Vec<Value>),
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    ViewClosed,
    StaleTicket,
}

impl DiscardReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DiscardReason::ViewClosed => "view_closed",
            DiscardReason::StaleTicket => "stale_ticket",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Delivery {
    Accepted,
    Discarded(DiscardReason),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ViewError {
    #[error("unknown view {0}")]
    UnknownView(Uuid),
    #[error("{got} records exceeds the per-view limit of {limit}")]
    TooManyRecords { got: usize, limit: usize },
}

#[derive(Debug)]
pub struct View {
    pub id: Uuid,
    pub profile: Profile,
    pub status: ViewStatus,
    pub error: Option<String>,
    pub records: Vec<Value>,
    pub revision: Option<String>,
    pub loaded_at: Option<DateTime<Utc>>,
    pub query: QueryState,
    ticket: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub view_id: String,
    pub profile: String,
    pub status: ViewStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub retryable: bool,
    pub fetch_pending: bool,
    pub revision: Option<String>,
    pub loaded_at: Option<String>,
    pub query: QueryState,
    pub total: usize,
    pub filtered_count: usize,
    pub rows: Vec<Value>,
    pub stats_scope: StatsScope,
    pub stats: StatsSummary,
}

impl View {
    pub fn snapshot(&self, scope: StatsScope) -> Snapshot {
        let rows = filter::apply(
            &self.profile.filter,
            &self.records,
            &self.query.search_term,
            &self.query.filters,
        );
        let stats = match scope {
            StatsScope::All => stats::summarize(&self.profile.summary, &self.records),
            StatsScope::Filtered => stats::summarize(&self.profile.summary, &rows),
        };
        Snapshot {
            view_id: self.id.to_string(),
            profile: self.profile.name.clone(),
            status: self.status.clone(),
            error: self.error.clone(),
            retryable: self.status == ViewStatus::Error,
            fetch_pending: self.outstanding_ticket().is_some(),
            revision: self.revision.clone(),
            loaded_at: self.loaded_at.map(|t| t.to_rfc3339()),
            query: self.query.clone(),
            total: self.records.len(),
            filtered_count: rows.len(),
            rows: rows.into_iter().cloned().collect(),
            stats_scope: scope,
            stats,
        }
    }

    pub fn outstanding_ticket(&self) -> Option<Uuid> {
        self.ticket
    }
}

/// SHA-256 of the collection as serialized JSON.
pub fn revision(records: &[Value]) -> String {
    let mut hasher = Sha256::new();
    for r in records {
        hasher.update(r.to_string().as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

/// Open screens keyed by view id. Each view owns the records fetched for it;
/// closing the view drops them and voids any fetch still in flight.
pub struct ViewRegistry {
    views: HashMap<Uuid, View>,
    max_records: usize,
}

impl ViewRegistry {
    pub fn new(max_records: usize) -> Self {
        Self {
            views: HashMap::new(),
            max_records,
        }
    }

    /// Register a view and issue the ticket its first fetch must present.
    pub fn open(&mut self, profile: Profile) -> (Uuid, Uuid) {
        let id = Uuid::new_v4();
        let ticket = Uuid::new_v4();
        tracing::info!(view = %id, profile = %profile.name, "view opened");
        self.views.insert(
            id,
            View {
                id,
                profile,
                status: ViewStatus::Loading,
                error: None,
                records: Vec::new(),
                revision: None,
                loaded_at: None,
                query: QueryState::default(),
                ticket: Some(ticket),
            },
        );
        (id, ticket)
    }

    /// Start a new fetch for the view; earlier tickets stop being accepted.
    pub fn refetch(&mut self, id: Uuid) -> Result<Uuid, ViewError> {
        let view = self.views.get_mut(&id).ok_or(ViewError::UnknownView(id))?;
        let ticket = Uuid::new_v4();
        view.ticket = Some(ticket);
        view.status = ViewStatus::Loading;
        view.error = None;
        tracing::info!(view = %id, "refetch requested");
        Ok(ticket)
    }

    pub fn deliver(
        &mut self,
        id: Uuid,
        ticket: Uuid,
        outcome: FetchOutcome,
    ) -> Result<Delivery, ViewError> {
        let Some(view) = self.views.get_mut(&id) else {
            tracing::warn!(view = %id, "fetch response for closed view discarded");
            return Ok(Delivery::Discarded(DiscardReason::ViewClosed));
        };
        if view.ticket != Some(ticket) {
            tracing::warn!(view = %id, ticket = %ticket, "stale fetch response discarded");
            return Ok(Delivery::Discarded(DiscardReason::StaleTicket));
        }
        match outcome {
            FetchOutcome::Records(records) => {
                if records.len() > self.max_records {
                    let e = ViewError::TooManyRecords {
                        got: records.len(),
                        limit: self.max_records,
                    };
                    tracing::warn!(view = %id, error = %e, "delivery rejected");
                    view.status = ViewStatus::Error;
                    view.error = Some(e.to_string());
                    view.ticket = None;
                    return Err(e);
                }
                view.revision = Some(revision(&records));
                view.records = records;
                view.loaded_at = Some(Utc::now());
                view.status = ViewStatus::Ready;
                view.error = None;
                tracing::info!(view = %id, count = view.records.len(), "records loaded");
            }
            FetchOutcome::Failed(message) => {
                tracing::warn!(view = %id, error = %message, "fetch failed");
                view.status = ViewStatus::Error;
                view.error = Some(message);
            }
        }
        view.ticket = None;
        Ok(Delivery::Accepted)
    }

    pub fn set_query(&mut self, id: Uuid, query: QueryState) -> Result<&View, ViewError> {
        let view = self.views.get_mut(&id).ok_or(ViewError::UnknownView(id))?;
        view.query = query;
        Ok(view)
    }

    pub fn get(&self, id: Uuid) -> Result<&View, ViewError> {
        self.views.get(&id).ok_or(ViewError::UnknownView(id))
    }

    pub fn close(&mut self, id: Uuid) -> bool {
        let closed = self.views.remove(&id).is_some();
        if closed {
            tracing::info!(view = %id, "view closed");
        }
        closed
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }
}
