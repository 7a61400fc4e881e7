use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Json as RequestJson,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::logic::{
    self, AlternativeSlot, ArbitrationError, ConflictActionOutcome, Decision, DetectionReport, GroupActionOutcome,
    GroupDetail, NeighborPot,
};
use crate::model::{
    BidDecision, ConflictDocument, ConflictFilter, ConflictGroup, ConflictKind, ConflictStatus, FeeDecision,
    GroupFilter, GroupStatus, Id, Page, Paged, RenunciationDecision, Request, UserContext,
};
use crate::store::Store;

pub type AppState<S> = Arc<S>;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
        }
    }
}

/// Map an arbitration failure onto its HTTP status
pub fn error_response(error: ArbitrationError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &error {
        ArbitrationError::Precondition(_) | ArbitrationError::PhaseNotAccepted { .. } => StatusCode::CONFLICT,
        ArbitrationError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ArbitrationError::NotFound { .. } => StatusCode::NOT_FOUND,
        ArbitrationError::DataIntegrity(_) | ArbitrationError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        log::error!("{}", error);
    } else {
        log::warn!("{}", error);
    }
    (status, Json(ErrorResponse::new(&error.to_string())))
}

// Query structs stay flat: serde_urlencoded cannot parse numbers through #[serde(flatten)]
#[derive(Debug, Default, Deserialize)]
pub struct ConflictQuery {
    pub kind: Option<ConflictKind>,
    pub status: Option<ConflictStatus>,
    pub pot_id: Option<Id>,
    pub slot_id: Option<Id>,
    pub request_id: Option<Id>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl ConflictQuery {
    fn into_parts(self) -> (ConflictFilter, Page) {
        let page = page_from(self.offset, self.limit);
        let filter = ConflictFilter {
            kind: self.kind,
            status: self.status,
            pot_id: self.pot_id,
            slot_id: self.slot_id,
            request_id: self.request_id,
        };
        (filter, page)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct GroupQuery {
    pub kind: Option<ConflictKind>,
    pub status: Option<GroupStatus>,
    pub request_id: Option<Id>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl GroupQuery {
    fn into_parts(self) -> (GroupFilter, Page) {
        let page = page_from(self.offset, self.limit);
        let filter = GroupFilter {
            kind: self.kind,
            status: self.status,
            request_id: self.request_id,
        };
        (filter, page)
    }
}

fn page_from(offset: Option<usize>, limit: Option<usize>) -> Page {
    let default = Page::default();
    Page {
        offset: offset.unwrap_or(default.offset),
        limit: limit.unwrap_or(default.limit),
    }
}

// Detection

pub async fn detect_pot_conflicts<S: Store>(State(store): State<AppState<S>>) -> ApiResult<DetectionReport> {
    logic::detect_pot_conflicts(store.as_ref())
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn detect_slot_conflicts<S: Store>(State(store): State<AppState<S>>) -> ApiResult<DetectionReport> {
    logic::detect_slot_conflicts(store.as_ref())
        .await
        .map(Json)
        .map_err(error_response)
}

// Conflicts

pub async fn list_conflicts<S: Store>(
    State(store): State<AppState<S>>,
    Query(query): Query<ConflictQuery>,
) -> ApiResult<Paged<ConflictDocument>> {
    let (filter, page) = query.into_parts();
    logic::list_conflicts(store.as_ref(), &filter, page)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn get_conflict<S: Store>(
    State(store): State<AppState<S>>,
    Path(conflict_id): Path<Id>,
) -> ApiResult<ConflictDocument> {
    logic::get_conflict(store.as_ref(), &conflict_id)
        .await
        .map(Json)
        .map_err(error_response)
}

async fn decide_conflict<S: Store>(
    store: &S,
    conflict_id: &Id,
    decision: Decision,
    user: &UserContext,
) -> ApiResult<ConflictActionOutcome> {
    logic::apply_to_conflict(store, conflict_id, &decision, user)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn submit_renunciation<S: Store>(
    State(store): State<AppState<S>>,
    Path(conflict_id): Path<Id>,
    user: UserContext,
    RequestJson(decision): RequestJson<RenunciationDecision>,
) -> ApiResult<ConflictActionOutcome> {
    decide_conflict(store.as_ref(), &conflict_id, Decision::Renunciation(decision), &user).await
}

pub async fn submit_fee_decision<S: Store>(
    State(store): State<AppState<S>>,
    Path(conflict_id): Path<Id>,
    user: UserContext,
    RequestJson(decision): RequestJson<FeeDecision>,
) -> ApiResult<ConflictActionOutcome> {
    decide_conflict(store.as_ref(), &conflict_id, Decision::FeeComparison(decision), &user).await
}

pub async fn submit_bids<S: Store>(
    State(store): State<AppState<S>>,
    Path(conflict_id): Path<Id>,
    user: UserContext,
    RequestJson(decision): RequestJson<BidDecision>,
) -> ApiResult<ConflictActionOutcome> {
    decide_conflict(store.as_ref(), &conflict_id, Decision::HighestPrice(decision), &user).await
}

// Groups

pub async fn list_groups<S: Store>(
    State(store): State<AppState<S>>,
    Query(query): Query<GroupQuery>,
) -> ApiResult<Paged<ConflictGroup>> {
    let (filter, page) = query.into_parts();
    logic::list_groups(store.as_ref(), &filter, page)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn get_group<S: Store>(
    State(store): State<AppState<S>>,
    Path(group_id): Path<Id>,
) -> ApiResult<GroupDetail> {
    logic::get_group_detail(store.as_ref(), &group_id)
        .await
        .map(Json)
        .map_err(error_response)
}

async fn decide_group<S: Store>(
    store: &S,
    group_id: &Id,
    decision: Decision,
    user: &UserContext,
) -> ApiResult<GroupActionOutcome> {
    logic::apply_to_group(store, group_id, &decision, user)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn submit_group_renunciation<S: Store>(
    State(store): State<AppState<S>>,
    Path(group_id): Path<Id>,
    user: UserContext,
    RequestJson(decision): RequestJson<RenunciationDecision>,
) -> ApiResult<GroupActionOutcome> {
    decide_group(store.as_ref(), &group_id, Decision::Renunciation(decision), &user).await
}

pub async fn submit_group_fee_decision<S: Store>(
    State(store): State<AppState<S>>,
    Path(group_id): Path<Id>,
    user: UserContext,
    RequestJson(decision): RequestJson<FeeDecision>,
) -> ApiResult<GroupActionOutcome> {
    decide_group(store.as_ref(), &group_id, Decision::FeeComparison(decision), &user).await
}

pub async fn submit_group_bids<S: Store>(
    State(store): State<AppState<S>>,
    Path(group_id): Path<Id>,
    user: UserContext,
    RequestJson(decision): RequestJson<BidDecision>,
) -> ApiResult<GroupActionOutcome> {
    decide_group(store.as_ref(), &group_id, Decision::HighestPrice(decision), &user).await
}

pub async fn reset_group<S: Store>(
    State(store): State<AppState<S>>,
    Path(group_id): Path<Id>,
    user: UserContext,
) -> ApiResult<GroupActionOutcome> {
    logic::reset_group(store.as_ref(), &group_id, &user)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn get_neighbor_pots<S: Store>(
    State(store): State<AppState<S>>,
    Path(group_id): Path<Id>,
) -> ApiResult<Vec<NeighborPot>> {
    logic::neighbor_pots(store.as_ref(), &group_id)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn get_alternative_slots<S: Store>(
    State(store): State<AppState<S>>,
    Path(group_id): Path<Id>,
) -> ApiResult<Vec<AlternativeSlot>> {
    logic::alternative_slots(store.as_ref(), &group_id)
        .await
        .map(Json)
        .map_err(error_response)
}

// Requests

pub async fn get_request<S: Store>(
    State(store): State<AppState<S>>,
    Path(request_id): Path<Id>,
) -> ApiResult<Request> {
    logic::get_request(store.as_ref(), &request_id)
        .await
        .map(Json)
        .map_err(error_response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResolutionPhase;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (ArbitrationError::Precondition("open pots".into()), StatusCode::CONFLICT),
            (
                ArbitrationError::PhaseNotAccepted {
                    conflict_id: "k".into(),
                    phase: ResolutionPhase::HighestPrice,
                    status: "offen".into(),
                },
                StatusCode::CONFLICT,
            ),
            (ArbitrationError::InvalidInput("ranking".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (ArbitrationError::not_found("Conflict", "k"), StatusCode::NOT_FOUND),
            (ArbitrationError::DataIntegrity("dangling".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, expected) in cases {
            let (status, Json(body)) = error_response(error);
            assert_eq!(status, expected);
            assert!(!body.error.is_empty());
        }
    }

    #[test]
    fn test_query_defaults_to_first_page() {
        let (filter, page) = ConflictQuery::default().into_parts();
        assert_eq!(filter, ConflictFilter::default());
        assert_eq!(page, Page::default());

        let (_, page) = GroupQuery {
            offset: Some(10),
            ..Default::default()
        }
        .into_parts();
        assert_eq!(page.offset, 10);
        assert_eq!(page.limit, Page::default().limit);
    }
}
