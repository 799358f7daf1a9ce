//! Routes for the featured content limit.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use serde::Deserialize;
use services::services::{
    document_store::{CandidateQuery, FeaturedCandidate},
    featured_limit::{DemotionResult, sort_oldest_first},
};
use tracing::info;
use utils::{
    pagination::{Page, PageRequest, paginate},
    response::ApiResponse,
};

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct EnforceQuery {
    pub max_featured: Option<usize>,
}

/// Run enforcement now for a document that was just featured
pub async fn enforce_featured_limit(
    State(state): State<AppState>,
    Path((collection, document_id)): Path<(String, String)>,
    Query(query): Query<EnforceQuery>,
) -> Result<ResponseJson<ApiResponse<DemotionResult>>, ApiError> {
    let max_featured = query
        .max_featured
        .unwrap_or_else(|| state.caps.for_collection(&collection));

    let result = state
        .limiter
        .enforce_limit(&collection, &document_id, max_featured)
        .await?;

    info!(
        collection = %collection,
        document_id = %document_id,
        demoted = ?result.demoted,
        "Manual featured limit enforcement"
    );

    Ok(ResponseJson(ApiResponse::success(result)))
}

/// Featured documents of a collection, oldest first
pub async fn list_featured(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(page): Query<PageRequest>,
) -> Result<ResponseJson<ApiResponse<Page<FeaturedCandidate>>>, ApiError> {
    let mut featured = state
        .store()
        .query_featured(&CandidateQuery::featured_in(collection))
        .await?;
    sort_oldest_first(&mut featured);
    Ok(ResponseJson(ApiResponse::success(paginate(featured, page))))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/collections/{collection}/featured", get(list_featured))
        .route(
            "/collections/{collection}/featured/{document_id}/enforce",
            post(enforce_featured_limit),
        )
}
