//! Routes for embedded media helpers.

use axum::{
    Router,
    extract::Query,
    response::Json as ResponseJson,
    routing::get,
};
use serde::Deserialize;
use utils::{
    response::ApiResponse,
    youtube::{ThumbnailQuality, YoutubeVideo},
};

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct YoutubeQuery {
    pub url: String,
    #[serde(default)]
    pub quality: ThumbnailQuality,
}

/// Resolve a YouTube link to its video id, thumbnail and embed URL
pub async fn youtube_video(
    Query(query): Query<YoutubeQuery>,
) -> Result<ResponseJson<ApiResponse<YoutubeVideo>>, ApiError> {
    let video = YoutubeVideo::from_url(&query.url, query.quality)?;
    Ok(ResponseJson(ApiResponse::success(video)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/media/youtube", get(youtube_video))
}
