//! File workflow handlers: add, get and root-hash seeding.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use cairn_core::{AddFileRequest, CacheRootHashRequest, GetFileRequest};
use tracing::{debug, info};

use crate::http::errors::ApiError;
use crate::models::{
    AddFileBody, AddFileResultView, CacheRootHashBody, GetFileBody, GetFileResultView,
    PollResponse,
};
use crate::state::ApiState;

pub(crate) async fn add_file(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<AddFileBody>,
) -> Result<Json<PollResponse<AddFileResultView>>, ApiError> {
    debug!(file_path = %body.file_path, "add file polled");
    let status = state
        .workflow
        .add_file(AddFileRequest::from(body))
        .await
        .map_err(|err| ApiError::unknown(&err))?;
    Ok(Json(status.into()))
}

pub(crate) async fn get_file(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<GetFileBody>,
) -> Result<Json<PollResponse<GetFileResultView>>, ApiError> {
    debug!(
        content_id = %body.content_id,
        output_path = %body.output_path,
        "get file polled"
    );
    let status = state
        .workflow
        .get_file(GetFileRequest::from(body))
        .await
        .map_err(|err| ApiError::unknown(&err))?;
    Ok(Json(status.into()))
}

pub(crate) async fn cache_root_hash(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<CacheRootHashBody>,
) -> Result<StatusCode, ApiError> {
    let request =
        CacheRootHashRequest::try_from(body).map_err(|err| ApiError::bad_request(err.detail()))?;
    info!(
        path = %request.path,
        tree_log2_size = request.tree_log2_size,
        "root hash pushed"
    );
    state.workflow.cache_root_hash(request);
    Ok(StatusCode::NO_CONTENT)
}
