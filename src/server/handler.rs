use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::Instrument;

use super::AppState;
use super::pipeline;
use crate::error::ProxyError;
use crate::package::PackageRequest;

#[derive(Debug, Default, Deserialize)]
pub struct PackageQuery {
    /// Branch, tag or commit.
    #[serde(rename = "ref")]
    pub revision: Option<String>,
    pub token: Option<String>,
}

/// `GET /{owner}/{repo}/{subpath...}?ref=..&token=..`
pub async fn package(
    State(state): State<AppState>,
    Path((owner, repo, subpath)): Path<(String, String, String)>,
    Query(query): Query<PackageQuery>,
) -> Response {
    let request = match PackageRequest::new(&owner, &repo, &subpath, query.revision, query.token)
    {
        Ok(request) => request,
        Err(err) => return err.into_response(),
    };

    let span = tracing::info_span!(
        "package",
        owner = %request.owner,
        repo = %request.repo,
        subpath = %request.subpath,
        revision = %request.revision,
    );
    pipeline::build_package(&state, request)
        .instrument(span)
        .await
}

/// `GET /{owner}/{repo}`: serving a whole repository is not supported.
pub async fn missing_subpath(Path((owner, repo)): Path<(String, String)>) -> Response {
    ProxyError::InvalidRequest(format!(
        "a subdirectory path is required, e.g. /{owner}/{repo}/packages/foo"
    ))
    .into_response()
}

pub async fn healthz() -> &'static str {
    "ok"
}
