//! The per-request build pipeline.
//!
//! ```text
//! acquire workspace -> fetch -> extract -> validate -> pack/stream -> release
//! ```
//!
//! Every stage runs sequentially on behalf of one request. Blocking archive
//! work runs on the blocking pool; the packer feeds the response body through
//! a bounded channel so a slow client stalls packing instead of buffering the
//! archive. Failures before the response starts are turned into a status code
//! by [`ProxyError`]; failures after that abort the body. The workspace is
//! released exactly once on every path, including when the request future is
//! dropped half way: whichever task is working in the tree owns it.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::time::Instant;

use anyhow::Context;
use axum::body::{Body, Bytes};
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use tokio::sync::mpsc;
use tracing::{Instrument, Span};

use super::AppState;
use crate::error::{ProxyError, ProxyResult};
use crate::io::{ChannelWriter, spool_to_file};
use crate::package::{self, PackageRequest, PackageRoot};
use crate::tarball::{ExtractSummary, Subpath, TarExtractor, TarPacker};
use crate::workspace::Workspace;

/// Size of each chunk handed to the response body.
const CHUNK_SIZE: usize = 64 * 1024;
/// Chunks buffered between the packer and the client.
const STREAM_BUFFER_CHUNKS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Request,
    Workspace,
    Fetching,
    Extracting,
    Validating,
    Packing,
    Streaming,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Request => "request",
            Stage::Workspace => "workspace",
            Stage::Fetching => "fetching",
            Stage::Extracting => "extracting",
            Stage::Validating => "validating",
            Stage::Packing => "packing",
            Stage::Streaming => "streaming",
        })
    }
}

/// A failure tagged with the stage it happened in.
#[derive(Debug)]
pub struct StageError {
    pub stage: Stage,
    pub error: ProxyError,
}

trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, StageError>;
}

impl<T, E: Into<ProxyError>> AtStage<T> for Result<T, E> {
    fn at(self, stage: Stage) -> Result<T, StageError> {
        self.map_err(|err| StageError {
            stage,
            error: err.into(),
        })
    }
}

impl IntoResponse for StageError {
    fn into_response(self) -> Response {
        let stage = self.stage;
        match &self.error {
            ProxyError::Upstream { status, .. } => {
                tracing::debug!(%stage, %status, "forwarding upstream error");
            }
            ProxyError::Internal(err) => {
                tracing::error!(%stage, error = %format!("{err:#}"), "package build failed");
            }
            other => {
                tracing::info!(%stage, error = %other, "package request rejected");
            }
        }
        self.error.into_response()
    }
}

/// Run the whole pipeline for `request`.
pub async fn build_package(state: &AppState, request: PackageRequest) -> Response {
    let started = Instant::now();
    tracing::info!("building package");

    let disposition = match content_disposition(&request).at(Stage::Request) {
        Ok(value) => value,
        Err(failure) => return failure.into_response(),
    };

    let workspace = match Workspace::acquire(&state.config.work_dir).at(Stage::Workspace) {
        Ok(workspace) => workspace,
        Err(failure) => return failure.into_response(),
    };

    // If this future is dropped the task still runs to completion and drops
    // the workspace it owns.
    let task = tokio::spawn(prepare(state.clone(), request, workspace).instrument(Span::current()));
    let prepared = task
        .await
        .context("package preparation task failed")
        .at(Stage::Workspace)
        .and_then(|prepared| prepared);

    match prepared {
        Ok((workspace, root)) => stream_package(root, workspace, disposition, started),
        Err(failure) => failure.into_response(),
    }
}

/// Fetch, extract and validate into `workspace`, handing it back on success
/// and releasing it on failure.
async fn prepare(
    state: AppState,
    request: PackageRequest,
    workspace: Workspace,
) -> Result<(Workspace, PackageRoot), StageError> {
    if let Err(failure) = download(&state, &request, &workspace).await {
        workspace.release();
        return Err(failure);
    }

    let workspace = extract(&state, &request, workspace).await?;

    match package::validate(workspace.extract_dir(), &request.subpath)
        .await
        .at(Stage::Validating)
    {
        Ok(root) => Ok((workspace, root)),
        Err(failure) => {
            workspace.release();
            Err(failure)
        }
    }
}

async fn download(
    state: &AppState,
    request: &PackageRequest,
    workspace: &Workspace,
) -> Result<(), StageError> {
    let archive = state
        .source
        .fetch(
            &request.owner,
            &request.repo,
            &request.revision,
            &request.credential,
        )
        .await
        .at(Stage::Fetching)?;
    let downloaded = spool_to_file(
        archive,
        workspace.archive_path(),
        state.config.max_archive_size,
    )
    .await
    .at(Stage::Fetching)?;
    tracing::debug!(bytes = downloaded, "tarball downloaded");
    Ok(())
}

/// Extract the spooled tarball on the blocking pool. The blocking task takes
/// the workspace with it and returns it when done.
async fn extract(
    state: &AppState,
    request: &PackageRequest,
    workspace: Workspace,
) -> Result<Workspace, StageError> {
    let subpath = request.subpath.clone();
    let max_bytes = state.config.max_extracted_size;
    let span = Span::current();

    let (workspace, extracted) = tokio::task::spawn_blocking(move || {
        let _entered = span.enter();
        let extracted = extract_archive(&workspace, &subpath, max_bytes);
        (workspace, extracted)
    })
    .await
    .context("extraction task failed")
    .at(Stage::Extracting)?;

    match extracted.at(Stage::Extracting) {
        Ok(summary) => {
            tracing::debug!(
                files = summary.files,
                directories = summary.directories,
                skipped = summary.skipped,
                bytes = summary.bytes,
                "subdirectory extracted"
            );
            Ok(workspace)
        }
        Err(failure) => {
            workspace.release();
            Err(failure)
        }
    }
}

fn extract_archive(
    workspace: &Workspace,
    subpath: &Subpath,
    max_bytes: u64,
) -> ProxyResult<ExtractSummary> {
    let archive_path = workspace.archive_path();
    let file = File::open(archive_path)
        .with_context(|| format!("failed to open {}", archive_path.display()))?;
    TarExtractor::new(subpath, max_bytes)
        .extract_to_dir(BufReader::new(file), workspace.extract_dir())
}

fn content_disposition(request: &PackageRequest) -> anyhow::Result<HeaderValue> {
    HeaderValue::from_str(&format!("attachment; filename=\"{}\"", request.file_name()))
        .context("invalid download file name")
}

/// Start packing `root` on the blocking pool and return a response streaming
/// the result. `workspace` is released by the packing task.
fn stream_package(
    root: PackageRoot,
    workspace: Workspace,
    disposition: HeaderValue,
    started: Instant,
) -> Response {
    let (tx, mut rx) = mpsc::channel::<std::io::Result<Bytes>>(STREAM_BUFFER_CHUNKS);
    let span = Span::current();

    tokio::task::spawn_blocking(move || {
        let _entered = span.enter();
        let abort_tx = tx.clone();

        let writer = BufWriter::with_capacity(CHUNK_SIZE, ChannelWriter::new(tx));
        let result = TarPacker::new(root.path())
            .pack_into(writer)
            .and_then(|writer| writer.into_inner().map_err(|err| err.into_error().into()));

        let channel = match result {
            Ok(channel) => {
                tracing::info!(
                    bytes = channel.sent(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "package streamed"
                );
                Some(channel)
            }
            Err(_) if abort_tx.is_closed() => {
                tracing::info!(stage = %Stage::Streaming, "client went away, stream abandoned");
                None
            }
            Err(err) => {
                tracing::error!(
                    stage = %Stage::Packing,
                    error = %format!("{err:#}"),
                    "package stream failed"
                );
                let _ = abort_tx.blocking_send(Err(std::io::Error::other("package stream failed")));
                None
            }
        };

        // The body ends when the last sender is dropped, so a client that has
        // read to the end never observes the workspace.
        workspace.release();
        drop(channel);
        drop(abort_tx);
    });

    let body = Body::from_stream(futures::stream::poll_fn(move |cx| rx.poll_recv(cx)));
    let mut response = Response::new(body);
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/gzip"),
    );
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    response
}
