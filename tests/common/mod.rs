//! Shared helpers for integration tests: a fake GitHub tarball endpoint,
//! tarball fixtures and a proxy started on an ephemeral port.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::{Path as RoutePath, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tokio::net::TcpListener;

use gitpkg::{AppState, GitHubTarballSource, ProxyConfig, router};

pub const BAD_TOKEN: &str = "bad-token";
pub const NOT_FOUND_BODY: &str =
    r#"{"message":"Not Found","documentation_url":"https://docs.github.com/rest"}"#;
pub const BAD_CREDENTIALS_BODY: &str = r#"{"message":"Bad credentials"}"#;

/// What the fake provider saw for one request.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub path: String,
    pub authorization: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Default)]
struct UpstreamState {
    archives: HashMap<String, Vec<u8>>,
    seen: Mutex<Vec<SeenRequest>>,
}

pub struct MockUpstream {
    pub url: String,
    state: Arc<UpstreamState>,
}

impl MockUpstream {
    /// Serve `archives`, keyed by `owner/repo/revision`.
    pub async fn start(archives: Vec<(&str, Vec<u8>)>) -> Self {
        let state = Arc::new(UpstreamState {
            archives: archives
                .into_iter()
                .map(|(key, data)| (key.to_string(), data))
                .collect(),
            seen: Mutex::new(Vec::new()),
        });
        let app = Router::new()
            .route("/repos/{owner}/{repo}/tarball/{*revision}", get(tarball))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}"),
            state,
        }
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.state.seen.lock().unwrap().clone()
    }
}

async fn tarball(
    State(state): State<Arc<UpstreamState>>,
    RoutePath((owner, repo, revision)): RoutePath<(String, String, String)>,
    headers: HeaderMap,
) -> Response {
    let header_str = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let authorization = header_str(header::AUTHORIZATION);
    state.seen.lock().unwrap().push(SeenRequest {
        path: format!("{owner}/{repo}/{revision}"),
        authorization: authorization.clone(),
        user_agent: header_str(header::USER_AGENT),
    });

    if authorization.as_deref() == Some(&format!("Bearer {BAD_TOKEN}")[..]) {
        return (
            StatusCode::UNAUTHORIZED,
            [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
            BAD_CREDENTIALS_BODY,
        )
            .into_response();
    }

    match state.archives.get(&format!("{owner}/{repo}/{revision}")) {
        Some(data) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/x-gzip")],
            data.clone(),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
            NOT_FOUND_BODY,
        )
            .into_response(),
    }
}

/// Build a tarball shaped like GitHub's: a pax global header followed by
/// everything below one `top` folder, with directory entries for each parent.
pub fn github_tarball(top: &str, files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

    let comment = b"52 comment=0123456789abcdef0123456789abcdef01234567\n";
    let mut pax = tar::Header::new_ustar();
    pax.set_entry_type(tar::EntryType::XGlobalHeader);
    pax.set_mode(0o666);
    pax.set_size(comment.len() as u64);
    builder
        .append_data(&mut pax, "pax_global_header", &comment[..])
        .unwrap();

    let mut dirs = std::collections::BTreeSet::new();
    dirs.insert(format!("{top}/"));
    for (path, _) in files {
        let mut parent = Path::new(path).parent();
        while let Some(dir) = parent.filter(|d| !d.as_os_str().is_empty()) {
            dirs.insert(format!("{top}/{}/", dir.display()));
            parent = dir.parent();
        }
    }
    for dir in &dirs {
        let mut header = tar::Header::new_ustar();
        header.set_entry_type(tar::EntryType::Directory);
        header.set_mode(0o775);
        header.set_size(0);
        builder
            .append_data(&mut header, dir, std::io::empty())
            .unwrap();
    }

    for (path, data) in files {
        let mut header = tar::Header::new_ustar();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_mode(0o664);
        header.set_size(data.len() as u64);
        builder
            .append_data(&mut header, format!("{top}/{path}"), *data)
            .unwrap();
    }

    builder.into_inner().unwrap().finish().unwrap()
}

/// Regular files of a served `.tgz`, keyed by path with the leading `./`
/// removed. Panics if any entry name lacks the `./` prefix.
pub fn package_files(archive: &[u8]) -> BTreeMap<String, Vec<u8>> {
    let mut archive = tar::Archive::new(GzDecoder::new(archive));
    let mut files = BTreeMap::new();
    for entry in archive.entries().unwrap() {
        let mut entry = entry.unwrap();
        let name = entry.path().unwrap().to_string_lossy().into_owned();
        let relative = name
            .strip_prefix("./")
            .unwrap_or_else(|| panic!("entry {name} is not rooted at ./"))
            .to_string();
        if entry.header().entry_type() == tar::EntryType::Regular {
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();
            files.insert(relative, data);
        }
    }
    files
}

/// Start the proxy against `upstream_url`, creating workspaces in `work_dir`.
pub async fn start_proxy(upstream_url: &str, work_dir: &Path) -> String {
    let config = ProxyConfig {
        upstream_url: upstream_url.to_string(),
        work_dir: work_dir.to_path_buf(),
        ..ProxyConfig::default()
    };
    let source = Arc::new(GitHubTarballSource::new(&config).unwrap());
    let app = router(AppState::new(config, source));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// True once no workspace is left below `work_dir`.
pub fn no_workspaces_left(work_dir: &Path) -> bool {
    std::fs::read_dir(work_dir).unwrap().next().is_none()
}
