//! Request failure taxonomy and its mapping onto HTTP responses.

use axum::body::{Body, Bytes};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};

pub type ProxyResult<T> = Result<T, ProxyError>;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The hosting provider refused the archive request. Forwarded verbatim.
    #[error("upstream returned {status}")]
    Upstream {
        status: StatusCode,
        content_type: Option<HeaderValue>,
        body: Bytes,
    },

    #[error("{0}")]
    InvalidRequest(String),

    #[error(
        "Subdir '{subdir}' extracted but no package.json found. npm expects a package.json at the package root."
    )]
    MissingManifest { subdir: String },

    #[error("{what} exceeds the configured limit of {limit} bytes")]
    TooLarge { what: &'static str, limit: u64 },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Upstream { status, .. } => *status,
            ProxyError::InvalidRequest(_)
            | ProxyError::MissingManifest { .. }
            | ProxyError::TooLarge { .. } => StatusCode::BAD_REQUEST,
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ProxyError::Upstream {
                content_type, body, ..
            } => {
                let mut response = (status, Body::from(body)).into_response();
                if let Some(content_type) = content_type {
                    response
                        .headers_mut()
                        .insert(header::CONTENT_TYPE, content_type);
                }
                response
            }
            // Detail stays in the server log.
            ProxyError::Internal(_) => (status, "Internal Server Error").into_response(),
            other => (status, other.to_string()).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upstream_error_is_forwarded_verbatim() {
        let err = ProxyError::Upstream {
            status: StatusCode::NOT_FOUND,
            content_type: Some(HeaderValue::from_static("application/json")),
            body: Bytes::from_static(br#"{"message":"Not Found"}"#),
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], br#"{"message":"Not Found"}"#);
    }

    #[tokio::test]
    async fn internal_error_hides_detail() {
        let err = ProxyError::from(anyhow::anyhow!("disk on fire at /tmp/gitpkg-x"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"Internal Server Error");
    }

    #[test]
    fn missing_manifest_names_the_subdir() {
        let err = ProxyError::MissingManifest {
            subdir: "packages/utils".to_string(),
        };
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("'packages/utils'"));
    }
}
