//! The local origin the decision engine tries before forwarding.
//!
//! [`Origin`] is the seam between the engine and whatever actually
//! generates local responses: a cheap existence probe plus a full trial
//! execution whose output goes into the caller's [`HeldResponse`]
//! instead of the wire. The built-in implementation [`FsOrigin`] serves
//! files from a document root; tests substitute scripted origins.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use bytes::Bytes;
use tokio::io::AsyncReadExt;

use crate::error::UnderstudyError;
use crate::hold::HeldResponse;
use crate::stream::{ChunkSource, CHUNK_SIZE};

/// The request as seen by a trial execution: selected inbound headers
/// propagated, `Accept-Encoding` already stripped by the engine.
#[derive(Debug, Clone)]
pub struct TrialRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
}

/// Outcome of a trial execution. Read-only once produced.
///
/// `return_code` models handlers whose execution result differs from
/// the HTTP status they set; when present and different, classification
/// prefers it over `status`.
#[derive(Debug, Clone)]
pub struct TrialResult {
    pub status: StatusCode,
    pub return_code: Option<StatusCode>,
    pub headers: HeaderMap,
    pub error_headers: HeaderMap,
    pub content_type: Option<HeaderValue>,
    pub content_encoding: Option<HeaderValue>,
    pub last_modified: Option<HeaderValue>,
}

impl TrialResult {
    #[must_use]
    pub fn with_status(status: StatusCode) -> Self {
        Self {
            status,
            return_code: None,
            headers: HeaderMap::new(),
            error_headers: HeaderMap::new(),
            content_type: None,
            content_encoding: None,
            last_modified: None,
        }
    }
}

// async_trait: Origin is held as Arc<dyn Origin> in the shared app state.
#[async_trait]
pub trait Origin: Send + Sync {
    /// Inexpensive existence lookup for method + path, without
    /// generating a response.
    async fn probe(&self, method: &Method, path: &str) -> Result<StatusCode, UnderstudyError>;

    /// Full trial execution. Reads the request body (if at all) through
    /// `body` and writes every response chunk into `held`; nothing
    /// reaches the client from here.
    async fn run_trial(
        &self,
        request: &TrialRequest,
        body: &mut (dyn ChunkSource + Send),
        held: &mut HeldResponse,
    ) -> Result<TrialResult, UnderstudyError>;
}

/// Serves files from a document root. Directories fall through to
/// their `index.html`.
pub struct FsOrigin {
    root: PathBuf,
}

impl FsOrigin {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Map a request path onto the document root. Any parent-directory
    /// component rejects the whole path.
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = path.trim_start_matches('/');
        let candidate = Path::new(relative);
        for component in candidate.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => return None,
            }
        }
        Some(self.root.join(candidate))
    }

    async fn lookup(&self, path: &str) -> LookupOutcome {
        let Some(mut target) = self.resolve(path) else {
            return LookupOutcome::Denied;
        };
        match tokio::fs::metadata(&target).await {
            Ok(meta) if meta.is_dir() => {
                target.push("index.html");
                match tokio::fs::metadata(&target).await {
                    Ok(meta) => LookupOutcome::File(target, meta),
                    Err(e) => LookupOutcome::from_io(&e),
                }
            }
            Ok(meta) => LookupOutcome::File(target, meta),
            Err(e) => LookupOutcome::from_io(&e),
        }
    }
}

enum LookupOutcome {
    File(PathBuf, std::fs::Metadata),
    Missing,
    Denied,
}

impl LookupOutcome {
    fn from_io(e: &std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            Self::Denied
        } else {
            Self::Missing
        }
    }
}

#[async_trait]
impl Origin for FsOrigin {
    async fn probe(&self, _method: &Method, path: &str) -> Result<StatusCode, UnderstudyError> {
        Ok(match self.lookup(path).await {
            LookupOutcome::File(..) => StatusCode::OK,
            LookupOutcome::Missing => StatusCode::NOT_FOUND,
            LookupOutcome::Denied => StatusCode::FORBIDDEN,
        })
    }

    async fn run_trial(
        &self,
        request: &TrialRequest,
        _body: &mut (dyn ChunkSource + Send),
        held: &mut HeldResponse,
    ) -> Result<TrialResult, UnderstudyError> {
        if !matches!(request.method, Method::GET | Method::HEAD | Method::POST) {
            return Ok(error_trial(StatusCode::METHOD_NOT_ALLOWED, held));
        }

        let (path, meta) = match self.lookup(&request.path).await {
            LookupOutcome::File(path, meta) => (path, meta),
            LookupOutcome::Missing => return Ok(error_trial(StatusCode::NOT_FOUND, held)),
            LookupOutcome::Denied => return Ok(error_trial(StatusCode::FORBIDDEN, held)),
        };

        let mut file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Ok(error_trial(StatusCode::FORBIDDEN, held));
            }
            Err(e) => return Err(UnderstudyError::Trial { source: Box::new(e) }),
        };

        if request.method != Method::HEAD {
            let mut buf = vec![0u8; CHUNK_SIZE];
            loop {
                let n = file
                    .read(&mut buf)
                    .await
                    .map_err(|e| UnderstudyError::Trial { source: Box::new(e) })?;
                if n == 0 {
                    break;
                }
                held.push(Bytes::copy_from_slice(&buf[..n]));
            }
        }

        let mut result = TrialResult::with_status(StatusCode::OK);
        result.content_type = Some(HeaderValue::from_static(content_type_for(&path)));
        result.last_modified = meta
            .modified()
            .ok()
            .and_then(|t| HeaderValue::from_str(&httpdate::fmt_http_date(t)).ok());
        Ok(result)
    }
}

fn error_trial(status: StatusCode, held: &mut HeldResponse) -> TrialResult {
    let reason = status.canonical_reason().unwrap_or("Error");
    held.push(Bytes::from(format!(
        "<html><head><title>{} {reason}</title></head>\
         <body><h1>{reason}</h1></body></html>\n",
        status.as_u16()
    )));
    let mut result = TrialResult::with_status(status);
    result.content_type = Some(HeaderValue::from_static("text/html"));
    result
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") | Some("htm") => "text/html",
        Some("css") => "text/css",
        Some("js") => "text/javascript",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        Some("xml") => "application/xml",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("ico") => "image/x-icon",
        Some("pdf") => "application/pdf",
        Some("wasm") => "application/wasm",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::MemorySource;

    fn temp_root() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("understudy-origin-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn trial_request(method: Method, path: &str) -> TrialRequest {
        TrialRequest {
            method,
            path: path.to_string(),
            query: None,
            headers: HeaderMap::new(),
        }
    }

    #[tokio::test]
    async fn probe_reports_missing_file() {
        let root = temp_root();
        let origin = FsOrigin::new(root.clone());
        let status = origin.probe(&Method::GET, "/missing").await.unwrap();
        assert_eq!(status, StatusCode::NOT_FOUND);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn probe_reports_existing_file() {
        let root = temp_root();
        std::fs::write(root.join("hello.txt"), b"hi").unwrap();
        let origin = FsOrigin::new(root.clone());
        let status = origin.probe(&Method::GET, "/hello.txt").await.unwrap();
        assert_eq!(status, StatusCode::OK);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn parent_traversal_is_denied() {
        let root = temp_root();
        let origin = FsOrigin::new(root.clone());
        let status = origin.probe(&Method::GET, "/../etc/passwd").await.unwrap();
        assert_eq!(status, StatusCode::FORBIDDEN);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn trial_streams_file_into_held_buffer() {
        let root = temp_root();
        std::fs::write(root.join("page.html"), b"<p>hello</p>").unwrap();
        let origin = FsOrigin::new(root.clone());

        let mut body = MemorySource::new(vec![]);
        let mut held = HeldResponse::new();
        let result = origin
            .run_trial(&trial_request(Method::GET, "/page.html"), &mut body, &mut held)
            .await
            .unwrap();

        assert_eq!(result.status, StatusCode::OK);
        assert_eq!(result.content_type.unwrap(), "text/html");
        assert!(result.last_modified.is_some());
        let chunks = held.release().unwrap();
        let data: Vec<u8> = chunks.iter().flat_map(|c| c.to_vec()).collect();
        assert_eq!(data, b"<p>hello</p>");
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn missing_file_trial_is_a_404() {
        let root = temp_root();
        let origin = FsOrigin::new(root.clone());

        let mut body = MemorySource::new(vec![]);
        let mut held = HeldResponse::new();
        let result = origin
            .run_trial(&trial_request(Method::GET, "/nope"), &mut body, &mut held)
            .await
            .unwrap();

        assert_eq!(result.status, StatusCode::NOT_FOUND);
        assert!(!held.is_empty());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn head_produces_no_body() {
        let root = temp_root();
        std::fs::write(root.join("data.json"), b"{}").unwrap();
        let origin = FsOrigin::new(root.clone());

        let mut body = MemorySource::new(vec![]);
        let mut held = HeldResponse::new();
        let result = origin
            .run_trial(&trial_request(Method::HEAD, "/data.json"), &mut body, &mut held)
            .await
            .unwrap();

        assert_eq!(result.status, StatusCode::OK);
        assert!(held.is_empty());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn directory_falls_through_to_index() {
        let root = temp_root();
        std::fs::create_dir(root.join("docs")).unwrap();
        std::fs::write(root.join("docs/index.html"), b"<h1>docs</h1>").unwrap();
        let origin = FsOrigin::new(root.clone());
        let status = origin.probe(&Method::GET, "/docs").await.unwrap();
        assert_eq!(status, StatusCode::OK);
        let _ = std::fs::remove_dir_all(&root);
    }
}
