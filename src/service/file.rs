//! Static file serving.
//!
//! # Responsibilities
//! - Map a request to one fixed file, or to a file under a directory root
//! - Send a sized head with a guessed content type, then the file as a
//!   body stream
//!
//! # Design Decisions
//! - Stateless, so a single instance is shared by every request
//! - Only `GET` is served; other methods get `405`
//! - Any `..` or empty segment in the mapped path is treated as not found

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use hyper::{Method, StatusCode};

use crate::message::{media, BodyStream, FullRequest, FullResponse, ResponseWithoutBody};
use crate::protocol::Connection;
use crate::service::method::method_not_allowed;
use crate::service::{FullRequestService, ServiceError, ServiceFactory};

#[derive(Debug, Clone)]
enum Target {
    File(PathBuf),
    Directory { uri_root: String, directory: PathBuf },
}

/// Serves files from disk.
#[derive(Debug, Clone)]
pub struct FileService {
    target: Target,
}

impl FileService {
    /// Serve the same file for every request.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            target: Target::File(path.into()),
        }
    }

    /// Serve `directory/<rest>` for request paths of the form `uri_root<rest>`.
    pub fn directory(uri_root: &str, directory: impl Into<PathBuf>) -> Self {
        let uri_root = if uri_root.ends_with('/') {
            uri_root.to_string()
        } else {
            format!("{}/", uri_root)
        };
        Self {
            target: Target::Directory {
                uri_root,
                directory: directory.into(),
            },
        }
    }

    /// Wrap into a shared factory.
    pub fn into_factory(self) -> ServiceFactory {
        ServiceFactory::shared_full_request(self)
    }

    /// The URI root a directory service is mounted under.
    pub fn uri_root(&self) -> Option<&str> {
        match &self.target {
            Target::File(_) => None,
            Target::Directory { uri_root, .. } => Some(uri_root),
        }
    }

    /// The file a request path maps to, if it is servable.
    pub fn resolve(&self, path: &str) -> Option<PathBuf> {
        match &self.target {
            Target::File(file) => Some(file.clone()),
            Target::Directory { uri_root, directory } => {
                let rest = path.strip_prefix(uri_root.as_str())?;
                if rest.is_empty() {
                    return None;
                }
                let relative = Path::new(rest);
                let safe = relative
                    .components()
                    .all(|c| matches!(c, Component::Normal(_)));
                if !safe || rest.split('/').any(str::is_empty) {
                    return None;
                }
                Some(directory.join(relative))
            }
        }
    }
}

#[async_trait]
impl FullRequestService for FileService {
    async fn serve_full_request(
        &self,
        request: FullRequest,
        connection: &mut Connection,
    ) -> Result<(), ServiceError> {
        if request.method() != Method::GET {
            connection.send_full_response(method_not_allowed("GET"))?;
            return Ok(());
        }

        let path = match self.resolve(request.path()) {
            Some(path) => path,
            None => {
                connection.send_full_response(FullResponse::new(StatusCode::NOT_FOUND))?;
                return Ok(());
            }
        };

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) if m.is_file() => m,
            _ => {
                tracing::debug!(path = %path.display(), "File not found");
                connection.send_full_response(FullResponse::new(StatusCode::NOT_FOUND))?;
                return Ok(());
            }
        };

        let body = BodyStream::from_file(&path).await?;
        let head = ResponseWithoutBody::with_length(
            StatusCode::OK,
            metadata.len(),
            Some(media::from_path(&path)),
        );

        connection.send_response_without_body(head)?;
        connection.send_body_stream(body)?;
        Ok(())
    }
}
