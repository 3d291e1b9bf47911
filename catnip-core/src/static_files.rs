//! Static file middleware backed by tower-http's [`ServeDir`].
//!
//! Tries to answer the request from a root directory; on anything but a
//! successful (or `304 Not Modified`) answer the request falls through to the
//! next stage, so routes registered for the same paths still work.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, StatusCode};
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::context::{Context, ResponseBody};
use crate::middleware::{HandlerResult, Middleware, Next};

#[derive(Debug, Clone)]
pub struct ServeStatic {
    root: PathBuf,
    service: ServeDir,
}

impl ServeStatic {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let service = ServeDir::new(&root).append_index_html_on_directories(false);
        ServeStatic { root, service }
    }
}

/// Dot-prefixed segments (`.env`, `.git/config`) are never served.
fn is_hidden(path: &str) -> bool {
    path.split('/').any(|segment| {
        segment.starts_with('.') || segment.to_ascii_lowercase().starts_with("%2e")
    })
}

#[async_trait]
impl Middleware for ServeStatic {
    async fn call(&self, ctx: &mut Context, next: Next) -> HandlerResult {
        if !matches!(*ctx.method(), Method::GET | Method::HEAD) || is_hidden(ctx.path()) {
            return next.run(ctx).await;
        }

        let response = match self.service.clone().oneshot(ctx.to_request()).await {
            Ok(response) => response,
            Err(never) => match never {},
        };
        let (parts, body) = response.into_parts();
        if !(parts.status.is_success() || parts.status == StatusCode::NOT_MODIFIED) {
            tracing::trace!(path = ctx.path(), status = %parts.status, "static file miss");
            return next.run(ctx).await;
        }

        tracing::trace!(path = ctx.path(), root = %self.root.display(), "serving static file");
        ctx.set_status(parts.status);
        ctx.response_headers_mut().extend(parts.headers);
        ctx.set_body(ResponseBody::Stream(Body::new(body)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_segments() {
        assert!(is_hidden("/.env"));
        assert!(is_hidden("/assets/.git/config"));
        assert!(is_hidden("/%2Egit/config"));
        assert!(!is_hidden("/assets/app.js"));
        assert!(!is_hidden("/"));
    }
}
