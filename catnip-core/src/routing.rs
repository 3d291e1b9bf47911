//! Route registration on top of [`axum::Router`].
//!
//! Routes are collected as (verb, path, handlers) and turned into an axum
//! router when the application is built. Matching, path captures and
//! `405 Method Not Allowed` handling are axum's; the routing stage only moves
//! the request [`Context`] into the matched route and back out again.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use axum::extract::{Extension, RawPathParams};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodFilter, MethodRouter};
use axum::Router;
use tower::ServiceExt;

use crate::context::Context;
use crate::error::CatnipError;
use crate::middleware::{BoxMiddleware, HandlerResult, Middleware, Next, Sequence};

/// The HTTP verb a route answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    /// Any method not claimed by another registration on the same path.
    All,
}

impl Verb {
    fn method_filter(self) -> Option<MethodFilter> {
        match self {
            Verb::Get => Some(MethodFilter::GET),
            Verb::Post => Some(MethodFilter::POST),
            Verb::Put => Some(MethodFilter::PUT),
            Verb::Delete => Some(MethodFilter::DELETE),
            Verb::Patch => Some(MethodFilter::PATCH),
            Verb::Head => Some(MethodFilter::HEAD),
            Verb::Options => Some(MethodFilter::OPTIONS),
            Verb::All => None,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Delete => "DELETE",
            Verb::Patch => "PATCH",
            Verb::Head => "HEAD",
            Verb::Options => "OPTIONS",
            Verb::All => "ALL",
        };
        f.write_str(name)
    }
}

/// Translate `:name` and `*name` captures into axum's `{name}` / `{*name}`.
pub fn normalize_path(path: &str) -> String {
    let normalized = path
        .trim_start_matches('/')
        .split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':') {
                format!("{{{}}}", name)
            } else if let Some(name) = segment.strip_prefix('*').filter(|n| !n.is_empty()) {
                format!("{{*{}}}", name)
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/");
    format!("/{}", normalized)
}

struct RouteEntry {
    path: String,
    chains: Vec<(Verb, Sequence)>,
}

/// Registered routes, in registration order.
#[derive(Default)]
pub(crate) struct RouteTable {
    routes: Vec<RouteEntry>,
}

impl RouteTable {
    /// Register handlers for a verb and path.
    ///
    /// Registering the same verb and path again appends to its chain.
    pub(crate) fn add(
        &mut self,
        verb: Verb,
        path: &str,
        handlers: impl IntoIterator<Item = BoxMiddleware>,
    ) {
        let path = normalize_path(path);
        tracing::debug!(verb = %verb, path = %path, "registering route");

        let index = match self.routes.iter().position(|r| r.path == path) {
            Some(index) => index,
            None => {
                self.routes.push(RouteEntry {
                    path,
                    chains: Vec::new(),
                });
                self.routes.len() - 1
            }
        };
        let entry = &mut self.routes[index];

        match entry.chains.iter_mut().find(|(v, _)| *v == verb) {
            Some((_, chain)) => chain.extend(handlers),
            None => entry.chains.push((verb, Sequence::new(handlers))),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.routes.iter().map(|r| r.chains.len()).sum()
    }

    /// Build the axum router.
    ///
    /// # Panics
    ///
    /// Panics if a path is rejected by axum (for example two different
    /// capture names at the same position).
    pub(crate) fn into_router(self) -> Router {
        let mut router = Router::new();
        for RouteEntry { path, chains } in self.routes {
            let mut method_router = MethodRouter::new();
            for (verb, chain) in chains {
                let chain = Arc::new(chain);
                let endpoint = move |params: RawPathParams, Extension(handoff): Extension<Handoff>| {
                    let chain = Arc::clone(&chain);
                    async move { run_route(&chain, params, handoff).await }
                };
                method_router = match verb.method_filter() {
                    Some(filter) => method_router.on(filter, endpoint),
                    None => method_router.fallback(endpoint),
                };
            }
            router = router.route(&path, method_router);
        }
        router
    }
}

async fn run_route(chain: &Sequence, params: RawPathParams, handoff: Handoff) -> Response {
    let Some((mut ctx, next)) = handoff.take() else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    ctx.set_params(
        params
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>(),
    );
    let result = chain.call(&mut ctx, next).await;
    handoff.finish(ctx, result);
    StatusCode::NO_CONTENT.into_response()
}

enum Slot {
    Waiting(Box<Context>, Next),
    Finished(Box<Context>, HandlerResult),
    Taken,
}

enum Outcome {
    Handled(Context, HandlerResult),
    Unmatched(Context),
    Lost,
}

/// Carries the context into the matched route and back.
#[derive(Clone)]
struct Handoff(Arc<Mutex<Slot>>);

impl Handoff {
    fn new(ctx: Context, next: Next) -> Self {
        Handoff(Arc::new(Mutex::new(Slot::Waiting(Box::new(ctx), next))))
    }

    fn replace(&self, slot: Slot) -> Slot {
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, slot)
    }

    fn take(&self) -> Option<(Context, Next)> {
        match self.replace(Slot::Taken) {
            Slot::Waiting(ctx, next) => Some((*ctx, next)),
            other => {
                self.replace(other);
                None
            }
        }
    }

    fn finish(&self, ctx: Context, result: HandlerResult) {
        self.replace(Slot::Finished(Box::new(ctx), result));
    }

    fn into_outcome(self) -> Outcome {
        match self.replace(Slot::Taken) {
            Slot::Finished(ctx, result) => Outcome::Handled(*ctx, result),
            Slot::Waiting(ctx, _) => Outcome::Unmatched(*ctx),
            Slot::Taken => Outcome::Lost,
        }
    }
}

/// The last pipeline stage: dispatches the context to the matching route.
pub(crate) struct Dispatch {
    router: Router,
}

impl Dispatch {
    pub(crate) fn new(router: Router) -> Self {
        Dispatch { router }
    }
}

#[async_trait]
impl Middleware for Dispatch {
    async fn call(&self, ctx: &mut Context, next: Next) -> HandlerResult {
        let mut request = ctx.to_request();
        let handoff = Handoff::new(std::mem::take(ctx), next);
        request.extensions_mut().insert(handoff.clone());

        let response = match self.router.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };

        match handoff.into_outcome() {
            Outcome::Handled(restored, result) => {
                *ctx = restored;
                result
            }
            Outcome::Unmatched(restored) => {
                *ctx = restored;
                apply_unmatched(ctx, &response);
                Ok(())
            }
            Outcome::Lost => Err(CatnipError::Internal(
                "request context was lost during routing".to_string(),
            )),
        }
    }
}

/// Mirror the router's answer when no route handler ran.
///
/// Unknown paths leave the response alone. A known path with an unregistered
/// method gets `405` plus `Allow`, or `200` plus `Allow` for `OPTIONS`,
/// unless an earlier stage already chose a status other than 404.
fn apply_unmatched(ctx: &mut Context, response: &Response) {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return;
    }
    if ctx.status().is_some_and(|s| s != StatusCode::NOT_FOUND) {
        return;
    }

    if status == StatusCode::METHOD_NOT_ALLOWED && ctx.method() == Method::OPTIONS {
        ctx.set_status(StatusCode::OK);
    } else {
        ctx.set_status(status);
    }
    if let Some(allow) = response.headers().get(header::ALLOW) {
        ctx.response_headers_mut().insert(header::ALLOW, allow.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_colon_params() {
        assert_eq!(normalize_path("/users/:id"), "/users/{id}");
        assert_eq!(normalize_path("/a/:x/b/:y"), "/a/{x}/b/{y}");
    }

    #[test]
    fn test_normalize_wildcard() {
        assert_eq!(normalize_path("/files/*rest"), "/files/{*rest}");
    }

    #[test]
    fn test_normalize_keeps_braces_and_root() {
        assert_eq!(normalize_path("/users/{id}"), "/users/{id}");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("health"), "/health");
    }

    #[test]
    fn test_same_verb_appends() {
        let mut table = RouteTable::default();
        table.add(Verb::Get, "/a", Vec::new());
        table.add(Verb::Get, "/a", Vec::new());
        table.add(Verb::Post, "/a", Vec::new());
        table.add(Verb::All, "/b", Vec::new());
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_verb_display() {
        assert_eq!(Verb::Get.to_string(), "GET");
        assert_eq!(Verb::All.to_string(), "ALL");
    }
}
