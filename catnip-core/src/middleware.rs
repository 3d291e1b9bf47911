//! Middleware and handler plumbing.
//!
//! Global middleware and route handlers share one shape: an async function of
//! the request [`Context`] and a [`Next`] continuation. Middleware registered
//! with [`App::middleware`](crate::App::middleware) runs in registration order;
//! calling `next.run(ctx)` proceeds to the following stage, returning without
//! calling it ends the pipeline.
//!
//! ```rust,ignore
//! use catnip_core::prelude::*;
//!
//! let app = App::new()
//!     .middleware(from_fn(|ctx, next| {
//!         Box::pin(async move {
//!             tracing::info!(path = ctx.path(), "incoming request");
//!             next.run(ctx).await
//!         })
//!     }))
//!     .get("/", [from_fn(|ctx, _next| {
//!         Box::pin(async move {
//!             ctx.text("hello");
//!             Ok(())
//!         })
//!     })]);
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderMap;
use futures_util::future::BoxFuture;

use crate::context::Context;
use crate::error::CatnipError;

/// Outcome of a middleware or handler.
pub type HandlerResult = Result<(), CatnipError>;

/// A shareable, type-erased middleware.
pub type BoxMiddleware = Arc<dyn Middleware>;

/// A stage of the request pipeline.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn call(&self, ctx: &mut Context, next: Next) -> HandlerResult;

    fn boxed(self) -> BoxMiddleware
    where
        Self: Sized,
    {
        Arc::new(self)
    }
}

#[async_trait]
impl<M: Middleware + ?Sized> Middleware for Arc<M> {
    async fn call(&self, ctx: &mut Context, next: Next) -> HandlerResult {
        (**self).call(ctx, next).await
    }
}

/// The rest of the pipeline after the current stage.
#[derive(Clone)]
pub struct Next {
    stack: Arc<[BoxMiddleware]>,
    index: usize,
}

impl Next {
    pub(crate) fn new(stack: Arc<[BoxMiddleware]>) -> Self {
        Next { stack, index: 0 }
    }

    /// Run the remaining stages on `ctx`.
    pub async fn run(self, ctx: &mut Context) -> HandlerResult {
        let Some(current) = self.stack.get(self.index).cloned() else {
            return Ok(());
        };
        let next = Next {
            stack: self.stack,
            index: self.index + 1,
        };
        current.call(ctx, next).await
    }
}

/// Middleware built from an async closure. See [`from_fn`].
pub struct FromFn<F>(F);

#[async_trait]
impl<F> Middleware for FromFn<F>
where
    F: for<'a> Fn(&'a mut Context, Next) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
{
    async fn call(&self, ctx: &mut Context, next: Next) -> HandlerResult {
        (self.0)(ctx, next).await
    }
}

/// Turn a closure returning a boxed future into a middleware or handler.
///
/// ```rust,ignore
/// let hello = from_fn(|ctx, _next| Box::pin(async move {
///     ctx.text("hello");
///     Ok(())
/// }));
/// ```
pub fn from_fn<F>(f: F) -> BoxMiddleware
where
    F: for<'a> Fn(&'a mut Context, Next) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
{
    Arc::new(FromFn(f))
}

/// Several handlers run one after another as a single handler.
///
/// Each handler is awaited before the next starts and receives the same
/// continuation. Nothing short-circuits automatically: a handler that has
/// already written the response does not stop later handlers. The first
/// error stops the sequence and is returned.
#[derive(Clone, Default)]
pub struct Sequence {
    handlers: Vec<BoxMiddleware>,
}

impl Sequence {
    pub fn new(handlers: impl IntoIterator<Item = BoxMiddleware>) -> Self {
        Sequence {
            handlers: handlers.into_iter().collect(),
        }
    }

    pub(crate) fn extend(&mut self, handlers: impl IntoIterator<Item = BoxMiddleware>) {
        self.handlers.extend(handlers);
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[async_trait]
impl Middleware for Sequence {
    async fn call(&self, ctx: &mut Context, next: Next) -> HandlerResult {
        for handler in &self.handlers {
            handler.call(ctx, next.clone()).await?;
        }
        Ok(())
    }
}

/// Catches errors from everything downstream and hands them to a callback.
///
/// Registered through [`App::handle_error`](crate::App::handle_error).
pub struct ErrorBoundary<F> {
    handler: F,
}

impl<F> ErrorBoundary<F>
where
    F: Fn(&mut Context, CatnipError) + Send + Sync + 'static,
{
    pub fn new(handler: F) -> Self {
        ErrorBoundary { handler }
    }
}

#[async_trait]
impl<F> Middleware for ErrorBoundary<F>
where
    F: Fn(&mut Context, CatnipError) + Send + Sync + 'static,
{
    async fn call(&self, ctx: &mut Context, next: Next) -> HandlerResult {
        if let Err(error) = next.run(ctx).await {
            tracing::debug!(error = %error, path = ctx.path(), "error boundary caught error");
            (self.handler)(ctx, error);
        }
        Ok(())
    }
}

/// Sets a fixed set of response headers, then continues.
///
/// Each configured name replaces any value already set for it.
#[derive(Debug, Clone)]
pub struct SetHeaders {
    headers: HeaderMap,
}

impl SetHeaders {
    pub fn new(headers: HeaderMap) -> Self {
        SetHeaders { headers }
    }
}

#[async_trait]
impl Middleware for SetHeaders {
    async fn call(&self, ctx: &mut Context, next: Next) -> HandlerResult {
        let response_headers = ctx.response_headers_mut();
        for name in self.headers.keys() {
            response_headers.remove(name);
            for value in self.headers.get_all(name) {
                response_headers.append(name.clone(), value.clone());
            }
        }
        next.run(ctx).await
    }
}
