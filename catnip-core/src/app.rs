use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use axum::extract::Request;
use axum::http::{HeaderMap, HeaderName};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::context::Context;
use crate::cors::{Cors, CorsOptions};
use crate::error::CatnipError;
use crate::middleware::{BoxMiddleware, ErrorBoundary, Middleware, Next, SetHeaders};
use crate::routing::{Dispatch, RouteTable, Verb};
use crate::static_files::ServeStatic;
use crate::validate::{Schema, Validate};

/// The main Catnip application.
///
/// Collects global middleware and routes, then hands everything to axum
/// when it starts serving.
///
/// ```rust,ignore
/// use catnip_core::prelude::*;
///
/// fn hello(ctx: &mut Context, _next: Next) -> BoxFuture<'_, HandlerResult> {
///     Box::pin(async move {
///         ctx.text("Hello, World!");
///         Ok(())
///     })
/// }
///
/// App::new()
///     .middleware(App::cors(CorsOptions::default())?)
///     .get("/", [from_fn(hello)])
///     .listen(8000)
///     .await?;
/// ```
pub struct App {
    config: Config,
    middleware: Vec<BoxMiddleware>,
    routes: RouteTable,
}

impl Default for App {
    fn default() -> Self {
        App::with_config(Config::default())
    }
}

impl App {
    /// Create a new application configured from the environment.
    pub fn new() -> Self {
        App::with_config(Config::from_env())
    }

    /// Create a new application with a given config.
    pub fn with_config(config: Config) -> Self {
        App {
            config,
            middleware: Vec::new(),
            routes: RouteTable::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ═══ Pipeline ═══

    /// Append a middleware to the global pipeline.
    ///
    /// Middleware runs in registration order, before routing.
    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Register an error handler for everything registered after it.
    ///
    /// Errors returned downstream are passed to `handler` once; the request
    /// then completes with whatever response the handler wrote.
    ///
    /// ```rust,ignore
    /// app.handle_error(|ctx, error| {
    ///     ctx.set_status(error.status_code());
    ///     ctx.text(error.to_string());
    /// })
    /// ```
    pub fn handle_error<F>(self, handler: F) -> Self
    where
        F: Fn(&mut Context, CatnipError) + Send + Sync + 'static,
    {
        self.middleware(ErrorBoundary::new(handler))
    }

    /// Set these headers on every response.
    pub fn set_response_headers(self, headers: HeaderMap) -> Self {
        self.middleware(SetHeaders::new(headers))
    }

    // ═══ Middleware factories ═══

    /// Build a CORS middleware. See [`crate::cors`].
    pub fn cors(options: CorsOptions) -> Result<Cors, CatnipError> {
        Cors::new(options)
    }

    /// Build a middleware serving files below `root`.
    pub fn static_files(root: impl AsRef<Path>) -> ServeStatic {
        ServeStatic::new(root)
    }

    /// Build a query validation middleware. See [`crate::validate`].
    pub fn validate(schema: Schema) -> Validate {
        Validate::new(schema)
    }

    /// All query parameters of the request; repeated names keep the last value.
    pub fn query_params(ctx: &Context) -> HashMap<String, String> {
        ctx.query_params()
    }

    // ═══ Routes ═══

    /// Register handlers for `verb` on `path`.
    ///
    /// Paths accept `:name` or `{name}` captures and a trailing `*rest` or
    /// `{*rest}` wildcard. The handlers run in order for every matching
    /// request; see [`Sequence`](crate::middleware::Sequence).
    pub fn route(
        mut self,
        verb: Verb,
        path: &str,
        handlers: impl IntoIterator<Item = BoxMiddleware>,
    ) -> Self {
        self.routes.add(verb, path, handlers);
        self
    }

    pub fn get(self, path: &str, handlers: impl IntoIterator<Item = BoxMiddleware>) -> Self {
        self.route(Verb::Get, path, handlers)
    }

    pub fn post(self, path: &str, handlers: impl IntoIterator<Item = BoxMiddleware>) -> Self {
        self.route(Verb::Post, path, handlers)
    }

    pub fn put(self, path: &str, handlers: impl IntoIterator<Item = BoxMiddleware>) -> Self {
        self.route(Verb::Put, path, handlers)
    }

    pub fn delete(self, path: &str, handlers: impl IntoIterator<Item = BoxMiddleware>) -> Self {
        self.route(Verb::Delete, path, handlers)
    }

    pub fn patch(self, path: &str, handlers: impl IntoIterator<Item = BoxMiddleware>) -> Self {
        self.route(Verb::Patch, path, handlers)
    }

    pub fn head(self, path: &str, handlers: impl IntoIterator<Item = BoxMiddleware>) -> Self {
        self.route(Verb::Head, path, handlers)
    }

    pub fn options(self, path: &str, handlers: impl IntoIterator<Item = BoxMiddleware>) -> Self {
        self.route(Verb::Options, path, handlers)
    }

    /// Register handlers for every method not registered separately on `path`.
    pub fn all(self, path: &str, handlers: impl IntoIterator<Item = BoxMiddleware>) -> Self {
        self.route(Verb::All, path, handlers)
    }

    // ═══ Serving ═══

    /// Build the axum router serving this application.
    ///
    /// The routing stage is appended after all registered middleware.
    ///
    /// # Panics
    ///
    /// Panics if axum rejects a registered path.
    pub fn into_router(self) -> Router {
        let is_dev = self.config.is_dev();
        let route_count = self.routes.len();

        let mut stack = self.middleware;
        stack.push(Arc::new(Dispatch::new(self.routes.into_router())));
        tracing::debug!(
            middleware = stack.len() - 1,
            routes = route_count,
            "building application router"
        );

        let pipeline = Arc::new(Pipeline {
            stack: stack.into(),
            max_body_size: self.config.max_body_size,
        });
        let mut router = Router::new().fallback(move |request: Request| {
            let pipeline = Arc::clone(&pipeline);
            async move { pipeline.handle(request).await }
        });

        // Only add request tracing and request ids in development mode.
        if is_dev {
            use tower_http::trace::DefaultMakeSpan;
            use tower_http::trace::DefaultOnRequest;
            use tower_http::trace::DefaultOnResponse;
            use tower_http::LatencyUnit;

            let x_request_id = HeaderName::from_static("x-request-id");
            router = router
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(PropagateRequestIdLayer::new(x_request_id))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(tracing::Level::INFO))
                        .on_request(DefaultOnRequest::new().level(tracing::Level::INFO))
                        .on_response(
                            DefaultOnResponse::new()
                                .level(tracing::Level::INFO)
                                .latency_unit(LatencyUnit::Millis),
                        ),
                );
        }

        router
    }

    /// Serve on an already bound listener until Ctrl+C.
    pub async fn serve(self, listener: TcpListener) -> Result<(), CatnipError> {
        let addr = listener.local_addr()?;
        let router = self.into_router();

        tracing::info!(%addr, "Server running at http://localhost:{}", addr.port());

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }

    /// Bind `port` on the configured host and serve.
    pub async fn listen(self, port: u16) -> Result<(), CatnipError> {
        let addr = format!("{}:{}", self.config.server_host, port);
        let listener = TcpListener::bind(&addr).await?;
        self.serve(listener).await
    }

    /// Bind the configured host and port and serve.
    pub async fn run(self) -> Result<(), CatnipError> {
        let port = self.config.server_port;
        self.listen(port).await
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down Catnip server...");
}

/// Global middleware plus the routing stage, shared by all requests.
struct Pipeline {
    stack: Arc<[BoxMiddleware]>,
    max_body_size: usize,
}

impl Pipeline {
    async fn handle(&self, request: Request) -> Response {
        let (parts, body) = request.into_parts();
        let body = match axum::body::to_bytes(body, self.max_body_size).await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!("failed to buffer request body: {}", e);
                return CatnipError::PayloadTooLarge(self.max_body_size).into_response();
            }
        };

        let mut ctx = Context::from_parts(parts, body);
        match Next::new(Arc::clone(&self.stack)).run(&mut ctx).await {
            Ok(()) => ctx.into_response(),
            Err(error) => error.into_response(),
        }
    }
}
