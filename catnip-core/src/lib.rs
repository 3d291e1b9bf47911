pub mod app;
pub mod config;
pub mod context;
pub mod cors;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod prelude;
pub mod response;
pub mod routing;
pub mod static_files;
pub mod testing;
pub mod validate;

pub use app::App;
pub use config::Config;
pub use context::Context;
pub use cors::{AllowOrigin, Cors, CorsOptions};
pub use error::CatnipError;
pub use middleware::{from_fn, BoxMiddleware, HandlerResult, Middleware, Next};
pub use response::ApiResponse;
pub use routing::Verb;
pub use static_files::ServeStatic;
pub use testing::{TestApp, TestClient, TestResponse};
pub use validate::{Schema, Validate};

// ── Re-exports ─────────────────────────────────────────────────
// So users can write handlers without depending on axum or futures directly.
pub use async_trait::async_trait;
pub use axum::http;
pub use futures_util::future::BoxFuture;
