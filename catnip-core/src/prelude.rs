//! The Catnip prelude: everything a handler module usually needs.
//!
//! ```rust,ignore
//! use catnip_core::prelude::*;
//! ```

// ── Core types ─────────────────────────────────────────────────
pub use crate::ApiResponse;
pub use crate::App;
pub use crate::CatnipError;
pub use crate::Config;
pub use crate::Context;

// ── Middleware & handlers ──────────────────────────────────────
pub use crate::cors::{AllowOrigin, CorsOptions};
pub use crate::middleware::{from_fn, BoxMiddleware, HandlerResult, Middleware, Next};
pub use crate::validate::Schema;
pub use crate::{async_trait, BoxFuture};

// ── HTTP types ─────────────────────────────────────────────────
pub use crate::http::{HeaderMap, HeaderValue, Method, StatusCode};

// ── Logging ────────────────────────────────────────────────────
pub use crate::logging::init_logging;

// ── Serde (almost every handler needs these) ───────────────────
pub use serde::{Deserialize, Serialize};
