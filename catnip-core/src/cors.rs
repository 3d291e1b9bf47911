//! CORS middleware.
//!
//! Requests without an `Origin` header pass straight through. Otherwise the
//! allowed origin is computed from [`AllowOrigin`], the CORS response headers
//! are set, and `OPTIONS` preflights are answered with an empty `204` without
//! reaching any route.
//!
//! ```rust,ignore
//! use catnip_core::prelude::*;
//!
//! let cors = App::cors(CorsOptions {
//!     origin: AllowOrigin::list(["https://app.example.com"]),
//!     credentials: true,
//!     ..CorsOptions::default()
//! })?;
//! let app = App::new().middleware(cors);
//! ```

use async_trait::async_trait;
use axum::http::{header, HeaderValue, Method, StatusCode};

use crate::context::{Context, ResponseBody};
use crate::error::CatnipError;
use crate::middleware::{HandlerResult, Middleware, Next};

/// Which origin is reported in `Access-Control-Allow-Origin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowOrigin {
    /// Always report this value, whatever the request origin.
    Exact(String),
    /// Echo the request origin when it is in the list, deny otherwise.
    List(Vec<String>),
}

impl AllowOrigin {
    pub fn list<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AllowOrigin::List(origins.into_iter().map(Into::into).collect())
    }

    /// The origin to report for `request_origin`; empty means denied.
    pub fn resolve(&self, request_origin: &str) -> String {
        match self {
            AllowOrigin::Exact(origin) => origin.clone(),
            AllowOrigin::List(origins) => {
                if origins.iter().any(|o| o == request_origin) {
                    request_origin.to_string()
                } else {
                    String::new()
                }
            }
        }
    }
}

impl Default for AllowOrigin {
    fn default() -> Self {
        AllowOrigin::Exact("*".to_string())
    }
}

impl From<&str> for AllowOrigin {
    fn from(origin: &str) -> Self {
        AllowOrigin::Exact(origin.to_string())
    }
}

impl From<String> for AllowOrigin {
    fn from(origin: String) -> Self {
        AllowOrigin::Exact(origin)
    }
}

impl From<Vec<String>> for AllowOrigin {
    fn from(origins: Vec<String>) -> Self {
        AllowOrigin::List(origins)
    }
}

impl From<Vec<&str>> for AllowOrigin {
    fn from(origins: Vec<&str>) -> Self {
        AllowOrigin::list(origins)
    }
}

impl<const N: usize> From<[&str; N]> for AllowOrigin {
    fn from(origins: [&str; N]) -> Self {
        AllowOrigin::list(origins)
    }
}

/// CORS settings. Unset fields come from [`Default`].
#[derive(Debug, Clone)]
pub struct CorsOptions {
    pub origin: AllowOrigin,
    pub methods: Vec<Method>,
    pub allowed_headers: Vec<String>,
    pub exposed_headers: Vec<String>,
    pub credentials: bool,
    /// Seconds a preflight result may be cached.
    pub max_age: u64,
}

impl Default for CorsOptions {
    fn default() -> Self {
        CorsOptions {
            origin: AllowOrigin::default(),
            methods: vec![
                Method::GET,
                Method::HEAD,
                Method::PUT,
                Method::PATCH,
                Method::POST,
                Method::DELETE,
            ],
            allowed_headers: Vec::new(),
            exposed_headers: Vec::new(),
            credentials: false,
            max_age: 5,
        }
    }
}

impl CorsOptions {
    pub fn origin(mut self, origin: impl Into<AllowOrigin>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }

    pub fn allowed_headers<S: Into<String>>(mut self, headers: impl IntoIterator<Item = S>) -> Self {
        self.allowed_headers = headers.into_iter().map(Into::into).collect();
        self
    }

    pub fn exposed_headers<S: Into<String>>(mut self, headers: impl IntoIterator<Item = S>) -> Self {
        self.exposed_headers = headers.into_iter().map(Into::into).collect();
        self
    }

    pub fn credentials(mut self, credentials: bool) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn max_age(mut self, seconds: u64) -> Self {
        self.max_age = seconds;
        self
    }
}

/// The CORS middleware. Header values are validated once, in [`Cors::new`].
#[derive(Debug, Clone)]
pub struct Cors {
    origin: AllowOrigin,
    allow_methods: HeaderValue,
    allow_headers: Option<HeaderValue>,
    expose_headers: Option<HeaderValue>,
    credentials: bool,
    max_age: HeaderValue,
}

fn joined(values: &[String]) -> Result<Option<HeaderValue>, CatnipError> {
    if values.is_empty() {
        return Ok(None);
    }
    HeaderValue::from_str(&values.join(", "))
        .map(Some)
        .map_err(|e| CatnipError::InvalidHeader(format!("{}: {:?}", e, values)))
}

impl Cors {
    pub fn new(options: CorsOptions) -> Result<Self, CatnipError> {
        if let AllowOrigin::Exact(origin) = &options.origin {
            HeaderValue::from_str(origin)
                .map_err(|e| CatnipError::InvalidHeader(format!("{}: {:?}", e, origin)))?;
        }
        let methods = options
            .methods
            .iter()
            .map(|m| m.as_str().to_string())
            .collect::<Vec<_>>();

        Ok(Cors {
            origin: options.origin,
            allow_methods: joined(&methods)?.unwrap_or_else(|| HeaderValue::from_static("")),
            allow_headers: joined(&options.allowed_headers)?,
            expose_headers: joined(&options.exposed_headers)?,
            credentials: options.credentials,
            max_age: HeaderValue::from(options.max_age),
        })
    }
}

#[async_trait]
impl Middleware for Cors {
    async fn call(&self, ctx: &mut Context, next: Next) -> HandlerResult {
        let Some(request_origin) = ctx
            .headers()
            .get(header::ORIGIN)
            .filter(|v| !v.is_empty())
            .cloned()
        else {
            return next.run(ctx).await;
        };

        let origin = self.origin.resolve(request_origin.to_str().unwrap_or_default());
        if origin.is_empty() {
            tracing::debug!(origin = ?request_origin, "origin rejected by CORS policy");
            return Err(CatnipError::Forbidden("Not allowed by CORS".to_string()));
        }
        let origin = HeaderValue::from_str(&origin)
            .map_err(|e| CatnipError::InvalidHeader(e.to_string()))?;

        let headers = ctx.response_headers_mut();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            self.allow_methods.clone(),
        );
        if let Some(allow_headers) = &self.allow_headers {
            headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, allow_headers.clone());
        }
        if let Some(expose_headers) = &self.expose_headers {
            headers.insert(header::ACCESS_CONTROL_EXPOSE_HEADERS, expose_headers.clone());
        }
        if self.credentials {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, self.max_age.clone());

        if ctx.method() == Method::OPTIONS {
            ctx.set_status(StatusCode::NO_CONTENT);
            ctx.set_body(ResponseBody::Empty);
            return Ok(());
        }

        next.run(ctx).await
    }
}
