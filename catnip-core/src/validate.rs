//! Query-string validation middleware.
//!
//! A [`Schema`] maps parameter names to predicates over the (possibly
//! absent) parameter value. Every predicate runs; if any fail the request is
//! answered with `400` and `{"errors": [...]}` and `next` is not called.
//!
//! As global middleware that ends the request:
//!
//! ```rust,ignore
//! let schema = Schema::new()
//!     .field("id", |v| v.is_some_and(|id| id.parse::<u64>().is_ok()))
//!     .field("sort", |v| matches!(v, None | Some("asc") | Some("desc")));
//! let app = App::new()
//!     .middleware(App::validate(schema))
//!     .get("/items", [list_items]);
//! ```
//!
//! Inside a route chain every handler still runs, so the ones after it check
//! the status themselves:
//!
//! ```rust,ignore
//! fn list_items(ctx: &mut Context, _next: Next) -> BoxFuture<'_, HandlerResult> {
//!     Box::pin(async move {
//!         if ctx.status() == Some(StatusCode::BAD_REQUEST) {
//!             return Ok(());
//!         }
//!         ctx.text("items");
//!         Ok(())
//!     })
//! }
//!
//! let app = App::new().get("/items", [App::validate(schema).boxed(), from_fn(list_items)]);
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::middleware::{HandlerResult, Middleware, Next};

/// A check on one query parameter. `None` means the parameter is absent.
pub type Predicate = Arc<dyn Fn(Option<&str>) -> bool + Send + Sync>;

/// Ordered mapping from parameter name to predicate.
#[derive(Clone, Default)]
pub struct Schema {
    rules: Vec<(String, Predicate)>,
}

impl Schema {
    pub fn new() -> Self {
        Schema::default()
    }

    /// Add a rule. A name that is already present keeps its position and
    /// gets the new predicate.
    pub fn field<F>(mut self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(Option<&str>) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        let predicate: Predicate = Arc::new(predicate);
        match self.rules.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = predicate,
            None => self.rules.push((name, predicate)),
        }
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run every rule against `lookup` and collect one message per failure.
    pub fn check<L>(&self, lookup: L) -> Vec<String>
    where
        L: Fn(&str) -> Option<String>,
    {
        self.rules
            .iter()
            .filter(|(name, predicate)| !predicate(lookup(name).as_deref()))
            .map(|(name, _)| format!("Invalid value for {}", name))
            .collect()
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|(name, _)| name))
            .finish()
    }
}

/// Body of a failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    pub errors: Vec<String>,
}

/// The validation middleware.
#[derive(Debug, Clone)]
pub struct Validate {
    schema: Schema,
}

impl Validate {
    pub fn new(schema: Schema) -> Self {
        Validate { schema }
    }
}

#[async_trait]
impl Middleware for Validate {
    async fn call(&self, ctx: &mut Context, next: Next) -> HandlerResult {
        let errors = self.schema.check(|name| ctx.query(name));
        if errors.is_empty() {
            return next.run(ctx).await;
        }

        tracing::debug!(path = ctx.path(), ?errors, "query validation failed");
        ctx.set_status(StatusCode::BAD_REQUEST);
        ctx.json(&ValidationErrors { errors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            pairs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_missing_is_distinct_from_empty() {
        let schema = Schema::new().field("id", |v| v.is_some());
        assert_eq!(schema.check(lookup(&[])), vec!["Invalid value for id"]);
        assert!(schema.check(lookup(&[("id", "")])).is_empty());
    }

    #[test]
    fn test_collects_all_failures_in_order() {
        let schema = Schema::new()
            .field("b", |v| v.is_some())
            .field("a", |v| v == Some("1"))
            .field("c", |_| true);
        assert_eq!(
            schema.check(lookup(&[("a", "2")])),
            vec!["Invalid value for b", "Invalid value for a"]
        );
    }

    #[test]
    fn test_redefining_field_replaces_predicate() {
        let schema = Schema::new()
            .field("id", |_| false)
            .field("id", |_| true);
        assert_eq!(schema.len(), 1);
        assert!(schema.check(lookup(&[])).is_empty());
    }
}
