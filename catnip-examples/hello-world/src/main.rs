//! # Catnip Hello World
//!
//! A small API showing the pieces of a Catnip application: global
//! middleware, an error handler, CORS, static files, query validation and
//! routes with path parameters.
//!
//! ## Run
//!
//! ```bash
//! cargo run -p catnip-hello-world
//! ```
//!
//! ## Endpoints
//!
//! - `GET /`: welcome text
//! - `GET /index.html`: served from `public/`
//! - `GET /users/:id`: JSON for one user
//! - `GET /search?q=...&page=...`: validated query, 400 with `{"errors": [...]}` otherwise
//! - `POST /users`: echoes the JSON body back with `201`
//! - `GET /boom`: an error caught by the error handler

use catnip_core::prelude::*;

#[derive(Debug, Serialize, Deserialize)]
struct User {
    id: u64,
    name: String,
}

fn welcome(ctx: &mut Context, _next: Next) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        ctx.text("Hello from Catnip!");
        Ok(())
    })
}

fn get_user(ctx: &mut Context, _next: Next) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let id = ctx
            .param("id")
            .and_then(|id| id.parse::<u64>().ok())
            .ok_or_else(|| CatnipError::BadRequest("id must be a number".to_string()))?;
        ctx.json(&ApiResponse::success(User {
            id,
            name: format!("user-{}", id),
        }))
    })
}

fn create_user(ctx: &mut Context, _next: Next) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let user: User = ctx.json_body()?;
        ctx.set_status(StatusCode::CREATED);
        ctx.json(&ApiResponse::success(user))
    })
}

fn search(ctx: &mut Context, _next: Next) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        // Validation already wrote the 400 response.
        if ctx.status() == Some(StatusCode::BAD_REQUEST) {
            return Ok(());
        }
        let params = App::query_params(ctx);
        ctx.json(&ApiResponse::success(params))
    })
}

fn boom(_ctx: &mut Context, _next: Next) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move { Err(CatnipError::status(StatusCode::IM_A_TEAPOT, "I'm a teapot")) })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let mut headers = HeaderMap::new();
    headers.insert("x-powered-by", HeaderValue::from_static("catnip"));

    let search_schema = Schema::new()
        .field("q", |v| v.is_some_and(|q| !q.is_empty()))
        .field("page", |v| v.is_none_or(|p| p.parse::<u32>().is_ok()));

    let cors = App::cors(
        CorsOptions::default()
            .origin(["http://localhost:3000", "http://127.0.0.1:3000"])
            .allowed_headers(["Content-Type"]),
    )?;

    App::new()
        .set_response_headers(headers)
        .handle_error(|ctx, error| {
            ctx.set_status(error.status_code());
            ctx.text(format!("Something went wrong: {}", error));
        })
        .middleware(cors)
        .middleware(App::static_files(concat!(env!("CARGO_MANIFEST_DIR"), "/public")))
        .get("/", [from_fn(welcome)])
        .get("/users/:id", [from_fn(get_user)])
        .post("/users", [from_fn(create_user)])
        .get("/search", [App::validate(search_schema).boxed(), from_fn(search)])
        .get("/boom", [from_fn(boom)])
        .listen(8000)
        .await?;

    Ok(())
}
