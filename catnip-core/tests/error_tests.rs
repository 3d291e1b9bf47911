use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use catnip_core::prelude::*;
use catnip_core::TestApp;

fn fail_with(make: fn() -> CatnipError) -> BoxMiddleware {
    from_fn(move |_ctx, _next| Box::pin(async move { Err(make()) }))
}

fn text(body: &'static str) -> BoxMiddleware {
    from_fn(move |ctx, _next| {
        Box::pin(async move {
            ctx.text(body);
            Ok(())
        })
    })
}

#[tokio::test]
async fn test_error_handler_sees_error_exactly_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let app = TestApp::spawn(
        App::default()
            .handle_error(move |ctx, error| {
                counter.fetch_add(1, Ordering::SeqCst);
                ctx.set_status(StatusCode::IM_A_TEAPOT);
                ctx.text(format!("caught {}", error.error_code()));
            })
            .get(
                "/boom",
                [
                    text("partial"),
                    fail_with(|| CatnipError::Internal("db down".to_string())),
                ],
            ),
    )
    .await;

    for expected in 1..=3 {
        let res = app.client.get(&app.url("/boom")).await;
        assert_eq!(res.status, 418);
        assert_eq!(res.body, "caught INTERNAL_ERROR");
        assert_eq!(calls.load(Ordering::SeqCst), expected);
    }
}

#[tokio::test]
async fn test_handler_not_called_on_success() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let app = TestApp::spawn(
        App::default()
            .handle_error(move |_ctx, _error| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .get("/", [text("fine")]),
    )
    .await;

    let res = app.client.get(&app.url("/")).await;
    assert_eq!(res.status, 200);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_default_error_response_for_client_errors() {
    let app = TestApp::spawn(
        App::default().get("/teapot", [
            from_fn(|_ctx, _next| {
                Box::pin(async move {
                    Err(CatnipError::status(StatusCode::IM_A_TEAPOT, "short and stout"))
                })
            }),
        ]),
    )
    .await;

    let res = app.client.get(&app.url("/teapot")).await;
    assert_eq!(res.status, 418);
    let json = res.json();
    assert_eq!(json["success"], false);
    assert_eq!(json["error"]["code"], "HTTP_ERROR");
    assert_eq!(json["error"]["message"], "short and stout");
}

#[tokio::test]
async fn test_default_error_response_hides_server_errors() {
    let app = TestApp::spawn(App::default().get(
        "/secret",
        [fail_with(|| CatnipError::Internal("password=hunter2".to_string()))],
    ))
    .await;

    let res = app.client.get(&app.url("/secret")).await;
    assert_eq!(res.status, 500);
    assert_eq!(res.error()["code"], "INTERNAL_ERROR");
    assert_eq!(res.error()["message"], "Internal Server Error");
    assert!(!res.body.contains("hunter2"));
}

#[tokio::test]
async fn test_default_error_discards_headers_set_before_the_error() {
    let tag = from_fn(|ctx, _next| {
        Box::pin(async move {
            ctx.set_header("x-partial", "yes")?;
            Ok(())
        })
    });
    let app = TestApp::spawn(App::default().get(
        "/",
        [tag, fail_with(|| CatnipError::NotFound("gone".to_string()))],
    ))
    .await;

    let res = app.client.get(&app.url("/")).await;
    assert_eq!(res.status, 404);
    assert!(res.header("x-partial").is_none());
}

#[tokio::test]
async fn test_boundary_only_covers_later_stages() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let early_failure = from_fn(|ctx, next| {
        Box::pin(async move {
            if ctx.query("early").is_some() {
                return Err(CatnipError::BadRequest("too early".to_string()));
            }
            next.run(ctx).await
        })
    });
    let app = TestApp::spawn(
        App::default()
            .middleware(early_failure)
            .handle_error(move |ctx, error| {
                counter.fetch_add(1, Ordering::SeqCst);
                ctx.set_status(error.status_code());
                ctx.text("handled");
            })
            .get("/", [fail_with(|| CatnipError::Forbidden("late".to_string()))]),
    )
    .await;

    let res = app.client.get(&app.url("/?early=1")).await;
    assert_eq!(res.status, 400);
    assert_eq!(res.error()["code"], "BAD_REQUEST");

    let res = app.client.get(&app.url("/")).await;
    assert_eq!(res.status, 403);
    assert_eq!(res.body, "handled");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_innermost_boundary_wins() {
    let outer = Arc::new(AtomicUsize::new(0));
    let outer_counter = Arc::clone(&outer);
    let app = TestApp::spawn(
        App::default()
            .handle_error(move |_ctx, _error| {
                outer_counter.fetch_add(1, Ordering::SeqCst);
            })
            .handle_error(|ctx, _error| ctx.text("inner"))
            .get("/", [fail_with(|| CatnipError::BadRequest("x".to_string()))]),
    )
    .await;

    let res = app.client.get(&app.url("/")).await;
    assert_eq!(res.body, "inner");
    assert_eq!(outer.load(Ordering::SeqCst), 0);
}

#[test]
fn test_status_codes() {
    assert_eq!(
        CatnipError::BadRequest("x".into()).status_code(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        CatnipError::Forbidden("x".into()).status_code(),
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        CatnipError::NotFound("x".into()).status_code(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        CatnipError::PayloadTooLarge(10).status_code(),
        StatusCode::PAYLOAD_TOO_LARGE
    );
    assert_eq!(
        CatnipError::status(StatusCode::CONFLICT, "x").status_code(),
        StatusCode::CONFLICT
    );
    assert_eq!(
        CatnipError::Internal("x".into()).status_code(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn test_exposure() {
    assert!(CatnipError::Forbidden("x".into()).is_exposed());
    assert!(!CatnipError::Internal("x".into()).is_exposed());
    assert!(!CatnipError::status(StatusCode::BAD_GATEWAY, "upstream").is_exposed());
}

#[test]
fn test_display_messages() {
    assert_eq!(
        CatnipError::Forbidden("Not allowed by CORS".into()).to_string(),
        "Forbidden: Not allowed by CORS"
    );
    assert_eq!(
        CatnipError::status(StatusCode::GONE, "moved on").to_string(),
        "moved on"
    );
}

#[test]
fn test_from_io_error() {
    let err: CatnipError = std::io::Error::new(std::io::ErrorKind::Other, "disk").into();
    assert_eq!(err.error_code(), "IO_ERROR");
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
}
