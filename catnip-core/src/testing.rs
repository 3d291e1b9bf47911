use std::net::SocketAddr;

use axum::http::{HeaderMap, Method};
use tokio::net::TcpListener;

use crate::App;

/// A running application for integration testing.
///
/// Binds an OS-assigned port on localhost and serves the app in a
/// background task.
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_hello() {
///     let app = TestApp::spawn(App::default().get("/", [hello])).await;
///     let res = app.client.get(&app.url("/")).await;
///     assert_eq!(res.status, 200);
/// }
/// ```
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: TestClient,
}

impl TestApp {
    /// Serve `app` on `127.0.0.1:0`.
    pub async fn spawn(app: App) -> Self {
        let router = app.into_router();
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test server");
        let addr = listener.local_addr().expect("Failed to get local addr");

        // Spawn the server in the background
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        TestApp {
            addr,
            client: TestClient::new(addr),
        }
    }

    /// Get the URL for a path on the test server.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// A simple HTTP test client with helper methods.
#[derive(Clone)]
pub struct TestClient {
    inner: reqwest::Client,
    base_addr: SocketAddr,
}

impl TestClient {
    /// Create a new test client pointing at the given address.
    pub fn new(addr: SocketAddr) -> Self {
        TestClient {
            inner: reqwest::Client::new(),
            base_addr: addr,
        }
    }

    /// Send a GET request.
    pub async fn get(&self, url: &str) -> TestResponse {
        self.request(Method::GET, url, &[], None).await
    }

    /// Send a GET request with extra headers.
    pub async fn get_with_headers(&self, url: &str, headers: &[(&str, &str)]) -> TestResponse {
        self.request(Method::GET, url, headers, None).await
    }

    /// Send a POST request with a JSON body.
    pub async fn post(&self, url: &str, body: &str) -> TestResponse {
        self.request(
            Method::POST,
            url,
            &[("Content-Type", "application/json")],
            Some(body),
        )
        .await
    }

    /// Send an OPTIONS request with extra headers.
    pub async fn options(&self, url: &str, headers: &[(&str, &str)]) -> TestResponse {
        self.request(Method::OPTIONS, url, headers, None).await
    }

    /// Send an arbitrary request.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
        body: Option<&str>,
    ) -> TestResponse {
        let mut builder = self.inner.request(method.clone(), url);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        if let Some(body) = body {
            builder = builder.body(body.to_string());
        }
        let res = builder
            .send()
            .await
            .unwrap_or_else(|e| panic!("{} request failed: {}", method, e));
        TestResponse::from_response(res).await
    }

    /// Get the base URL.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.base_addr)
    }
}

/// A simplified HTTP response for test assertions.
#[derive(Debug)]
pub struct TestResponse {
    pub status: u16,
    pub body: String,
    pub headers: HeaderMap,
}

impl TestResponse {
    async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let headers = res.headers().clone();
        let body = res.text().await.unwrap_or_default();
        TestResponse {
            status,
            body,
            headers,
        }
    }

    /// Parse the body as JSON.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("Failed to parse response as JSON")
    }

    /// A response header as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get the error field of a default error response.
    pub fn error(&self) -> serde_json::Value {
        self.json()["error"].clone()
    }
}
