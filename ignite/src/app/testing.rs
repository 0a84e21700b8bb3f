use std::collections::HashMap;

use bytes::Bytes;
use http::{Request, Response};
use serde::de::DeserializeOwned;

use crate::app::Engine;

///
/// Sends a request straight into `engine.handle`, without a socket in between.
/// A request that cannot be built (bad method or uri) comes back as a 400 whose
/// body explains why.
///
pub async fn request(
    engine: &Engine,
    method: &str,
    route: &str,
    headers: &[(&str, &str)],
    body: &[u8],
) -> TestResponse {
    let mut builder = Request::builder()
        .method(method)
        .uri(route)
        .header("host", "localhost:8080");

    for (key, value) in headers {
        builder = builder.header(*key, *value);
    }

    match builder.body(Bytes::copy_from_slice(body)) {
        Ok(request) => TestResponse::new(engine.handle(request).await),
        Err(e) => TestResponse {
            body: Bytes::from(format!("Invalid test request: {}", e)),
            headers: HashMap::new(),
            status: 400,
        },
    }
}

pub async fn get(engine: &Engine, route: &str) -> TestResponse {
    request(engine, "GET", route, &[], b"").await
}

pub async fn delete(engine: &Engine, route: &str) -> TestResponse {
    request(engine, "DELETE", route, &[], b"").await
}

pub async fn post(engine: &Engine, route: &str, content_type: &str, content: &str) -> TestResponse {
    request(
        engine,
        "POST",
        route,
        &[("content-type", content_type)],
        content.as_bytes(),
    )
    .await
}

pub async fn put(engine: &Engine, route: &str, content_type: &str, content: &str) -> TestResponse {
    request(
        engine,
        "PUT",
        route,
        &[("content-type", content_type)],
        content.as_bytes(),
    )
    .await
}

#[derive(Debug)]
pub struct TestResponse {
    pub body: Bytes,
    pub headers: HashMap<String, String>,
    pub status: u16,
}

impl TestResponse {
    fn new(response: Response<Bytes>) -> TestResponse {
        let headers = response
            .headers()
            .iter()
            .filter_map(|(key, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (key.as_str().to_owned(), value.to_owned()))
            })
            .collect();

        TestResponse {
            status: response.status().as_u16(),
            headers,
            body: response.into_body(),
        }
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }
}
