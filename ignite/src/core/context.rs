use std::any::Any;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE, SERVER};
use http::{Method, Request, Response};
use serde::Serialize;
use serde_derive::Serialize;
use serde_json::{json, Value as JsonValue};
use smallvec::SmallVec;

use crate::binding::multipart::MultipartForm;
use crate::config::Config;
use crate::core::errors::Error;
use crate::core::middleware::{BoxFuture, ChainResult, Flow, Handler, ABORT_INDEX};
use crate::core::payload::{Payload, PAYLOAD_KEY};
use crate::core::response::{ResponseSink, ResponseWriter};
use crate::core::values::{Value, ValueStore};
use crate::render::{self, Render};

#[derive(Serialize)]
struct SuccessEnvelope<'a, T: Serialize> {
    code: u16,
    data: &'a T,
    message: &'static str,
}

fn fail_envelope(message: &str, code: u16) -> JsonValue {
    json!({ "message": message, "code": code })
}

///
/// The state of one in-flight request. Contexts are pooled by the engine, so
/// everything in here is cleared by `reset` before the next request sees it.
///
pub struct Context {
    config: Arc<Config>,
    server_header: Option<HeaderValue>,
    request: Request<Bytes>,
    writer: ResponseWriter,
    path: String,
    method: Method,
    params: SmallVec<[(String, String); 4]>,
    query: Vec<(String, String)>,
    status: u16,
    handlers: Vec<Handler>,
    index: i32,
    values: Arc<ValueStore>,
    pub(crate) multipart: Option<MultipartForm>,
}

impl Context {
    pub fn new(config: Arc<Config>) -> Context {
        let server_header = match HeaderValue::from_str(&config.server_name) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(
                    "'{}' is not a valid Server header, responses will go out without one",
                    config.server_name
                );
                None
            }
        };

        Context {
            config,
            server_header,
            request: Request::default(),
            writer: ResponseWriter::new(),
            path: String::new(),
            method: Method::GET,
            params: SmallVec::new(),
            query: Vec::new(),
            status: 200,
            handlers: Vec::new(),
            index: -1,
            values: Arc::new(ValueStore::new()),
            multipart: None,
        }
    }

    ///
    /// Clears every trace of the previous request. A value store that a background
    /// task still holds on to is detached rather than cleared, so late writes land
    /// in a store nobody reads anymore.
    ///
    pub fn reset(&mut self) {
        self.index = -1;
        self.handlers.clear();

        match Arc::get_mut(&mut self.values) {
            Some(values) => values.clear(),
            None => self.values = Arc::new(ValueStore::new()),
        }

        self.request = Request::default();
        self.writer.reset();
        self.path.clear();
        self.method = Method::GET;
        self.params.clear();
        self.query.clear();
        self.multipart = None;
        self.status = 200;
    }

    pub fn init(&mut self, request: Request<Bytes>) {
        self.path.push_str(request.uri().path());
        self.method = request.method().clone();

        if let Some(query) = request.uri().query() {
            match serde_urlencoded::from_str::<Vec<(String, String)>>(query) {
                Ok(pairs) => self.query = pairs,
                Err(e) => debug!("Ignoring malformed query string '{}': {}", query, e),
            }
        }

        if let Some(server) = &self.server_header {
            self.writer.headers_mut().insert(SERVER, server.clone());
        }

        self.request = request;
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn request(&self) -> &Request<Bytes> {
        &self.request
    }

    pub fn body(&self) -> &Bytes {
        self.request.body()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_params(&mut self, params: impl IntoIterator<Item = (String, String)>) {
        self.params.clear();
        self.params.extend(params);
    }

    /// First value of a query parameter.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.request
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
    }

    /// The request's media type, without parameters such as the charset.
    pub fn content_type(&self) -> &str {
        self.request
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(str::trim)
            .unwrap_or("")
    }

    // Chain

    pub fn push_handler(&mut self, handler: Handler) {
        self.handlers.push(handler);
    }

    pub(crate) fn path_and_handlers(&mut self) -> (&str, &mut Vec<Handler>) {
        (&self.path, &mut self.handlers)
    }

    pub fn index(&self) -> i32 {
        self.index
    }

    fn advance(&mut self) {
        if self.index < self.handlers.len() as i32 {
            self.index += 1;
        }
    }

    fn current_handler(&self) -> Option<Handler> {
        if self.index < 0 {
            return None;
        }

        self.handlers.get(self.index as usize).cloned()
    }

    ///
    /// Runs the remaining handlers. Each handler that awaits `next` in turn resumes
    /// after every handler behind it has finished, so post-processing runs in reverse
    /// registration order.
    ///
    pub fn next(&mut self) -> BoxFuture<'_, ChainResult> {
        Box::pin(async move {
            self.advance();

            while let Some(handler) = self.current_handler() {
                if let Err(e) = handler(&mut *self).await {
                    self.abort();
                    return Err(e);
                }

                self.advance();
            }

            if self.is_aborted() {
                Ok(Flow::Aborted)
            } else {
                Ok(Flow::Completed)
            }
        })
    }

    /// Stops the chain. Handlers already running still finish their own code.
    pub fn abort(&mut self) {
        self.index = ABORT_INDEX;
    }

    pub fn is_aborted(&self) -> bool {
        self.index >= ABORT_INDEX
    }

    // Values

    pub fn values(&self) -> Arc<ValueStore> {
        self.values.clone()
    }

    pub fn set<V: Any + Send + Sync>(&mut self, key: &str, value: V) {
        if key == PAYLOAD_KEY {
            warn!(
                "'{}' is reserved for the response payload, ignoring the write on {}",
                PAYLOAD_KEY, self.path
            );
            return;
        }

        self.values.set(key, value);
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key)
    }

    pub fn get_as<V: Any + Send + Sync>(&self, key: &str) -> Option<Arc<V>> {
        self.values.get_as(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    // Response

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn set_status(&mut self, code: u16) {
        self.status = code;
    }

    pub fn response_headers(&self) -> &http::HeaderMap {
        self.writer.headers()
    }

    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), Error> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::header(format!("Invalid header name '{}'", name)).with_cause(e))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::header(format!("Invalid value for header '{}'", name)).with_cause(e))?;

        self.writer.headers_mut().insert(name, value);

        Ok(())
    }

    fn force_content_type(&mut self, content_type: &'static str) {
        self.writer
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    }

    /// Buffers a payload without touching the content type.
    pub fn respond(&mut self, code: u16, payload: impl Into<Payload>) {
        let payload: Payload = payload.into();

        self.status = code;
        self.values.set(PAYLOAD_KEY, payload);
    }

    pub fn respond_text(&mut self, code: u16, text: impl Into<String>) {
        self.writer.set_content_type(render::MIME_PLAIN);
        self.respond(code, Payload::Text(text.into()));
    }

    pub fn respond_html(&mut self, code: u16, html: impl Into<String>) {
        self.writer.set_content_type(render::MIME_HTML);
        self.respond(code, Payload::Text(html.into()));
    }

    pub fn respond_bytes(&mut self, code: u16, content_type: &str, data: impl Into<Bytes>) {
        if !self.writer.headers().contains_key(CONTENT_TYPE) {
            let content_type = HeaderValue::from_str(content_type).unwrap_or_else(|_| {
                warn!(
                    "Invalid content type '{}', falling back to {}",
                    content_type,
                    render::MIME_OCTET_STREAM
                );
                HeaderValue::from_static(render::MIME_OCTET_STREAM)
            });

            self.writer.headers_mut().insert(CONTENT_TYPE, content_type);
        }

        self.respond(code, Payload::Bytes(data.into()));
    }

    /// Buffers `data` as JSON. A value that cannot be represented as JSON fails the request with a 400.
    pub fn respond_json<T: Serialize + ?Sized>(&mut self, code: u16, data: &T) {
        match serde_json::to_value(data) {
            Ok(value) => {
                self.writer.set_content_type(render::MIME_JSON);
                self.respond(code, Payload::Json(value));
            }
            Err(e) => self.fail(400, &e.to_string()),
        }
    }

    pub fn success<T: Serialize>(&mut self, data: &T) {
        self.respond_json(
            200,
            &SuccessEnvelope {
                code: 200,
                data,
                message: "",
            },
        );
    }

    ///
    /// Aborts the chain and buffers a `{message, code}` envelope. Can be called more
    /// than once, the last call wins.
    ///
    pub fn fail(&mut self, code: u16, message: &str) {
        self.abort();

        let code = if self.config.legacy_fail_envelope {
            500
        } else {
            code
        };

        self.force_content_type(render::MIME_JSON);
        self.respond(code, Payload::Json(fail_envelope(message, code)));
    }

    pub(crate) fn take_payload(&mut self) -> Option<Payload> {
        self.values
            .remove(PAYLOAD_KEY)
            .and_then(|value| value.downcast::<Payload>().ok())
            .map(|payload| Arc::try_unwrap(payload).unwrap_or_else(|shared| (*shared).clone()))
    }

    pub fn has_payload(&self) -> bool {
        self.values.contains(PAYLOAD_KEY)
    }

    ///
    /// Writes the buffered payload, if any, with the buffered status. A JSON payload
    /// that fails to serialize is replaced by a 400 envelope.
    ///
    pub fn flush_payload(&mut self) -> Result<(), Error> {
        let payload = match self.take_payload() {
            Some(payload) => payload,
            None => return Ok(()),
        };

        let status = self.status;
        let result = match &payload {
            Payload::Text(text) => self.render(status, &render::Text(text)),
            Payload::Bytes(data) => self.render(status, &render::Raw::new(data)),
            Payload::Json(value) => self.render(status, &render::Json(value)),
        };

        if let Err(e) = result {
            error!("Could not write the response for {}: {}", self.path, e);

            self.fail(400, &e.message);
            match self.take_payload() {
                Some(Payload::Json(envelope)) => self.render(self.status, &render::Json(&envelope))?,
                _ => return Err(e),
            }
        }

        Ok(())
    }

    ///
    /// Commits `code` and renders `r`, unless the code forbids a body, in which case
    /// only the content type and status go out.
    ///
    pub fn render<R: Render + ?Sized>(&mut self, code: u16, r: &R) -> Result<(), Error> {
        self.status = code;
        r.write_content_type(&mut self.writer);

        if !render::body_allowed_for_status(code) {
            self.writer.write_status(code);
            return Ok(());
        }

        self.writer.stage_status(code);
        r.render(&mut self.writer)?;

        if !self.writer.is_committed() {
            self.writer.write_status(code);
        }

        Ok(())
    }

    pub fn xml<T: Serialize>(&mut self, code: u16, data: &T) -> Result<(), Error> {
        self.render(code, &render::Xml(data))
    }

    pub fn redirect(&mut self, code: u16, location: &str) -> Result<(), Error> {
        self.status = code;

        let redirect = render::Redirect {
            code,
            method: &self.method,
            location,
        };

        redirect.render(&mut self.writer)
    }

    pub fn template<T: Serialize>(
        &mut self,
        code: u16,
        filename: impl AsRef<std::path::Path>,
        data: &T,
    ) -> Result<(), Error> {
        self.render(
            code,
            &render::Template {
                filename: filename.as_ref(),
                data,
            },
        )
    }

    /// Writes the `{message, code}` envelope for an error nobody handled.
    pub(crate) fn write_error(&mut self, err: &Error) {
        let _ = self.take_payload();
        self.writer.headers_mut().remove(CONTENT_TYPE);

        let envelope = fail_envelope(&err.message, err.status);
        if let Err(e) = self.render(err.status, &render::Json(&envelope)) {
            error!("Could not write the error response for {}: {}", self.path, e);
        }
    }

    pub fn is_committed(&self) -> bool {
        self.writer.is_committed()
    }

    pub fn writer(&mut self) -> &mut dyn ResponseSink {
        &mut self.writer
    }

    /// Moves the finished response out. An uncommitted response goes out with the buffered status.
    pub fn take_response(&mut self) -> Response<Bytes> {
        if !self.writer.is_committed() {
            self.writer.write_status(self.status);
        }

        self.writer.take_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::middleware::handler;
    use tokio::runtime::Runtime;

    fn context_for(uri: &str) -> Context {
        let mut ctx = Context::new(Arc::new(Config::default()));
        ctx.init(Request::builder().uri(uri).body(Bytes::new()).unwrap());
        ctx
    }

    fn record(name: &'static str) -> Handler {
        handler(move |ctx| {
            Box::pin(async move {
                let log = ctx.values();
                ctx.next().await?;
                push_log(&log, name);
                Ok(())
            })
        })
    }

    fn push_log(values: &ValueStore, name: &'static str) {
        let mut log: Vec<&'static str> = values
            .get_as::<Vec<&'static str>>("log")
            .map(|log| (*log).clone())
            .unwrap_or_default();
        log.push(name);
        values.set("log", log);
    }

    #[test]
    fn it_should_parse_path_and_query_on_init() {
        let ctx = context_for("/users/7?name=ada&name=bob&age=3");

        assert_eq!(ctx.path(), "/users/7");
        assert_eq!(ctx.query("name"), Some("ada"));
        assert_eq!(ctx.query("age"), Some("3"));
        assert_eq!(ctx.index(), -1);
    }

    #[test]
    fn it_should_post_process_in_reverse_order() {
        let mut ctx = context_for("/");

        ctx.push_handler(record("a"));
        ctx.push_handler(record("b"));
        ctx.push_handler(record("c"));

        let flow = Runtime::new().unwrap().block_on(ctx.next()).unwrap();

        assert_eq!(flow, Flow::Completed);
        assert_eq!(
            *ctx.get_as::<Vec<&'static str>>("log").unwrap(),
            vec!["c", "b", "a"]
        );
    }

    #[test]
    fn it_should_stop_after_an_abort() {
        let mut ctx = context_for("/");

        ctx.push_handler(handler(|ctx| {
            Box::pin(async move {
                ctx.abort();
                Ok(())
            })
        }));
        ctx.push_handler(handler(|ctx| {
            Box::pin(async move {
                ctx.set("ran", true);
                Ok(())
            })
        }));

        let flow = Runtime::new().unwrap().block_on(ctx.next()).unwrap();

        assert_eq!(flow, Flow::Aborted);
        assert!(ctx.get("ran").is_none());
        assert_eq!(ctx.index(), ABORT_INDEX);
    }

    #[test]
    fn it_should_treat_next_past_the_end_as_a_noop() {
        let mut ctx = context_for("/");
        let rt = Runtime::new().unwrap();

        assert_eq!(rt.block_on(ctx.next()).unwrap(), Flow::Completed);
        assert_eq!(rt.block_on(ctx.next()).unwrap(), Flow::Completed);
        assert_eq!(ctx.index(), 0);
    }

    #[test]
    fn it_should_refuse_the_reserved_payload_key() {
        let mut ctx = context_for("/");

        ctx.set(PAYLOAD_KEY, 12u8);

        assert!(!ctx.has_payload());
    }

    #[test]
    fn it_should_honor_the_fail_code() {
        let mut ctx = context_for("/");

        ctx.fail(400, "bad request");
        ctx.flush_payload().unwrap();
        let response = ctx.take_response();

        assert_eq!(response.status(), 400);
        let body: JsonValue = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body, json!({"message": "bad request", "code": 400}));
    }

    #[test]
    fn it_should_use_the_legacy_fail_envelope_when_configured() {
        let config = Config::default().with_legacy_fail_envelope(true);
        let mut ctx = Context::new(Arc::new(config));
        ctx.init(Request::builder().uri("/").body(Bytes::new()).unwrap());

        ctx.fail(400, "bad request");
        ctx.flush_payload().unwrap();
        let response = ctx.take_response();

        assert_eq!(response.status(), 500);
        let body: JsonValue = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["code"], 500);
        assert_eq!(body["message"], "bad request");
    }

    #[test]
    fn it_should_suppress_bodies_for_204() {
        let mut ctx = context_for("/");

        ctx.respond_text(204, "nothing to see");
        ctx.flush_payload().unwrap();
        let response = ctx.take_response();

        assert_eq!(response.status(), 204);
        assert!(response.body().is_empty());
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            render::MIME_PLAIN
        );
    }

    #[test]
    fn it_should_forget_everything_on_reset() {
        let mut ctx = context_for("/a?x=1");

        ctx.set("user", "ada");
        ctx.set_params(vec![("id".to_string(), "1".to_string())]);
        ctx.set_header("x-trace", "abc").unwrap();
        ctx.respond_text(201, "made");
        ctx.abort();

        ctx.reset();
        ctx.init(Request::builder().uri("/b").body(Bytes::new()).unwrap());

        assert!(ctx.get("user").is_none());
        assert!(!ctx.has_payload());
        assert!(ctx.param("id").is_none());
        assert!(ctx.query("x").is_none());
        assert!(ctx.response_headers().get("x-trace").is_none());
        assert_eq!(ctx.status(), 200);
        assert_eq!(ctx.index(), -1);
        assert_eq!(ctx.path(), "/b");
    }

    #[test]
    fn it_should_detach_a_store_held_by_a_background_task() {
        let mut ctx = context_for("/");
        let straggler = ctx.values();

        ctx.reset();
        straggler.set("late", 1u8);

        assert!(ctx.get("late").is_none());
    }

    #[test]
    fn it_should_keep_a_content_type_set_by_the_handler() {
        let mut ctx = context_for("/");

        ctx.set_header("content-type", "application/problem+json")
            .unwrap();
        ctx.respond_json(418, &json!({"title": "teapot"}));
        ctx.flush_payload().unwrap();
        let response = ctx.take_response();

        assert_eq!(response.status(), 418);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/problem+json"
        );
    }

    #[test]
    fn it_should_keep_the_first_content_type_across_respond_calls() {
        let mut ctx = context_for("/");

        ctx.respond_bytes(200, "image/png", vec![1u8, 2, 3]);
        ctx.respond_text(200, "overwritten body");
        ctx.flush_payload().unwrap();
        let response = ctx.take_response();

        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "image/png");
        assert_eq!(&response.body()[..], b"overwritten body");
    }

    #[test]
    fn it_should_let_the_fail_envelope_replace_the_content_type() {
        let mut ctx = context_for("/");

        ctx.respond_text(200, "partial");
        ctx.fail(409, "conflict");
        ctx.flush_payload().unwrap();
        let response = ctx.take_response();

        assert_eq!(response.status(), 409);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            render::MIME_JSON
        );
    }

    #[test]
    fn it_should_track_the_status_of_direct_renders() {
        #[derive(Serialize)]
        struct Created {
            id: u32,
        }

        let mut ctx = context_for("/");

        ctx.xml(201, &Created { id: 1 }).unwrap();
        assert_eq!(ctx.status(), 201);

        let mut ctx = context_for("/old");

        ctx.redirect(301, "/new").unwrap();
        assert_eq!(ctx.status(), 301);
        assert_eq!(ctx.take_response().status(), 301);
    }

    #[test]
    fn it_should_reject_invalid_header_names() {
        let mut ctx = context_for("/");

        let err = ctx.set_header("bad header", "x").unwrap_err();

        assert_eq!(err.kind, crate::ErrorKind::Header);
    }
}
