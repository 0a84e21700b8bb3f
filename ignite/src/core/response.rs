use std::io;

use bytes::{BufMut, Bytes, BytesMut};
use http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use http::{Response, StatusCode};

///
/// Everything a renderer is allowed to do to a response: touch the headers,
/// commit a status and append body bytes.
///
pub trait ResponseSink: Send {
    fn headers(&self) -> &HeaderMap;

    fn headers_mut(&mut self) -> &mut HeaderMap;

    fn write_status(&mut self, code: u16);

    fn write_body(&mut self, bytes: &[u8]) -> io::Result<usize>;

    fn is_committed(&self) -> bool;

    /// Sets the content type unless one is already present.
    fn set_content_type(&mut self, content_type: &'static str) {
        if !self.headers().contains_key(CONTENT_TYPE) {
            self.headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
    }
}

///
/// The buffered writer owned by every `Context`. Nothing leaves the process until the
/// engine calls `take_response` after the chain unwinds.
///
pub struct ResponseWriter {
    status: u16,
    headers: HeaderMap,
    body: BytesMut,
    committed: bool,
}

impl Default for ResponseWriter {
    fn default() -> Self {
        ResponseWriter {
            status: 200,
            headers: HeaderMap::new(),
            body: BytesMut::new(),
            committed: false,
        }
    }
}

impl ResponseWriter {
    pub fn new() -> ResponseWriter {
        ResponseWriter::default()
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Sets the status the next body write commits, unless a status is already committed.
    pub fn stage_status(&mut self, code: u16) {
        if !self.committed {
            self.status = code;
        }
    }

    pub fn reset(&mut self) {
        self.status = 200;
        self.headers.clear();
        self.body.clear();
        self.committed = false;
    }

    ///
    /// Moves the buffered status, headers and body out, leaving the writer empty.
    /// An invalid status falls back to 500.
    ///
    pub fn take_response(&mut self) -> Response<Bytes> {
        let mut response = Response::new(self.body.split().freeze());

        *response.status_mut() =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        *response.headers_mut() = std::mem::take(&mut self.headers);

        self.status = 200;
        self.committed = false;

        response
    }
}

impl ResponseSink for ResponseWriter {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_status(&mut self, code: u16) {
        if self.committed {
            warn!(
                "Status already committed as {}, ignoring the attempt to write {}",
                self.status, code
            );
            return;
        }

        self.status = code;
        self.committed = true;
    }

    fn write_body(&mut self, bytes: &[u8]) -> io::Result<usize> {
        if !self.committed {
            self.committed = true;
        }

        self.body.put_slice(bytes);

        Ok(bytes.len())
    }

    fn is_committed(&self) -> bool {
        self.committed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_should_keep_the_first_status() {
        let mut writer = ResponseWriter::new();

        writer.write_status(201);
        writer.write_status(500);

        assert_eq!(writer.status(), 201);
        assert!(writer.is_committed());
    }

    #[test]
    fn it_should_keep_the_first_content_type() {
        let mut writer = ResponseWriter::new();

        writer.set_content_type("text/plain; charset=utf-8");
        writer.set_content_type("application/json; charset=utf-8");

        assert_eq!(
            writer.headers().get(CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn it_should_empty_itself_when_taken() {
        let mut writer = ResponseWriter::new();

        writer.write_status(404);
        writer.write_body(b"gone").unwrap();
        writer.set_content_type("text/plain; charset=utf-8");

        let response = writer.take_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(&response.body()[..], b"gone");
        assert!(writer.body().is_empty());
        assert!(writer.headers().is_empty());
        assert!(!writer.is_committed());
    }
}
