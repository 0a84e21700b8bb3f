use http::header::{HeaderValue, CONTENT_TYPE};

use super::{write_all, Render, MIME_HTML, MIME_PLAIN};
use crate::core::errors::Error;
use crate::core::response::ResponseSink;

pub struct Text<'a>(pub &'a str);

impl Render for Text<'_> {
    fn write_content_type(&self, sink: &mut dyn ResponseSink) {
        sink.set_content_type(MIME_PLAIN);
    }

    fn render(&self, sink: &mut dyn ResponseSink) -> Result<(), Error> {
        write_all(sink, self.0.as_bytes())
    }
}

pub struct Html<'a>(pub &'a str);

impl Render for Html<'_> {
    fn write_content_type(&self, sink: &mut dyn ResponseSink) {
        sink.set_content_type(MIME_HTML);
    }

    fn render(&self, sink: &mut dyn ResponseSink) -> Result<(), Error> {
        write_all(sink, self.0.as_bytes())
    }
}

/// Bytes written verbatim, with an optional content type.
pub struct Raw<'a> {
    pub content_type: Option<HeaderValue>,
    pub data: &'a [u8],
}

impl<'a> Raw<'a> {
    pub fn new(data: &'a [u8]) -> Raw<'a> {
        Raw {
            content_type: None,
            data,
        }
    }

    pub fn with_content_type(mut self, content_type: HeaderValue) -> Raw<'a> {
        self.content_type = Some(content_type);
        self
    }
}

impl Render for Raw<'_> {
    fn write_content_type(&self, sink: &mut dyn ResponseSink) {
        if let Some(content_type) = &self.content_type {
            if !sink.headers().contains_key(CONTENT_TYPE) {
                sink.headers_mut().insert(CONTENT_TYPE, content_type.clone());
            }
        }
    }

    fn render(&self, sink: &mut dyn ResponseSink) -> Result<(), Error> {
        write_all(sink, self.data)
    }
}
