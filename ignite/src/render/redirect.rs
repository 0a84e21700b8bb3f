use http::header::{HeaderValue, CONTENT_TYPE, LOCATION};
use http::{Method, StatusCode};

use super::{write_all, Render, MIME_HTML};
use crate::core::errors::Error;
use crate::core::response::ResponseSink;

pub struct Redirect<'a> {
    pub code: u16,
    pub method: &'a Method,
    pub location: &'a str,
}

fn is_redirect_code(code: u16) -> bool {
    (300..=308).contains(&code) || code == 201
}

fn html_escape(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());

    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }

    escaped
}

impl Render for Redirect<'_> {
    // The content type depends on the request method, so `render` handles it.
    fn write_content_type(&self, _sink: &mut dyn ResponseSink) {}

    fn render(&self, sink: &mut dyn ResponseSink) -> Result<(), Error> {
        if !is_redirect_code(self.code) {
            return Err(Error::render(format!(
                "Cannot redirect with status code {}",
                self.code
            )));
        }

        let location = HeaderValue::from_str(self.location).map_err(|e| {
            Error::header(format!("Invalid redirect location '{}'", self.location)).with_cause(e)
        })?;
        sink.headers_mut().insert(LOCATION, location);

        let had_content_type = sink.headers().contains_key(CONTENT_TYPE);
        let is_get = self.method == Method::GET;

        if !had_content_type && (is_get || self.method == Method::HEAD) {
            sink.set_content_type(MIME_HTML);
        }

        sink.write_status(self.code);

        if !had_content_type && is_get {
            let reason = StatusCode::from_u16(self.code)
                .ok()
                .and_then(|status| status.canonical_reason())
                .unwrap_or("");
            let body = format!(
                "<a href=\"{}\">{}</a>.\n\n",
                html_escape(self.location),
                reason
            );

            write_all(sink, body.as_bytes())?;
        }

        Ok(())
    }
}
