use crate::core::errors::Error;
use crate::core::response::ResponseSink;

mod json;
mod redirect;
mod template;
mod text;
mod xml;

pub use self::json::Json;
pub use self::redirect::Redirect;
pub use self::template::Template;
pub use self::text::{Html, Raw, Text};
pub use self::xml::Xml;

pub const MIME_JSON: &str = "application/json; charset=utf-8";
pub const MIME_HTML: &str = "text/html; charset=utf-8";
pub const MIME_PLAIN: &str = "text/plain; charset=utf-8";
pub const MIME_XML: &str = "application/xml; charset=utf-8";
pub const MIME_OCTET_STREAM: &str = "application/octet-stream";

///
/// A response body encoder. Implementations only carry the data they write and
/// never look at the request.
///
pub trait Render {
    /// Sets the content type of this body, leaving an existing one alone.
    fn write_content_type(&self, sink: &mut dyn ResponseSink);

    fn render(&self, sink: &mut dyn ResponseSink) -> Result<(), Error>;
}

/// Informational codes, 204 and 304 never carry a body.
pub fn body_allowed_for_status(code: u16) -> bool {
    !matches!(code, 100..=199 | 204 | 304)
}

fn write_all(sink: &mut dyn ResponseSink, bytes: &[u8]) -> Result<(), Error> {
    sink.write_body(bytes)
        .map(|_| ())
        .map_err(|e| Error::render(e.to_string()).with_cause(e))
}
