use serde::Serialize;

use super::{write_all, Render, MIME_JSON};
use crate::core::errors::Error;
use crate::core::response::ResponseSink;

pub struct Json<'a, T: Serialize + ?Sized>(pub &'a T);

impl<T: Serialize + ?Sized> Render for Json<'_, T> {
    fn write_content_type(&self, sink: &mut dyn ResponseSink) {
        sink.set_content_type(MIME_JSON);
    }

    fn render(&self, sink: &mut dyn ResponseSink) -> Result<(), Error> {
        let bytes = serde_json::to_vec(self.0)
            .map_err(|e| Error::render(format!("Could not encode JSON: {}", e)).with_cause(e))?;

        write_all(sink, &bytes)
    }
}
