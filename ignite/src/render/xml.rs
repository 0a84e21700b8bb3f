use serde::Serialize;

use super::{write_all, Render, MIME_XML};
use crate::core::errors::Error;
use crate::core::response::ResponseSink;

/// XML body, the root element takes the name of the serialized type.
pub struct Xml<'a, T: Serialize>(pub &'a T);

impl<T: Serialize> Render for Xml<'_, T> {
    fn write_content_type(&self, sink: &mut dyn ResponseSink) {
        sink.set_content_type(MIME_XML);
    }

    fn render(&self, sink: &mut dyn ResponseSink) -> Result<(), Error> {
        let body = quick_xml::se::to_string(self.0)
            .map_err(|e| Error::render(format!("Could not encode XML: {}", e)))?;

        write_all(sink, body.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::response::ResponseWriter;
    use serde_derive::Serialize;

    #[derive(Serialize)]
    struct Greeting {
        name: String,
    }

    #[test]
    fn it_should_name_the_root_after_the_type() {
        let mut writer = ResponseWriter::new();
        let greeting = Greeting {
            name: "ada".to_string(),
        };

        Xml(&greeting).render(&mut writer).unwrap();

        assert_eq!(
            std::str::from_utf8(writer.body()).unwrap(),
            "<Greeting><name>ada</name></Greeting>"
        );
    }
}
