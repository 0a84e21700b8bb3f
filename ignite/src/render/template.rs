use std::fs;
use std::path::Path;

use minijinja::syntax::SyntaxConfig;
use minijinja::Environment;
use serde::Serialize;

use super::{write_all, Render, MIME_HTML};
use crate::core::errors::Error;
use crate::core::response::ResponseSink;

///
/// A template file rendered against `data`. Variables use `[[ ]]`, blocks `[% %]`
/// and comments `[# #]`. Files ending in `.html` get their variables escaped.
///
pub struct Template<'a, T: Serialize> {
    pub filename: &'a Path,
    pub data: &'a T,
}

fn syntax() -> Result<SyntaxConfig, Error> {
    Ok(SyntaxConfig::builder()
        .block_delimiters("[%", "%]")
        .variable_delimiters("[[", "]]")
        .comment_delimiters("[#", "#]")
        .build()?)
}

impl<T: Serialize> Template<'_, T> {
    pub fn render_string(&self) -> Result<String, Error> {
        let name = self.filename.to_string_lossy();
        let source = fs::read_to_string(self.filename).map_err(|e| {
            Error::render(format!("Could not read template '{}': {}", name, e)).with_cause(e)
        })?;

        let mut env = Environment::new();
        env.set_syntax(syntax()?);
        env.add_template(&name, &source)?;

        Ok(env.get_template(&name)?.render(self.data)?)
    }
}

impl<T: Serialize> Render for Template<'_, T> {
    fn write_content_type(&self, sink: &mut dyn ResponseSink) {
        sink.set_content_type(MIME_HTML);
    }

    fn render(&self, sink: &mut dyn ResponseSink) -> Result<(), Error> {
        let body = self.render_string()?;

        write_all(sink, body.as_bytes())
    }
}
