use std::path::Path;

use bytes::Bytes;
use fnv::FnvHashSet;
use http::Method;
use serde::de::DeserializeOwned;

use crate::core::context::Context;
use crate::core::errors::Error;
use crate::validate::Validate;

pub mod multipart;

pub use self::multipart::{MultipartForm, UploadedFile};

/// Where `Context::bind` reads its data from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Query,
    Json,
    Form,
    FormMultipart,
}

impl Binding {
    ///
    /// GET requests bind the query string. Anything else goes by content type,
    /// falling back to a url-encoded form.
    ///
    pub fn for_request(method: &Method, content_type: &str) -> Binding {
        if method == Method::GET {
            return Binding::Query;
        }

        match content_type {
            "application/json" => Binding::Json,
            "multipart/form-data" => Binding::FormMultipart,
            _ => Binding::Form,
        }
    }
}

fn body_pairs(body: &Bytes) -> Result<Vec<(String, String)>, Error> {
    if body.is_empty() {
        return Ok(Vec::new());
    }

    Ok(serde_urlencoded::from_bytes(body)?)
}

/// Keeps the first value of every key, in order of appearance.
fn first_wins<'a>(
    pairs: impl IntoIterator<Item = &'a (String, String)>,
) -> Vec<(&'a str, &'a str)> {
    let mut seen = FnvHashSet::default();

    pairs
        .into_iter()
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .filter(|(key, _)| seen.insert(*key))
        .collect()
}

fn decode_pairs<T: DeserializeOwned>(pairs: &[(&str, &str)]) -> Result<T, Error> {
    let encoded = serde_urlencoded::to_string(pairs)
        .map_err(|e| Error::decode(e.to_string()).with_cause(e))?;

    Ok(serde_urlencoded::from_str(&encoded)?)
}

impl Context {
    pub fn json_parse<T: DeserializeOwned>(&self) -> Result<T, Error> {
        Ok(serde_json::from_slice(self.body())?)
    }

    pub fn bind_json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        self.json_parse()
    }

    pub fn bind_query<T: DeserializeOwned>(&self) -> Result<T, Error> {
        decode_pairs(&first_wins(self.query_pairs()))
    }

    /// Url-encoded body fields only.
    pub fn bind_form_post<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let body = body_pairs(self.body())?;

        decode_pairs(&first_wins(&body))
    }

    /// Url-encoded body fields, then query fields. The first value of a key wins.
    pub fn bind_form<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let body = body_pairs(self.body())?;

        decode_pairs(&first_wins(body.iter().chain(self.query_pairs())))
    }

    pub async fn bind_form_multipart<T: DeserializeOwned>(&mut self) -> Result<T, Error> {
        let form = self.multipart_form().await?;

        decode_pairs(&first_wins(&form.fields))
    }

    /// Binds with whatever `Binding::for_request` picks for this request.
    pub async fn bind<T: DeserializeOwned>(&mut self) -> Result<T, Error> {
        match Binding::for_request(self.method(), self.content_type()) {
            Binding::Query => self.bind_query(),
            Binding::Json => self.bind_json(),
            Binding::Form => self.bind_form(),
            Binding::FormMultipart => self.bind_form_multipart().await,
        }
    }

    pub async fn bind_valid<T: DeserializeOwned + Validate>(&mut self) -> Result<T, Error> {
        let value: T = self.bind().await?;
        let violations = value.validate();

        if violations.is_empty() {
            Ok(value)
        } else {
            Err(Error::validation(violations))
        }
    }

    /// A field of a url-encoded or an already parsed multipart body.
    pub fn post_form(&self, key: &str) -> Option<String> {
        if let Some(form) = &self.multipart {
            return form.value(key).map(str::to_string);
        }

        body_pairs(self.body())
            .ok()?
            .into_iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    /// Parses the multipart body on first use and keeps it for the rest of the request.
    pub async fn multipart_form(&mut self) -> Result<&MultipartForm, Error> {
        let form = match self.multipart.take() {
            Some(form) => form,
            None => {
                let content_type = self.header("content-type").unwrap_or("").to_string();
                let max_memory = self.config().max_multipart_memory;

                MultipartForm::parse(self.body().clone(), &content_type, max_memory).await?
            }
        };

        Ok(self.multipart.insert(form))
    }

    pub async fn form_file(&mut self, name: &str) -> Result<UploadedFile, Error> {
        self.multipart_form()
            .await?
            .file(name)
            .cloned()
            .ok_or_else(|| Error::decode(format!("No file uploaded as '{}'", name)))
    }

    pub async fn save_uploaded_file(
        &self,
        file: &UploadedFile,
        dst: impl AsRef<Path>,
    ) -> Result<(), Error> {
        tokio::fs::write(dst, &file.data).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::validate::{Rule, RuleSet, Violation};
    use http::Request;
    use serde_derive::Deserialize;
    use std::sync::Arc;
    use tokio::runtime::Runtime;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Person {
        id: String,
        name: String,
    }

    impl Validate for Person {
        fn validate(&self) -> Vec<Violation> {
            RuleSet::new()
                .field("name", |p: &Person| Some(p.name.as_str()), vec![Rule::MinLen(2)])
                .check(self)
        }
    }

    fn context(method: Method, uri: &str, content_type: &str, body: &str) -> Context {
        let mut ctx = Context::new(Arc::new(Config::default()));
        ctx.init(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", content_type)
                .body(Bytes::from(body.to_string()))
                .unwrap(),
        );
        ctx
    }

    #[test]
    fn it_should_pick_the_binding_from_method_and_content_type() {
        assert_eq!(Binding::for_request(&Method::GET, "application/json"), Binding::Query);
        assert_eq!(Binding::for_request(&Method::POST, "application/json"), Binding::Json);
        assert_eq!(
            Binding::for_request(&Method::PUT, "multipart/form-data"),
            Binding::FormMultipart
        );
        assert_eq!(Binding::for_request(&Method::POST, "text/plain"), Binding::Form);
    }

    #[test]
    fn it_should_bind_a_json_body() {
        let mut ctx = context(
            Method::POST,
            "/people",
            "application/json; charset=utf-8",
            r#"{"id":"7","name":"x"}"#,
        );

        let person: Person = Runtime::new().unwrap().block_on(ctx.bind()).unwrap();

        assert_eq!(
            person,
            Person {
                id: "7".to_string(),
                name: "x".to_string()
            }
        );
    }

    #[test]
    fn it_should_prefer_body_fields_over_query_fields() {
        let mut ctx = context(
            Method::POST,
            "/people?id=1&name=query&name=again",
            "application/x-www-form-urlencoded",
            "name=body",
        );

        let person: Person = Runtime::new().unwrap().block_on(ctx.bind()).unwrap();

        assert_eq!(person.id, "1");
        assert_eq!(person.name, "body");
        assert_eq!(ctx.post_form("name").as_deref(), Some("body"));
    }

    #[test]
    fn it_should_bind_the_query_for_get() {
        let ctx = context(Method::GET, "/people?id=2&name=ada&id=3", "", "");

        let person: Person = ctx.bind_query().unwrap();

        assert_eq!(person.id, "2");
        assert_eq!(person.name, "ada");
    }

    #[test]
    fn it_should_report_malformed_json_as_a_decode_error() {
        let ctx = context(Method::POST, "/", "application/json", "{\"id\":");

        let err = ctx.bind_json::<Person>().unwrap_err();

        assert_eq!(err.kind, crate::ErrorKind::Decode);
        assert_eq!(err.status, 400);
    }

    #[test]
    fn it_should_validate_after_binding() {
        let mut ctx = context(
            Method::POST,
            "/",
            "application/json",
            r#"{"id":"7","name":"x"}"#,
        );

        let err = Runtime::new()
            .unwrap()
            .block_on(ctx.bind_valid::<Person>())
            .unwrap_err();

        assert_eq!(err.status, 422);
        assert_eq!(err.violations.len(), 1);
        assert_eq!(err.violations[0].field, "name");
    }

    #[test]
    fn it_should_save_an_uploaded_file() {
        let boundary = "XYZ";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"id\"\r\n\r\n9\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nada\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"doc\"; filename=\"d.txt\"\r\n\r\nhello\r\n\
             --{b}--\r\n",
            b = boundary
        );
        let mut ctx = context(
            Method::POST,
            "/upload",
            "multipart/form-data; boundary=XYZ",
            &body,
        );
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("saved.txt");

        Runtime::new().unwrap().block_on(async {
            let person: Person = ctx.bind().await.unwrap();
            assert_eq!(person.id, "9");

            let file = ctx.form_file("doc").await.unwrap();
            ctx.save_uploaded_file(&file, &dst).await.unwrap();

            assert!(ctx.form_file("missing").await.is_err());
        });

        assert_eq!(std::fs::read_to_string(&dst).unwrap(), "hello");
        assert_eq!(ctx.post_form("name").as_deref(), Some("ada"));
    }
}
