use std::error::Error as StdError;
use std::fmt;
use std::io;

use crate::validate::Violation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed query string, body or form.
    Decode,
    /// I/O while handling an upload.
    Io,
    /// The response could not be produced (bad redirect code, template, serialization).
    Render,
    /// The decoded payload broke one or more validation rules.
    Validation,
    /// A response header name or value was not valid HTTP.
    Header,
    NotFound,
    Unauthorized,
    Generic,
}

///
/// The one error type of the request core. Every error carries the status code the
/// engine uses when it has to turn the error into a response itself.
///
pub struct Error {
    pub kind: ErrorKind,
    pub status: u16,
    pub message: String,
    pub violations: Vec<Violation>,
    pub cause: Option<Box<dyn StdError + Send + Sync>>,
}

pub trait ErrorSet {
    fn parsing_error(error: &str) -> Self;
    fn generic_error() -> Self;
    fn unauthorized_error() -> Self;
    fn not_found_error() -> Self;
}

impl ErrorSet for Error {
    fn parsing_error(error: &str) -> Error {
        Error::new(ErrorKind::Decode, 400, format!("Failed to parse '{}'", error))
    }

    fn generic_error() -> Error {
        Error::new(ErrorKind::Generic, 400, "Something didn't work!")
    }

    fn unauthorized_error() -> Error {
        Error::new(ErrorKind::Unauthorized, 401, "Unauthorized")
    }

    fn not_found_error() -> Error {
        Error::new(ErrorKind::NotFound, 404, "Not found")
    }
}

impl Error {
    pub fn new(kind: ErrorKind, status: u16, message: impl Into<String>) -> Error {
        Error {
            kind,
            status,
            message: message.into(),
            violations: Vec::new(),
            cause: None,
        }
    }

    pub fn decode(message: impl Into<String>) -> Error {
        Error::new(ErrorKind::Decode, 400, message)
    }

    pub fn io(error: io::Error) -> Error {
        Error::new(ErrorKind::Io, 400, error.to_string()).with_cause(error)
    }

    pub fn render(message: impl Into<String>) -> Error {
        Error::new(ErrorKind::Render, 500, message)
    }

    pub fn header(message: impl Into<String>) -> Error {
        Error::new(ErrorKind::Header, 500, message)
    }

    pub fn validation(violations: Vec<Violation>) -> Error {
        let message = violations
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("; ");

        Error {
            kind: ErrorKind::Validation,
            status: 422,
            message,
            violations,
            cause: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Error {
        self.status = status;
        self
    }

    pub fn with_cause<E: StdError + Send + Sync + 'static>(mut self, cause: E) -> Error {
        self.cause = Some(Box::new(cause));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("kind", &self.kind)
            .field("status", &self.status)
            .field("message", &self.message)
            .finish()
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_ref()
            .map(|cause| cause.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::decode(e.to_string()).with_cause(e)
    }
}

impl From<serde_urlencoded::de::Error> for Error {
    fn from(e: serde_urlencoded::de::Error) -> Self {
        Error::decode(e.to_string()).with_cause(e)
    }
}

impl From<multer::Error> for Error {
    fn from(e: multer::Error) -> Self {
        Error::decode(e.to_string()).with_cause(e)
    }
}

impl From<minijinja::Error> for Error {
    fn from(e: minijinja::Error) -> Self {
        Error::render(e.to_string()).with_cause(e)
    }
}

impl From<http::Error> for Error {
    fn from(e: http::Error) -> Self {
        Error::render(e.to_string()).with_cause(e)
    }
}
