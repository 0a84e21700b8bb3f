#[macro_use]
extern crate templatify;

#[macro_use]
extern crate log;

mod app;
mod config;
mod core;
mod server;

pub mod binding;
pub mod middleware;
pub mod render;
pub mod validate;

pub use crate::app::testing;
pub use crate::app::{Engine, Router, RouterGroup};
pub use crate::config::Config;
pub use crate::core::context::Context;
pub use crate::core::errors::{self, Error, ErrorKind, ErrorSet};
pub use crate::core::payload::{Payload, PAYLOAD_KEY};
pub use crate::core::pool::ContextPool;
pub use crate::core::response::{ResponseSink, ResponseWriter};
pub use crate::core::values::{Value, ValueStore};
pub use crate::core::{
    finalize, handler, BoxFuture, ChainResult, Flow, Handler, MiddlewareResult, ABORT_INDEX,
};

pub use crate::binding::{Binding, MultipartForm, UploadedFile};
pub use crate::validate::{Rule, RuleSet, Validate, Violation};

pub use server::*;

pub use ignite_proc::*;
