pub mod context;
pub mod errors;
pub mod middleware;
pub mod payload;
pub mod pool;
pub mod response;
pub mod values;

pub use self::middleware::{
    finalize, handler, BoxFuture, ChainResult, Flow, Handler, MiddlewareResult, ABORT_INDEX,
};
