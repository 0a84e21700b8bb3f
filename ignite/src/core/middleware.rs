use std::sync::Arc;

pub use futures::future::BoxFuture;

use crate::core::context::Context;
use crate::core::errors::Error;
use ignite_proc::middleware_fn;

pub type MiddlewareResult = Result<(), Error>;
pub type ChainResult = Result<Flow, Error>;

///
/// A step of the chain. Handlers get the context for the duration of their future
/// and call `ctx.next().await` to run everything registered after them.
///
pub type Handler =
    Arc<dyn for<'a> Fn(&'a mut Context) -> BoxFuture<'a, MiddlewareResult> + Send + Sync>;

/// Cursor value marking an aborted chain. Far beyond any realistic chain length.
pub const ABORT_INDEX: i32 = i32::MAX / 2;

/// How a chain run ended when no handler failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Completed,
    Aborted,
}

///
/// Wraps a function or closure into a `Handler`.
///
/// ```rust, ignore
/// let h = handler(|ctx| {
///     Box::pin(async move {
///         ctx.respond_text(200, "hi");
///         Ok(())
///     })
/// });
/// ```
///
pub fn handler<F>(f: F) -> Handler
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, MiddlewareResult> + Send + Sync + 'static,
{
    Arc::new(f)
}

///
/// The outermost step of every chain. Lets the rest of the chain run, then writes
/// whatever payload the handlers buffered. A failed chain is left untouched so the
/// engine can decide how to report it.
///
#[middleware_fn(_internal)]
pub async fn finalize(ctx: &mut Context) -> MiddlewareResult {
    ctx.next().await?;
    ctx.flush_payload()?;

    Ok(())
}
