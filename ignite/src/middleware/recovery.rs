use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use crate::core::context::Context;
use crate::core::middleware::MiddlewareResult;
use ignite_proc::middleware_fn;

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

///
/// Turns a panic anywhere further down the chain into a 500 envelope.
///
#[middleware_fn(_internal)]
pub async fn recovery(ctx: &mut Context) -> MiddlewareResult {
    let outcome = AssertUnwindSafe(ctx.next()).catch_unwind().await;

    match outcome {
        Ok(result) => {
            result?;
        }
        Err(panic) => {
            error!(
                "Recovered from a panic on {}: {}",
                ctx.path(),
                panic_message(panic.as_ref())
            );
            ctx.fail(500, "Internal Server Error");
        }
    }

    Ok(())
}
