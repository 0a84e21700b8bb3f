use std::time::Instant;

use crate::core::context::Context;
use crate::core::middleware::MiddlewareResult;
use ignite_proc::middleware_fn;

///
/// Logs status, uri and the time spent in the rest of the chain once it unwinds.
///
#[middleware_fn(_internal)]
pub async fn logger(ctx: &mut Context) -> MiddlewareResult {
    let start_time = Instant::now();

    let result = ctx.next().await;

    let status = match &result {
        Ok(_) => ctx.status(),
        Err(e) => e.status,
    };
    let elapsed_time = start_time.elapsed();
    info!(
        "[{}] {} in {}μs",
        status,
        ctx.request().uri(),
        elapsed_time.as_micros()
    );

    result?;

    Ok(())
}
