use log::info;

use ignite::middleware::{logger, recovery};
use ignite::{middleware_fn, Config, Context, Engine, HyperServer, IgniteServer, MiddlewareResult};

#[middleware_fn]
async fn plaintext(ctx: &mut Context) -> MiddlewareResult {
    ctx.respond_text(200, "Hello, World!");
    Ok(())
}

#[middleware_fn]
async fn greet(ctx: &mut Context) -> MiddlewareResult {
    let name = ctx.param("name").unwrap_or("stranger").to_string();
    ctx.success(&format!("Hello, {}!", name));
    Ok(())
}

fn main() -> std::io::Result<()> {
    env_logger::init();
    info!("Starting server...");

    let mut engine = Engine::new(Config::from_env());

    engine.use_middleware(logger).use_middleware(recovery);
    engine.get("/plaintext", plaintext);
    engine.get("/hello/:name", greet);

    let server = HyperServer::new(engine);
    server.start("0.0.0.0", 4321)
}
