use log::info;
use serde_derive::{Deserialize, Serialize};

use ignite::middleware::logger;
use ignite::{
    middleware_fn, Config, Context, Engine, HyperServer, IgniteServer, MiddlewareResult, Rule,
    RuleSet, Validate, Violation,
};

#[derive(Debug, Deserialize, Serialize)]
struct Item {
    name: String,
    kind: String,
}

impl Validate for Item {
    fn validate(&self) -> Vec<Violation> {
        RuleSet::new()
            .field(
                "name",
                |i: &Item| Some(i.name.as_str()),
                vec![Rule::Required, Rule::MaxLen(64)],
            )
            .field(
                "kind",
                |i: &Item| Some(i.kind.as_str()),
                vec![Rule::OneOf(vec!["book".to_string(), "game".to_string()])],
            )
            .check(self)
    }
}

#[middleware_fn]
async fn auth(ctx: &mut Context) -> MiddlewareResult {
    if ctx.header("authorization") != Some("Bearer letmein") {
        ctx.fail(401, "Unauthorized");
    }

    ctx.next().await?;
    Ok(())
}

#[middleware_fn]
async fn create_item(ctx: &mut Context) -> MiddlewareResult {
    let item: Item = ctx.bind_valid().await?;
    ctx.respond_json(201, &item);
    Ok(())
}

#[middleware_fn]
async fn upload(ctx: &mut Context) -> MiddlewareResult {
    let file = ctx.form_file("file").await?;
    let dst = std::env::temp_dir().join(&file.filename);
    ctx.save_uploaded_file(&file, &dst).await?;
    ctx.respond_text(200, format!("saved {} bytes to {}", file.len(), dst.display()));
    Ok(())
}

#[middleware_fn]
async fn status(ctx: &mut Context) -> MiddlewareResult {
    ctx.success(&"ok");
    Ok(())
}

#[middleware_fn]
async fn legacy(ctx: &mut Context) -> MiddlewareResult {
    ctx.redirect(301, "/v1/status")?;
    Ok(())
}

fn main() -> std::io::Result<()> {
    env_logger::init();
    info!("Starting server...");

    let mut engine = Engine::new(Config::from_env());
    engine.use_middleware(logger);
    engine.get("/status", legacy);

    let mut v1 = engine.group("/v1");
    v1.get("/status", status);

    let mut admin = v1.group("/admin");
    admin.use_middleware(auth);
    admin.post("/items", create_item).post("/upload", upload);

    HyperServer::new(engine).start("0.0.0.0", 4321)
}
