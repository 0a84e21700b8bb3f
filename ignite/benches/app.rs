#[macro_use]
extern crate criterion;

use bytes::Bytes;
use criterion::Criterion;
use http::Request;
use tokio::runtime::Runtime;

use ignite::middleware::logger;
use ignite::{middleware_fn, Config, Context, Engine, MiddlewareResult};

#[middleware_fn]
async fn plaintext(ctx: &mut Context) -> MiddlewareResult {
    ctx.respond_text(200, "world");
    Ok(())
}

#[middleware_fn]
async fn echo_param(ctx: &mut Context) -> MiddlewareResult {
    let body = ctx.param("hello").unwrap_or("").to_string();
    ctx.respond_text(200, body);
    Ok(())
}

#[middleware_fn]
async fn echo_query(ctx: &mut Context) -> MiddlewareResult {
    let body = ctx.query("hello").unwrap_or("").to_string();
    ctx.respond_text(200, body);
    Ok(())
}

#[middleware_fn]
async fn json(ctx: &mut Context) -> MiddlewareResult {
    ctx.success(&"world");
    Ok(())
}

fn request(uri: &str) -> Request<Bytes> {
    Request::get(uri).body(Bytes::new()).unwrap()
}

fn bench_route_match(c: &mut Criterion) {
    c.bench_function("Route match", |bench| {
        let rt = Runtime::new().unwrap();
        let mut engine = Engine::new(Config::default());
        engine.get("/test/hello", plaintext);

        bench.iter(|| {
            let _response = rt.block_on(engine.handle(request("/test/hello")));
        });
    });
}

fn bench_route_match_with_param(c: &mut Criterion) {
    c.bench_function("Route match with route params", |bench| {
        let rt = Runtime::new().unwrap();
        let mut engine = Engine::new(Config::default());
        engine.get("/test/:hello", echo_param);

        bench.iter(|| {
            let _response = rt.block_on(engine.handle(request("/test/world")));
        });
    });
}

fn bench_route_match_with_query_param(c: &mut Criterion) {
    c.bench_function("Route match with query params", |bench| {
        let rt = Runtime::new().unwrap();
        let mut engine = Engine::new(Config::default());
        engine.get("/test", echo_query);

        bench.iter(|| {
            let _response = rt.block_on(engine.handle(request("/test?hello=world")));
        });
    });
}

fn bench_grouped_json(c: &mut Criterion) {
    c.bench_function("Grouped middleware with JSON envelope", |bench| {
        let rt = Runtime::new().unwrap();
        let mut engine = Engine::new(Config::default());
        engine.group("/api").use_middleware(logger).get("/json", json);

        bench.iter(|| {
            let _response = rt.block_on(engine.handle(request("/api/json")));
        });
    });
}

criterion_group!(
    benches,
    bench_route_match,
    bench_route_match_with_param,
    bench_route_match_with_query_param,
    bench_grouped_json
);
criterion_main!(benches);
