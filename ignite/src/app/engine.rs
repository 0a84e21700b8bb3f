use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use bytes::Bytes;
use futures::FutureExt;
use http::{Method, Request, Response};

use crate::app::router::Router;
use crate::config::Config;
use crate::core::context::Context;
use crate::core::middleware::{finalize, handler, BoxFuture, Handler, MiddlewareResult};
use crate::core::pool::ContextPool;

struct Group {
    prefix: String,
    middlewares: Vec<Handler>,
    parent: Option<usize>,
}

///
/// The entry point of an ignite application. Routes and middleware are registered
/// through `&mut Engine`, then the engine is usually moved behind an `Arc` and
/// handed to a server, which calls `handle` for every request.
///
/// ```rust, ignore
/// let mut engine = Engine::new(Config::default());
///
/// engine.use_middleware(logger);
/// engine.get("/hello/:name", hello);
///
/// let mut api = engine.group("/api");
/// api.use_middleware(auth);
/// api.post("/items", create_item);
/// ```
///
pub struct Engine {
    config: Arc<Config>,
    router: Router,
    groups: Vec<Group>,
    pool: ContextPool,
    finalizer: Handler,
}

impl Engine {
    pub fn new(config: Config) -> Engine {
        let config = Arc::new(config);

        Engine {
            pool: ContextPool::new(config.clone()),
            config,
            router: Router::new(),
            groups: vec![Group {
                prefix: String::new(),
                middlewares: Vec::new(),
                parent: None,
            }],
            finalizer: handler(finalize),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pool(&self) -> &ContextPool {
        &self.pool
    }

    /// Middleware that runs for every request, in registration order.
    pub fn use_middleware<F>(&mut self, f: F) -> &mut Engine
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, MiddlewareResult> + Send + Sync + 'static,
    {
        self.groups[0].middlewares.push(handler(f));
        self
    }

    pub fn route<F>(&mut self, method: Method, pattern: &str, f: F) -> &mut Engine
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, MiddlewareResult> + Send + Sync + 'static,
    {
        self.router.register(method, pattern, handler(f));
        self
    }

    pub fn get<F>(&mut self, pattern: &str, f: F) -> &mut Engine
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, MiddlewareResult> + Send + Sync + 'static,
    {
        self.route(Method::GET, pattern, f)
    }

    pub fn post<F>(&mut self, pattern: &str, f: F) -> &mut Engine
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, MiddlewareResult> + Send + Sync + 'static,
    {
        self.route(Method::POST, pattern, f)
    }

    pub fn put<F>(&mut self, pattern: &str, f: F) -> &mut Engine
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, MiddlewareResult> + Send + Sync + 'static,
    {
        self.route(Method::PUT, pattern, f)
    }

    pub fn delete<F>(&mut self, pattern: &str, f: F) -> &mut Engine
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, MiddlewareResult> + Send + Sync + 'static,
    {
        self.route(Method::DELETE, pattern, f)
    }

    pub fn patch<F>(&mut self, pattern: &str, f: F) -> &mut Engine
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, MiddlewareResult> + Send + Sync + 'static,
    {
        self.route(Method::PATCH, pattern, f)
    }

    pub fn options<F>(&mut self, pattern: &str, f: F) -> &mut Engine
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, MiddlewareResult> + Send + Sync + 'static,
    {
        self.route(Method::OPTIONS, pattern, f)
    }

    /// Replaces the default `404 NOT FOUND: <path>` handler.
    pub fn not_found<F>(&mut self, f: F) -> &mut Engine
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, MiddlewareResult> + Send + Sync + 'static,
    {
        self.router.set_not_found(handler(f));
        self
    }

    pub fn group(&mut self, prefix: &str) -> RouterGroup<'_> {
        self.add_group(0, prefix)
    }

    fn add_group(&mut self, parent: usize, prefix: &str) -> RouterGroup<'_> {
        let prefix = format!("{}{}", self.groups[parent].prefix, prefix);

        debug!("Adding group {}", prefix);

        self.groups.push(Group {
            prefix,
            middlewares: Vec::new(),
            parent: Some(parent),
        });

        RouterGroup {
            index: self.groups.len() - 1,
            engine: self,
        }
    }

    ///
    /// Runs one request through the engine: a pooled context is reset and filled
    /// from `request`, the finalizer and every group middleware whose prefix matches
    /// the path go first, then the router appends the route handler and runs the chain.
    ///
    /// The context is cleared and goes back to the pool even if a handler panics.
    /// The panic is resumed afterwards.
    ///
    pub async fn handle(&self, request: Request<Bytes>) -> Response<Bytes> {
        let mut ctx = self.pool.acquire();
        ctx.reset();
        ctx.init(request);

        {
            let (path, handlers) = ctx.path_and_handlers();

            handlers.push(self.finalizer.clone());
            for group in self.groups.iter().filter(|g| path.starts_with(&g.prefix)) {
                handlers.extend(group.middlewares.iter().cloned());
            }
        }

        let outcome = AssertUnwindSafe(self.process(&mut ctx)).catch_unwind().await;

        let response = ctx.take_response();
        ctx.reset();
        self.pool.release(ctx);

        match outcome {
            Ok(()) => response,
            Err(panic) => panic::resume_unwind(panic),
        }
    }

    async fn process(&self, ctx: &mut Context) {
        if let Err(err) = self.router.dispatch(ctx).await {
            error!("{} {} failed: {:?}", ctx.method(), ctx.path(), err);

            if ctx.is_committed() {
                warn!(
                    "Response for {} was already written, dropping the error response",
                    ctx.path()
                );
                return;
            }

            ctx.write_error(&err);
        }
    }
}

///
/// A prefix scoped view on the engine. Middleware added here runs for every
/// request whose path starts with the group's prefix, wherever the route was
/// registered.
///
pub struct RouterGroup<'a> {
    engine: &'a mut Engine,
    index: usize,
}

impl<'a> RouterGroup<'a> {
    pub fn prefix(&self) -> &str {
        &self.engine.groups[self.index].prefix
    }

    pub fn parent_prefix(&self) -> Option<&str> {
        self.engine.groups[self.index]
            .parent
            .map(|parent| self.engine.groups[parent].prefix.as_str())
    }

    pub fn use_middleware<F>(&mut self, f: F) -> &mut RouterGroup<'a>
    where
        F: for<'b> Fn(&'b mut Context) -> BoxFuture<'b, MiddlewareResult> + Send + Sync + 'static,
    {
        self.engine.groups[self.index].middlewares.push(handler(f));
        self
    }

    pub fn group(&mut self, prefix: &str) -> RouterGroup<'_> {
        self.engine.add_group(self.index, prefix)
    }

    pub fn route<F>(&mut self, method: Method, pattern: &str, f: F) -> &mut RouterGroup<'a>
    where
        F: for<'b> Fn(&'b mut Context) -> BoxFuture<'b, MiddlewareResult> + Send + Sync + 'static,
    {
        let pattern = format!("{}{}", self.prefix(), pattern);
        self.engine.route(method, &pattern, f);
        self
    }

    pub fn get<F>(&mut self, pattern: &str, f: F) -> &mut RouterGroup<'a>
    where
        F: for<'b> Fn(&'b mut Context) -> BoxFuture<'b, MiddlewareResult> + Send + Sync + 'static,
    {
        self.route(Method::GET, pattern, f)
    }

    pub fn post<F>(&mut self, pattern: &str, f: F) -> &mut RouterGroup<'a>
    where
        F: for<'b> Fn(&'b mut Context) -> BoxFuture<'b, MiddlewareResult> + Send + Sync + 'static,
    {
        self.route(Method::POST, pattern, f)
    }

    pub fn put<F>(&mut self, pattern: &str, f: F) -> &mut RouterGroup<'a>
    where
        F: for<'b> Fn(&'b mut Context) -> BoxFuture<'b, MiddlewareResult> + Send + Sync + 'static,
    {
        self.route(Method::PUT, pattern, f)
    }

    pub fn delete<F>(&mut self, pattern: &str, f: F) -> &mut RouterGroup<'a>
    where
        F: for<'b> Fn(&'b mut Context) -> BoxFuture<'b, MiddlewareResult> + Send + Sync + 'static,
    {
        self.route(Method::DELETE, pattern, f)
    }

    pub fn patch<F>(&mut self, pattern: &str, f: F) -> &mut RouterGroup<'a>
    where
        F: for<'b> Fn(&'b mut Context) -> BoxFuture<'b, MiddlewareResult> + Send + Sync + 'static,
    {
        self.route(Method::PATCH, pattern, f)
    }

    pub fn options<F>(&mut self, pattern: &str, f: F) -> &mut RouterGroup<'a>
    where
        F: for<'b> Fn(&'b mut Context) -> BoxFuture<'b, MiddlewareResult> + Send + Sync + 'static,
    {
        self.route(Method::OPTIONS, pattern, f)
    }
}
