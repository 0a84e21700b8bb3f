use fnv::FnvHashMap;
use http::Method;

use crate::core::context::Context;
use crate::core::middleware::{ChainResult, Handler};
use crate::core::middleware::handler;
use crate::MiddlewareResult;
use ignite_proc::middleware_fn;

const WILDCARD_ROUTE_LEADING_CHAR: char = '*';
const PARAM_ROUTE_LEADING_CHAR: char = ':';

#[inline]
fn route_key(method: &str, path: &str) -> String {
    templatify!("__" ; method ; "__" ; path ; "")
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param(String),
    Wildcard(String),
}

impl Segment {
    // Higher wins when two routes match the same path.
    fn rank(&self) -> u8 {
        match self {
            Segment::Static(_) => 2,
            Segment::Param(_) => 1,
            Segment::Wildcard(_) => 0,
        }
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|part| !part.is_empty())
}

fn parse_pattern(pattern: &str) -> Vec<Segment> {
    let mut segments = Vec::new();

    for part in split_path(pattern) {
        if let Some(name) = part.strip_prefix(PARAM_ROUTE_LEADING_CHAR) {
            segments.push(Segment::Param(name.to_string()));
        } else if let Some(name) = part.strip_prefix(WILDCARD_ROUTE_LEADING_CHAR) {
            segments.push(Segment::Wildcard(name.to_string()));
            // Nothing after a wildcard can ever match.
            break;
        } else {
            segments.push(Segment::Static(part.to_string()));
        }
    }

    segments
}

struct Route {
    pattern: String,
    segments: Vec<Segment>,
    handler: Handler,
}

impl Route {
    fn matches(&self, parts: &[&str]) -> Option<Vec<(String, String)>> {
        let mut params = Vec::new();

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Static(expected) => {
                    if parts.get(i) != Some(&expected.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => match parts.get(i) {
                    Some(part) => params.push((name.clone(), part.to_string())),
                    None => return None,
                },
                Segment::Wildcard(name) => {
                    let rest = parts.get(i..).unwrap_or(&[]).join("/");
                    params.push((name.clone(), rest));
                    return Some(params);
                }
            }
        }

        if parts.len() == self.segments.len() {
            Some(params)
        } else {
            None
        }
    }

    fn specificity(&self) -> impl Iterator<Item = u8> + '_ {
        self.segments.iter().map(Segment::rank)
    }
}

///
/// Maps method and path to a handler. Static segments beat `:params`, which beat
/// `*wildcards`, position by position. Fully static routes skip the scan entirely.
///
pub struct Router {
    routes: FnvHashMap<Method, Vec<Route>>,
    fastmatch: FnvHashMap<String, Handler>,
    not_found: Handler,
}

impl Default for Router {
    fn default() -> Self {
        Router {
            routes: FnvHashMap::default(),
            fastmatch: FnvHashMap::default(),
            not_found: handler(not_found),
        }
    }
}

impl Router {
    pub fn new() -> Router {
        Router::default()
    }

    pub fn register(&mut self, method: Method, pattern: &str, handler: Handler) {
        let segments = parse_pattern(pattern);
        let normalized = format!(
            "/{}",
            split_path(pattern).collect::<Vec<_>>().join("/")
        );

        debug!("Registering {} {}", method, normalized);

        if segments.iter().all(|s| matches!(s, Segment::Static(_))) {
            self.fastmatch
                .insert(route_key(method.as_str(), &normalized), handler.clone());
        }

        let routes = self.routes.entry(method).or_default();
        routes.retain(|route| route.pattern != normalized);
        routes.push(Route {
            pattern: normalized,
            segments,
            handler,
        });
    }

    pub fn set_not_found(&mut self, handler: Handler) {
        self.not_found = handler;
    }

    pub fn find(&self, method: &Method, path: &str) -> Option<(Handler, Vec<(String, String)>)> {
        let parts: Vec<&str> = split_path(path).collect();
        let normalized = format!("/{}", parts.join("/"));

        if let Some(handler) = self.fastmatch.get(&route_key(method.as_str(), &normalized)) {
            return Some((handler.clone(), Vec::new()));
        }

        let mut best: Option<(&Route, Vec<(String, String)>)> = None;

        for route in self.routes.get(method)? {
            if let Some(params) = route.matches(&parts) {
                let better = match &best {
                    Some((current, _)) => route.specificity().gt(current.specificity()),
                    None => true,
                };

                if better {
                    best = Some((route, params));
                }
            }
        }

        best.map(|(route, params)| (route.handler.clone(), params))
    }

    ///
    /// Appends the matched handler, or the 404 handler, to the context's chain and runs it.
    ///
    pub async fn dispatch(&self, ctx: &mut Context) -> ChainResult {
        match self.find(ctx.method(), ctx.path()) {
            Some((handler, params)) => {
                ctx.set_params(params);
                ctx.push_handler(handler);
            }
            None => ctx.push_handler(self.not_found.clone()),
        }

        ctx.next().await
    }
}

#[middleware_fn(_internal)]
async fn not_found(ctx: &mut Context) -> MiddlewareResult {
    let body = format!("404 NOT FOUND: {}\n", ctx.path());
    ctx.respond_text(404, body);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::middleware::BoxFuture;

    fn noop(_: &mut Context) -> BoxFuture<'_, MiddlewareResult> {
        Box::pin(async { Ok(()) })
    }

    fn router(patterns: &[&str]) -> Router {
        let mut router = Router::new();
        for pattern in patterns {
            router.register(Method::GET, pattern, handler(noop));
        }
        router
    }

    fn pattern_of(router: &Router, path: &str) -> Option<String> {
        let (found, _) = router.find(&Method::GET, path)?;

        router.routes[&Method::GET]
            .iter()
            .find(|route| std::sync::Arc::ptr_eq(&route.handler, &found))
            .map(|route| route.pattern.clone())
    }

    #[test]
    fn it_should_capture_params() {
        let router = router(&["/users/:id/posts/:post"]);

        let (_, params) = router.find(&Method::GET, "/users/7/posts/42").unwrap();

        assert_eq!(
            params,
            vec![
                ("id".to_string(), "7".to_string()),
                ("post".to_string(), "42".to_string())
            ]
        );
    }

    #[test]
    fn it_should_capture_the_rest_of_the_path_for_wildcards() {
        let router = router(&["/assets/*filepath"]);

        let (_, params) = router.find(&Method::GET, "/assets/css/site.css").unwrap();

        assert_eq!(params, vec![("filepath".to_string(), "css/site.css".to_string())]);
    }

    #[test]
    fn it_should_prefer_the_most_specific_route() {
        let router = router(&["/users/*rest", "/users/:id", "/users/me"]);

        assert_eq!(pattern_of(&router, "/users/me").as_deref(), Some("/users/me"));
        assert_eq!(pattern_of(&router, "/users/7").as_deref(), Some("/users/:id"));
        assert_eq!(pattern_of(&router, "/users/7/x").as_deref(), Some("/users/*rest"));
    }

    #[test]
    fn it_should_ignore_trailing_slashes() {
        let router = router(&["/a/b/"]);

        assert!(router.find(&Method::GET, "/a/b").is_some());
        assert!(router.find(&Method::GET, "/a/b/c").is_none());
        assert!(router.find(&Method::POST, "/a/b").is_none());
    }
}
