//! Request router.
//!
//! A router's own routes and its mounted sub-routers form one routing
//! level. Candidates are ranked by how many literal segments they start
//! with (a mount counts its whole prefix), most first; equal ranks keep
//! registration order. The first full match wins, so `/users/me` is found
//! before `/users/:id`, and a mount at `/users` is tried before a
//! catch-all `/:resource` whatever order they were declared in.
//!
//! A mount matches its prefix against the leading path segments and then
//! the remainder against its own level. A miss inside a mount falls through
//! to the next candidate.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::pattern::{Pattern, split_path};

struct Route {
    method: Method,
    pattern: Pattern,
    handler: BoxedHandler,
}

struct Mount {
    prefix: Pattern,
    router: Router,
}

enum Entry {
    Route(Route),
    Mount(Mount),
}

impl Entry {
    fn rank(&self) -> usize {
        match self {
            Entry::Route(route) => route.pattern.static_len(),
            Entry::Mount(mount) => mount.prefix.len(),
        }
    }
}

/// A successful [`Router::dispatch`].
pub struct RouteMatch {
    pub(crate) handler: BoxedHandler,
    pub params: HashMap<String, String>,
}

/// The application router.
///
/// Build it once at startup and hand it to [`Pipeline::new`](crate::Pipeline::new).
/// Registration is available in two flavours:
///
/// - [`register`](Router::register) / [`mount`](Router::mount) return the
///   error immediately;
/// - the chaining helpers ([`on`](Router::on), [`get`](Router::get), …,
///   [`nest`](Router::nest)) return `self` and keep the first error until
///   [`check`](Router::check), which the pipeline calls before it starts.
///
/// ```rust
/// use switchyard::{RequestContext, Response, Router};
/// # async fn list(_: RequestContext) -> Response { Response::text("") }
/// # async fn show(_: RequestContext) -> Response { Response::text("") }
///
/// let users = Router::new()
///     .get("/",    list)
///     .get("/:id", show);
///
/// let app = Router::new().nest("/users", users);
/// assert!(app.check().is_ok());
/// ```
#[derive(Default)]
pub struct Router {
    entries: Vec<Entry>,
    deferred: Vec<ConfigError>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for a method + pattern pair.
    ///
    /// Fails if the pattern is malformed, or if a route with the same method
    /// and pattern shape is already reachable through this router, mounts
    /// included.
    pub fn register(
        &mut self,
        method: Method,
        pattern: &str,
        handler: impl Handler,
    ) -> Result<&mut Self, ConfigError> {
        let pattern = Pattern::parse(pattern)?;
        if self.is_taken(method, &pattern) {
            return Err(ConfigError::DuplicateRoute {
                method,
                pattern: pattern.as_str().to_owned(),
            });
        }
        self.insert(Entry::Route(Route { method, pattern, handler: handler.into_boxed_handler() }));
        Ok(self)
    }

    /// Attaches `router` so its routes are matched under `prefix`.
    ///
    /// The prefix must be literal segments only. Fails if another router is
    /// mounted at the same prefix, or if any route of `router` would collide
    /// with one already reachable here. Errors `router` deferred from its
    /// own chained registrations are carried over to `self`.
    pub fn mount(&mut self, prefix: &str, mut router: Router) -> Result<&mut Self, ConfigError> {
        let prefix = Pattern::parse(prefix)?;
        if prefix.has_params() {
            return Err(ConfigError::MalformedPattern {
                pattern: prefix.as_str().to_owned(),
                reason: "mount prefixes cannot contain parameters",
            });
        }
        let mounted_twice = self.entries.iter()
            .any(|e| matches!(e, Entry::Mount(m) if m.prefix.same_shape(&prefix)));
        if mounted_twice {
            return Err(ConfigError::DuplicateMount { prefix: prefix.as_str().to_owned() });
        }
        for (method, pattern) in router.reachable() {
            let full = prefix.join(&pattern);
            if self.is_taken(method, &full) {
                return Err(ConfigError::DuplicateRoute { method, pattern: full.as_str().to_owned() });
            }
        }

        self.deferred.append(&mut router.deferred);
        self.insert(Entry::Mount(Mount { prefix, router }));
        Ok(self)
    }

    /// Chaining form of [`register`](Router::register).
    pub fn on(mut self, method: Method, pattern: &str, handler: impl Handler) -> Self {
        let result = self.register(method, pattern, handler).map(|_| ());
        if let Err(e) = result {
            self.deferred.push(e);
        }
        self
    }

    pub fn get(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::Get, pattern, handler)
    }

    pub fn post(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::Post, pattern, handler)
    }

    pub fn put(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::Put, pattern, handler)
    }

    pub fn patch(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::Patch, pattern, handler)
    }

    pub fn delete(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::Delete, pattern, handler)
    }

    /// Chaining form of [`mount`](Router::mount).
    pub fn nest(mut self, prefix: &str, router: Router) -> Self {
        let result = self.mount(prefix, router).map(|_| ());
        if let Err(e) = result {
            self.deferred.push(e);
        }
        self
    }

    /// Returns the first error recorded by a chaining call, if any.
    pub fn check(&self) -> Result<(), &ConfigError> {
        match self.deferred.first() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub(crate) fn take_deferred(&mut self) -> Option<ConfigError> {
        if self.deferred.is_empty() {
            return None;
        }
        Some(self.deferred.remove(0))
    }

    /// Finds the handler for `method` + `path`. `None` means not found.
    pub fn dispatch(&self, method: Method, path: &str) -> Option<RouteMatch> {
        self.find(method, &split_path(path))
    }

    fn find(&self, method: Method, path: &[&str]) -> Option<RouteMatch> {
        self.entries.iter().find_map(|entry| match entry {
            Entry::Route(route) if route.method == method => {
                let params = route.pattern.matches(path)?;
                Some(RouteMatch { handler: Arc::clone(&route.handler), params })
            }
            Entry::Route(_) => None,
            Entry::Mount(mount) => mount.router.find(method, mount.prefix.strip(path)?),
        })
    }

    // Stable: entries of equal rank stay in registration order.
    fn insert(&mut self, entry: Entry) {
        let rank = entry.rank();
        let at = self.entries.partition_point(|e| e.rank() >= rank);
        self.entries.insert(at, entry);
    }

    /// Every route reachable through this router, mount prefixes applied.
    fn reachable(&self) -> Vec<(Method, Pattern)> {
        let mut out = Vec::new();
        for entry in &self.entries {
            match entry {
                Entry::Route(route) => out.push((route.method, route.pattern.clone())),
                Entry::Mount(mount) => out.extend(
                    mount.router.reachable().into_iter()
                        .map(|(method, pattern)| (method, mount.prefix.join(&pattern))),
                ),
            }
        }
        out
    }

    fn is_taken(&self, method: Method, pattern: &Pattern) -> bool {
        self.reachable().iter().any(|(m, p)| *m == method && p.same_shape(pattern))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;
    use crate::request::Request;
    use crate::response::Response;

    /// Calls the matched handler and returns its body, so tests can tell
    /// handlers apart.
    async fn hit(router: &Router, method: Method, path: &str) -> Option<(String, HashMap<String, String>)> {
        let found = router.dispatch(method, path)?;
        let res = found.handler.call(RequestContext::new(Request::new(method, path))).await.ok()?;
        Some((String::from_utf8(res.body).unwrap(), found.params))
    }

    fn named(name: &'static str) -> impl Handler {
        move |_ctx: RequestContext| async move { Response::text(name) }
    }

    #[tokio::test]
    async fn list_and_item_routes_are_distinct() {
        let router = Router::new()
            .get("/users", named("list"))
            .get("/users/:id", named("item"));

        let (body, params) = hit(&router, Method::Get, "/users/7").await.unwrap();
        assert_eq!(body, "item");
        assert_eq!(params["id"], "7");

        let (body, params) = hit(&router, Method::Get, "/users").await.unwrap();
        assert_eq!(body, "list");
        assert!(params.is_empty());
    }

    #[tokio::test]
    async fn mounted_router_matches_under_prefix() {
        let users = Router::new().get("/", named("list")).get("/:id", named("item"));
        let app = Router::new().nest("/users", users);

        let (body, params) = hit(&app, Method::Get, "/users/42").await.unwrap();
        assert_eq!(body, "item");
        assert_eq!(params["id"], "42");

        assert_eq!(hit(&app, Method::Get, "/users").await.unwrap().0, "list");
        assert_eq!(hit(&app, Method::Get, "/users/").await.unwrap().0, "list");
        assert!(app.dispatch(Method::Get, "/").is_none());
    }

    #[tokio::test]
    async fn longer_static_prefix_wins_over_earlier_registration() {
        let router = Router::new()
            .get("/users/:id", named("param"))
            .get("/users/me", named("literal"));
        assert_eq!(hit(&router, Method::Get, "/users/me").await.unwrap().0, "literal");
        assert_eq!(hit(&router, Method::Get, "/users/7").await.unwrap().0, "param");
    }

    #[tokio::test]
    async fn registration_order_breaks_ties() {
        let router = Router::new()
            .get("/files/:dir/:name", named("pair"))
            .get("/files/:name/raw", named("raw"));
        assert_eq!(hit(&router, Method::Get, "/files/docs/raw").await.unwrap().0, "pair");
    }

    #[tokio::test]
    async fn longest_mount_prefix_is_tried_first_then_falls_back() {
        let short = Router::new().get("/v1/:page", named("short-param"));
        let long = Router::new().get("/health", named("long"));
        let app = Router::new().nest("/api", short).nest("/api/v1", long);
        assert!(app.check().is_ok());

        assert_eq!(hit(&app, Method::Get, "/api/v1/health").await.unwrap().0, "long");
        // The longer mount has no route for this, so the shorter one answers.
        assert_eq!(hit(&app, Method::Get, "/api/v1/docs").await.unwrap().0, "short-param");
    }

    #[tokio::test]
    async fn mount_prefix_outranks_a_catch_all_route() {
        let users = || Router::new().get("/", named("mounted"));

        let app = Router::new().nest("/users", users()).get("/:resource", named("own"));
        assert_eq!(hit(&app, Method::Get, "/users").await.unwrap().0, "mounted");
        assert_eq!(hit(&app, Method::Get, "/orders").await.unwrap().0, "own");

        let app = Router::new().get("/:resource", named("own")).nest("/users", users());
        assert_eq!(hit(&app, Method::Get, "/users").await.unwrap().0, "mounted");
    }

    #[tokio::test]
    async fn route_and_mount_of_equal_rank_keep_registration_order() {
        let api = Router::new().get("/:name", named("mounted"));
        let app = Router::new()
            .get("/api/:version/status", named("own"))
            .nest("/api", api);
        // Both rank 1: the route was registered first but needs three
        // segments, so a two-segment path falls through to the mount.
        assert_eq!(hit(&app, Method::Get, "/api/v1/status").await.unwrap().0, "own");
        assert_eq!(hit(&app, Method::Get, "/api/v1").await.unwrap().0, "mounted");
    }

    #[test]
    fn method_and_case_must_match() {
        let router = Router::new().get("/users/:id", named("item"));
        assert!(router.dispatch(Method::Post, "/users/1").is_none());
        assert!(router.dispatch(Method::Get, "/USERS/1").is_none());
        assert!(router.dispatch(Method::Get, "/users//").is_none());
    }

    #[test]
    fn root_pattern_matches_only_root() {
        let router = Router::new().get("/", named("root"));
        assert!(router.dispatch(Method::Get, "/").is_some());
        assert!(router.dispatch(Method::Get, "").is_some());
        assert!(router.dispatch(Method::Get, "/x").is_none());
    }

    #[test]
    fn duplicate_routes_are_rejected() {
        let mut router = Router::new();
        router.register(Method::Get, "/users/:id", named("a")).unwrap();
        router.register(Method::Post, "/users/:id", named("b")).unwrap();

        let err = router.register(Method::Get, "/users/:uid/", named("c")).err().unwrap();
        assert!(matches!(err, ConfigError::DuplicateRoute { method: Method::Get, .. }));
    }

    #[test]
    fn chained_errors_are_deferred_to_check() {
        let router = Router::new()
            .get("/users", named("a"))
            .get("/users", named("b"))
            .get("no-slash", named("c"));

        assert!(matches!(router.check(), Err(ConfigError::DuplicateRoute { .. })));
    }

    #[test]
    fn mount_rejects_duplicates_and_params() {
        let mut app = Router::new();
        app.mount("/users", Router::new()).unwrap();
        assert!(matches!(
            app.mount("/users/", Router::new()).err().unwrap(),
            ConfigError::DuplicateMount { .. }
        ));
        assert!(matches!(
            app.mount("/orgs/:org", Router::new()).err().unwrap(),
            ConfigError::MalformedPattern { .. }
        ));
    }

    #[test]
    fn duplicates_across_a_mount_are_rejected() {
        let app = Router::new()
            .get("/users/:id", named("own"))
            .nest("/users", Router::new().get("/:uid", named("mounted")));
        assert!(matches!(
            app.check(),
            Err(ConfigError::DuplicateRoute { method: Method::Get, pattern }) if pattern == "/users/:uid"
        ));

        let mut app = Router::new();
        app.mount("/users", Router::new().get("/", named("list"))).unwrap();
        let err = app.register(Method::Get, "/users/", named("again")).err().unwrap();
        assert!(matches!(err, ConfigError::DuplicateRoute { .. }));

        // Deeper nesting and a different method.
        let mut app = Router::new();
        app.mount("/api", Router::new().nest("/users", Router::new().get("/:id", named("a")))).unwrap();
        assert!(app.register(Method::Get, "/api/users/:key", named("b")).is_err());
        assert!(app.register(Method::Delete, "/api/users/:key", named("c")).is_ok());
    }

    #[test]
    fn child_deferred_errors_surface_on_parent() {
        let users = Router::new().get("/", named("a")).get("/", named("b"));
        let app = Router::new().nest("/users", users);
        assert!(matches!(app.check(), Err(ConfigError::DuplicateRoute { .. })));
    }
}
