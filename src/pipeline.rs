//! Middleware pipeline and request dispatch.
//!
//! # Lifecycle of one request
//!
//! ```text
//! Received ─► entry 0 ─► entry 1 ─► … ─► router ─► handler
//!                                                    │
//!    Sent ◄── entry 0 ◄── entry 1 ◄── … ◄────────────┘
//! ```
//!
//! Each request runs in its own tokio task. The task is aborted if the
//! caller stops waiting for it (the connection went away) or the request
//! deadline elapses, so in-flight work is dropped at its next `.await`.
//!
//! Everything that can go wrong inside the chain is caught exactly once, in
//! [`Pipeline::handle`]: it is logged and becomes a `500`. Nothing escapes
//! to the server loop.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error};

use crate::config::Config;
use crate::context::RequestContext;
use crate::error::{ConfigError, DispatchError, Error, Stage};
use crate::handler::Outcome;
use crate::middleware::{BoxedMiddleware, Middleware};
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;
use crate::server::Server;
use crate::status::Status;

/// The request pipeline: middleware entries wrapped around a [`Router`].
///
/// Set it up, then hand it to [`start`](Pipeline::start) or
/// [`Server::serve`]. Both seal it first; after that the chain is frozen.
///
/// ```rust,no_run
/// use switchyard::{Pipeline, RequestContext, Response, Router};
/// use switchyard::middleware::{JsonBody, Logger};
///
/// # async fn list(_: RequestContext) -> Response { Response::text("") }
/// #[tokio::main]
/// async fn main() -> Result<(), switchyard::Error> {
///     let users = Router::new().get("/", list);
///     let mut app = Pipeline::new(Router::new().nest("/users", users));
///     app.use_middleware(JsonBody::new())?
///        .use_middleware(Logger::new())?;
///     app.start("0.0.0.0:3000").await
/// }
/// ```
pub struct Pipeline {
    entries: Arc<Vec<BoxedMiddleware>>,
    router: Arc<Router>,
    deferred: Option<ConfigError>,
    sealed: bool,
    request_timeout: Duration,
    drain_timeout: Duration,
    body_limit: usize,
}

impl Pipeline {
    /// Wraps `router`. Registration errors it deferred are reported by
    /// [`seal`](Pipeline::seal).
    pub fn new(router: Router) -> Self {
        Self::with_config(router, &Config::default())
    }

    pub fn with_config(mut router: Router, config: &Config) -> Self {
        let deferred = router.take_deferred();
        Self {
            entries: Arc::new(Vec::new()),
            router: Arc::new(router),
            deferred,
            sealed: false,
            request_timeout: config.request_timeout(),
            drain_timeout: config.drain_timeout(),
            body_limit: config.body_limit,
        }
    }

    /// Per-request deadline. Applies to the whole chain, handler included.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Largest request body the server reads, in bytes. Larger bodies are
    /// answered with `413` before the chain runs.
    pub fn body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    /// Appends a middleware entry. Fails once the pipeline is sealed.
    pub fn use_middleware(&mut self, middleware: impl Middleware) -> Result<&mut Self, ConfigError> {
        if self.sealed {
            return Err(ConfigError::PipelineSealed);
        }
        Arc::make_mut(&mut self.entries).push(Arc::new(middleware));
        Ok(self)
    }

    /// Freezes the chain and reports the first deferred registration error.
    pub fn seal(&mut self) -> Result<(), ConfigError> {
        if let Some(e) = self.deferred.take() {
            return Err(e);
        }
        self.sealed = true;
        Ok(())
    }

    pub fn is_sealed(&self) -> bool { self.sealed }

    pub(crate) fn max_body(&self) -> usize { self.body_limit }

    /// Seals the pipeline and serves it on `addr` until SIGTERM / Ctrl-C.
    pub async fn start(self, addr: &str) -> Result<(), Error> {
        let drain = self.drain_timeout;
        Server::bind(addr).drain_timeout(drain).serve(self).await
    }

    /// Runs one request through the chain. Never fails: faults become `500`.
    pub async fn handle(&self, req: Request) -> Response {
        let method = req.method();
        let path = req.path().to_owned();

        match self.process(req).await {
            Ok(res) => res,
            Err(err @ DispatchError::Timeout { .. }) => {
                error!(%method, %path, deadline = ?self.request_timeout, error = %err, "request timed out");
                Response::status(Status::InternalServerError)
            }
            Err(err) => {
                error!(%method, %path, error = %err, "request failed");
                Response::status(Status::InternalServerError)
            }
        }
    }

    /// The chain without the recovery boundary.
    pub(crate) async fn process(&self, req: Request) -> Outcome {
        let trace = Arc::new(Trace::default());
        let root = Next {
            entries: Arc::clone(&self.entries),
            router: Arc::clone(&self.router),
            position: 0,
            used: Arc::new(AtomicBool::new(false)),
            trace: Arc::clone(&trace),
        };

        let started = Instant::now();
        let task = AbortOnDrop(tokio::spawn(root.run(RequestContext::new(req))));

        let outcome = match tokio::time::timeout(self.request_timeout, task).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join)) => Err(DispatchError::Panicked(panic_message(join))),
            Err(_) => Err(DispatchError::Timeout {
                stage: trace.stage(self.entries.len()),
                elapsed: started.elapsed(),
            }),
        };

        // A double dispatch is a fault even if the offending entry went on
        // to return a perfectly good response.
        if let Some(&position) = trace.double_dispatch.get() {
            return Err(DispatchError::DoubleDispatch { position });
        }
        outcome
    }
}

// ── Continuation ──────────────────────────────────────────────────────────────

/// The rest of the pipeline, as seen by one middleware entry.
///
/// Call [`run`](Next::run) at most once. The handle is `Clone` so it can be
/// moved into helper futures, but every clone shares the same one-shot
/// budget: a second `run` returns [`DispatchError::DoubleDispatch`] and the
/// request is answered with a `500` whatever the entry returns.
#[derive(Clone)]
pub struct Next {
    entries: Arc<Vec<BoxedMiddleware>>,
    router: Arc<Router>,
    position: usize,
    used: Arc<AtomicBool>,
    trace: Arc<Trace>,
}

impl Next {
    /// Runs the remaining entries, then the router and handler.
    pub async fn run(self, ctx: RequestContext) -> Outcome {
        if self.used.swap(true, Ordering::AcqRel) {
            let position = self.position.saturating_sub(1);
            let _ = self.trace.double_dispatch.set(position);
            return Err(DispatchError::DoubleDispatch { position });
        }

        let trace = Arc::clone(&self.trace);
        let position = self.position;
        trace.hand_to(position);
        let outcome = self.step(ctx).await;
        // Control is back with the entry that called us.
        if let Some(caller) = position.checked_sub(1) {
            trace.hand_to(caller);
        }
        outcome
    }

    async fn step(self, ctx: RequestContext) -> Outcome {
        let Some(entry) = self.entries.get(self.position).cloned() else {
            return self.dispatch(ctx).await;
        };
        let next = Next {
            entries: self.entries,
            router: self.router,
            position: self.position + 1,
            used: Arc::new(AtomicBool::new(false)),
            trace: self.trace,
        };
        entry.call(ctx, next).await
    }

    async fn dispatch(self, mut ctx: RequestContext) -> Outcome {
        let Some(found) = self.router.dispatch(ctx.method(), ctx.path()) else {
            debug!(method = %ctx.method(), path = ctx.path(), "no route matched");
            return Ok(Response::status(Status::NotFound));
        };
        ctx.set_params(found.params);
        found.handler.call(ctx).await
    }
}

/// Per-request bookkeeping shared by every [`Next`] of one request.
#[derive(Default)]
struct Trace {
    /// Position currently holding control. `entries.len()` means the router
    /// and handler.
    holder: AtomicUsize,
    double_dispatch: OnceLock<usize>,
}

impl Trace {
    fn hand_to(&self, position: usize) {
        self.holder.store(position, Ordering::Release);
    }

    fn stage(&self, entries: usize) -> Stage {
        match self.holder.load(Ordering::Acquire) {
            p if p < entries => Stage::Middleware(p),
            _ => Stage::Handler,
        }
    }
}

// ── Task plumbing ─────────────────────────────────────────────────────────────

/// Aborts the request task when the caller stops polling it.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Future for AbortOnDrop<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return "request task was cancelled".to_owned();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
