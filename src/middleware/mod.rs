//! Middleware layer.
//!
//! Middleware intercepts requests and responses and is the right place for
//! cross-cutting concerns: body parsing, access logging, authentication.
//!
//! A middleware entry receives the [`RequestContext`] and a [`Next`]
//! continuation. It can:
//!
//! - pass control inward with `next.run(ctx).await` and post-process the
//!   response on the way back out;
//! - short-circuit by returning a response without calling `next`;
//! - fail by returning `Err`, which the pipeline turns into a `500`.
//!
//! ```rust
//! use switchyard::{Next, RequestContext, Response, Status};
//! use switchyard::error::DispatchError;
//!
//! async fn require_token(ctx: RequestContext, next: Next) -> Result<Response, DispatchError> {
//!     if ctx.header("authorization").is_none() {
//!         return Ok(Response::status(Status::Unauthorized));
//!     }
//!     let mut res = next.run(ctx).await?;
//!     res.set_header("x-authenticated", "1");
//!     Ok(res)
//! }
//! ```
//!
//! Built-in entries:
//! - [`JsonBody`]: parses `application/json` bodies into the attribute bag
//! - [`Logger`]: reports method, path, status and latency per request

mod json;
mod logger;

use std::future::Future;
use std::sync::Arc;

use crate::context::RequestContext;
use crate::handler::{BoxFuture, IntoOutcome, Outcome};
use crate::pipeline::Next;

pub use json::{DEFAULT_JSON_LIMIT, JsonBody};
pub use logger::{LogSink, Logger, TracingSink};

/// One entry in a [`Pipeline`](crate::Pipeline).
///
/// Implemented automatically for `async fn(RequestContext, Next) -> impl IntoOutcome`.
/// Implement it by hand for configurable middleware structs.
pub trait Middleware: Send + Sync + 'static {
    fn call(&self, ctx: RequestContext, next: Next) -> BoxFuture<Outcome>;
}

pub(crate) type BoxedMiddleware = Arc<dyn Middleware>;

impl<F, Fut, R> Middleware for F
where
    F: Fn(RequestContext, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn call(&self, ctx: RequestContext, next: Next) -> BoxFuture<Outcome> {
        let fut = (self)(ctx, next);
        Box::pin(async move { fut.await.into_outcome() })
    }
}
