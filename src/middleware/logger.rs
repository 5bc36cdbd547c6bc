//! Per-request access logging.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use crate::context::RequestContext;
use crate::handler::{BoxFuture, Outcome};
use crate::method::Method;
use crate::middleware::Middleware;
use crate::pipeline::Next;

/// Receives one record per request from [`Logger`].
pub trait LogSink: Send + Sync + 'static {
    fn record(&self, method: Method, path: &str, status: u16, elapsed: Duration);
}

/// Emits each record as a `tracing` `info!` event.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn record(&self, method: Method, path: &str, status: u16, elapsed: Duration) {
        info!(%method, path, status, elapsed_ms = elapsed.as_secs_f64() * 1000.0, "request");
    }
}

/// Times the rest of the chain and reports method, path, status and
/// latency to a [`LogSink`].
///
/// A failed inner outcome is recorded as `500` (what the client will get)
/// and passed on unchanged, so the pipeline boundary still sees the error.
///
/// Requests that time out or panic never reach the sink: their task is
/// aborted before this entry resumes. Those are recorded only by the
/// boundary's `error!` event in [`Pipeline::handle`](crate::Pipeline::handle).
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn LogSink>,
}

impl Logger {
    pub fn new() -> Self {
        Self::with_sink(TracingSink)
    }

    pub fn with_sink(sink: impl LogSink) -> Self {
        Self { sink: Arc::new(sink) }
    }
}

impl Default for Logger {
    fn default() -> Self { Self::new() }
}

impl Middleware for Logger {
    fn call(&self, ctx: RequestContext, next: Next) -> BoxFuture<Outcome> {
        let sink = Arc::clone(&self.sink);
        let method = ctx.method();
        let path = ctx.path().to_owned();
        Box::pin(async move {
            let started = Instant::now();
            let outcome = next.run(ctx).await;
            let status = match &outcome {
                Ok(res) => res.status_code(),
                Err(_) => 500,
            };
            sink.record(method, &path, status, started.elapsed());
            outcome
        })
    }
}
