//! HTTP server and graceful shutdown.
//!
//! # Graceful shutdown and Kubernetes
//!
//! When Kubernetes terminates a pod it sends **SIGTERM** and waits
//! `terminationGracePeriodSeconds` (default 30 s) before sending SIGKILL.
//!
//! The server reacts by:
//! 1. Immediately stopping `listener.accept()`; no new connections are made.
//! 2. Asking every open connection to finish its in-flight request and close.
//! 3. Waiting up to the drain timeout for them, then aborting stragglers.
//! 4. Returning from [`Server::serve`], which lets `main` exit cleanly.
//!
//! Keep the drain timeout below `terminationGracePeriodSeconds`.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::{ConfigError, Error};
use crate::method::Method;
use crate::pipeline::Pipeline;
use crate::request::Request;
use crate::response::Response;
use crate::status::Status;

enum Bind {
    Addr(String),
    Listener(TcpListener),
}

/// The HTTP server.
pub struct Server {
    bind: Bind,
    drain_timeout: Duration,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called. A bad address or a port already in use is reported by
    /// `serve` as [`ConfigError::Bind`].
    ///
    /// ```rust,no_run
    /// use switchyard::Server;
    /// let server = Server::bind("0.0.0.0:3000");
    /// ```
    pub fn bind(addr: &str) -> Self {
        Self { bind: Bind::Addr(addr.to_owned()), drain_timeout: Duration::from_secs(30) }
    }

    /// Serves on an already bound listener.
    pub fn from_listener(listener: TcpListener) -> Self {
        Self { bind: Bind::Listener(listener), drain_timeout: Duration::from_secs(30) }
    }

    /// How long shutdown waits for in-flight requests. Default 30 s.
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Seals `pipeline` and serves it until SIGTERM or Ctrl-C.
    ///
    /// Returns only after a full graceful shutdown.
    pub async fn serve(self, pipeline: Pipeline) -> Result<(), Error> {
        self.serve_with_shutdown(pipeline, shutdown_signal()).await
    }

    /// Like [`serve`](Server::serve) but stops when `signal` resolves.
    pub async fn serve_with_shutdown(
        self,
        mut pipeline: Pipeline,
        signal: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        // Registration errors are reported before we ever touch the network.
        pipeline.seal()?;

        let listener = match self.bind {
            Bind::Listener(listener) => listener,
            Bind::Addr(addr) => {
                let bound = TcpListener::bind(addr.as_str()).await;
                bound.map_err(|source| ConfigError::Bind { addr, source })?
            }
        };
        let local_addr = listener.local_addr()?;

        let pipeline = Arc::new(pipeline);
        let (stop_tx, stop_rx) = watch::channel(false);

        info!(addr = %local_addr, "switchyard listening");

        // JoinSet tracks every spawned connection task so we can wait for
        // them during graceful shutdown.
        let mut tasks = tokio::task::JoinSet::new();

        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Check shutdown first so a SIGTERM stops accepting
                // immediately, even if more connections are queued.
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };
                    tasks.spawn(serve_connection(
                        TokioIo::new(stream),
                        remote_addr,
                        Arc::clone(&pipeline),
                        stop_rx.clone(),
                    ));
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        drop(listener);
        let _ = stop_tx.send(true);

        let drained = tokio::time::timeout(self.drain_timeout, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(remaining = tasks.len(), timeout = ?self.drain_timeout, "drain timeout elapsed, aborting connections");
            tasks.abort_all();
        }

        info!("switchyard stopped");
        Ok(())
    }
}

/// Drives one connection until it closes or shutdown asks it to.
async fn serve_connection(
    io: TokioIo<tokio::net::TcpStream>,
    remote_addr: SocketAddr,
    pipeline: Arc<Pipeline>,
    mut stop: watch::Receiver<bool>,
) {
    // Called once per request on the connection, not once per connection.
    let svc = service_fn(move |req| {
        let pipeline = Arc::clone(&pipeline);
        async move { Ok::<_, Infallible>(dispatch(&pipeline, req).await.into_http()) }
    });

    // Handles both HTTP/1.1 and HTTP/2, whatever the client negotiates.
    let builder = ConnBuilder::new(TokioExecutor::new());
    let conn = builder.serve_connection(io, svc);
    tokio::pin!(conn);

    let mut draining = false;
    loop {
        tokio::select! {
            res = conn.as_mut() => {
                if let Err(e) = res {
                    debug!(peer = %remote_addr, "connection error: {e}");
                }
                break;
            }
            _ = stop.changed(), if !draining => {
                draining = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    }
}

// ── Request adaptation ────────────────────────────────────────────────────────

/// Turns a hyper request into a pipeline [`Request`] and runs it.
///
/// Dropping this future (the client went away) drops the pipeline's
/// request task with it.
async fn dispatch(pipeline: &Pipeline, req: hyper::Request<Incoming>) -> Response {
    let (parts, body) = req.into_parts();

    let Ok(method) = parts.method.as_str().parse::<Method>() else {
        debug!(method = %parts.method, "rejecting unknown method");
        return Response::status(Status::MethodNotAllowed);
    };

    let body = match Limited::new(body, pipeline.max_body()).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.is::<LengthLimitError>() => {
            debug!(limit = pipeline.max_body(), "request body over limit");
            return Response::status(Status::ContentTooLarge);
        }
        Err(e) => {
            debug!("failed to read request body: {e}");
            return Response::status(Status::BadRequest);
        }
    };

    let mut request = Request::new(method, parts.uri.path()).with_body(body);
    if let Some(query) = parts.uri.query() {
        request = request.with_query(query);
    }
    for (name, value) in &parts.headers {
        match value.to_str() {
            Ok(value) => request = request.with_header(name.as_str(), value),
            Err(_) => debug!(header = %name, "dropping non-UTF-8 header value"),
        }
    }

    pipeline.handle(request).await
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** and **SIGINT** (Ctrl-C).
/// On Windows only Ctrl-C is available. If a handler cannot be installed
/// that arm never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => { sig.recv().await; }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    // `pending()` never resolves; on non-Unix platforms the SIGTERM arm is
    // effectively disabled.
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
