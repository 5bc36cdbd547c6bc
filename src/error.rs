//! Error types.
//!
//! Two families, split by *when* they can happen:
//!
//! - [`ConfigError`]: setup time. Bad patterns, duplicate routes, mutating a
//!   sealed pipeline, a port that is already taken. Always fatal, always
//!   surfaced before the first request is accepted.
//! - [`DispatchError`]: request time. Contained inside the request that
//!   produced it, logged once at the pipeline boundary and turned into a
//!   `500`. One bad request never takes down another.
//!
//! "No route matched" is neither. It is a normal outcome and becomes a `404`.

use std::time::Duration;

use thiserror::Error;

use crate::method::Method;

/// A boxed error from application code (handlers and middleware).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The crate-level error returned by [`Server::serve`](crate::Server::serve)
/// and [`Pipeline::start`](crate::Pipeline::start).
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// A setup-time fault. Never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed pattern `{pattern}`: {reason}")]
    MalformedPattern { pattern: String, reason: &'static str },

    #[error("pattern `{pattern}` declares parameter `{name}` more than once")]
    DuplicateParam { pattern: String, name: String },

    #[error("route `{method} {pattern}` is already registered")]
    DuplicateRoute { method: Method, pattern: String },

    #[error("a router is already mounted at `{prefix}`")]
    DuplicateMount { prefix: String },

    #[error("pipeline is sealed; middleware must be added before start")]
    PipelineSealed,

    #[error("cannot bind `{addr}`: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings: {0}")]
    Settings(#[from] toml::de::Error),
}

/// Where a request was when its deadline elapsed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stage {
    /// The middleware entry at this position held control.
    Middleware(usize),
    /// Every entry continued; the router or handler held control.
    Handler,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Middleware(i) => write!(f, "middleware #{i}"),
            Self::Handler => f.write_str("handler"),
        }
    }
}

/// A request-time fault, recovered at the pipeline boundary.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("middleware #{position} invoked its continuation more than once")]
    DoubleDispatch { position: usize },

    #[error("request deadline elapsed after {elapsed:?} in {stage}")]
    Timeout { stage: Stage, elapsed: Duration },

    #[error("unhandled error: {0}")]
    Handler(#[source] BoxError),

    #[error("request task panicked: {0}")]
    Panicked(String),
}

impl DispatchError {
    /// Wraps an application error, unwrapping it first if it is already a
    /// `DispatchError` that was propagated with `?` through a middleware.
    pub fn from_boxed(err: BoxError) -> Self {
        match err.downcast::<DispatchError>() {
            Ok(inner) => *inner,
            Err(other) => Self::Handler(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn propagated_dispatch_errors_are_not_double_wrapped() {
        let boxed: BoxError = Box::new(DispatchError::DoubleDispatch { position: 2 });
        assert!(matches!(
            DispatchError::from_boxed(boxed),
            DispatchError::DoubleDispatch { position: 2 }
        ));

        let boxed: BoxError = "boom".into();
        let err = DispatchError::from_boxed(boxed);
        assert_eq!(err.to_string(), "unhandled error: boom");
    }

    #[test]
    fn stage_display() {
        assert_eq!(Stage::Middleware(1).to_string(), "middleware #1");
        assert_eq!(Stage::Handler.to_string(), "handler");
    }
}
