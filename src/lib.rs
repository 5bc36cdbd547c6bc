//! # switchyard
//!
//! Request dispatch and middleware pipeline for HTTP services on hyper.
//!
//! ## The pieces
//!
//! - [`Router`]: maps a method and path to a handler. Named parameters
//!   (`/users/:id`), sub-routers mounted under a prefix. Candidates with
//!   more leading literal segments are tried first, then registration
//!   order.
//! - [`Pipeline`]: an ordered chain of middleware wrapped around the router.
//!   Each entry gets the request on the way in and the response on the way
//!   out, and may short-circuit.
//! - [`Server`]: hyper HTTP/1.1 + HTTP/2 on tokio, graceful shutdown on
//!   SIGTERM / Ctrl-C with a bounded drain.
//!
//! Setup happens once, before the first connection is accepted. After that
//! the route table and the chain are read-only and shared without locks.
//!
//! ## Failure model
//!
//! Setup mistakes (duplicate routes, malformed patterns, a port already in
//! use) are [`ConfigError`](error::ConfigError)s and stop the process before
//! it serves anything. Anything that goes wrong while serving a request
//! (a handler error, a panic, a middleware calling `next` twice, a missed
//! deadline) is logged and answered with `500`, and only that request is
//! affected.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use switchyard::middleware::{JsonBody, Logger};
//! use switchyard::{Pipeline, RequestContext, Response, Router, Status};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), switchyard::Error> {
//!     let users = Router::new()
//!         .get("/",    list_users)
//!         .get("/:id", get_user)
//!         .post("/",   create_user);
//!
//!     let mut app = Pipeline::new(Router::new().nest("/users", users));
//!     app.use_middleware(JsonBody::new())?
//!        .use_middleware(Logger::new())?;
//!
//!     app.start("0.0.0.0:3000").await
//! }
//!
//! async fn list_users(_ctx: RequestContext) -> Response {
//!     Response::json(br#"[{"id":"1"}]"#.to_vec())
//! }
//!
//! async fn get_user(ctx: RequestContext) -> Response {
//!     let id = ctx.param("id").unwrap_or("unknown");
//!     Response::json(format!(r#"{{"id":"{id}"}}"#).into_bytes())
//! }
//!
//! async fn create_user(ctx: RequestContext) -> Response {
//!     match ctx.json_body() {
//!         Some(_) => Response::builder().status(Status::Created).json(b"{}".to_vec()),
//!         None => Response::status(Status::BadRequest),
//!     }
//! }
//! ```

mod config;
mod context;
mod handler;
mod method;
mod pattern;
mod pipeline;
mod request;
mod response;
mod router;
mod server;
mod status;

pub mod error;
pub mod middleware;

pub use config::{Config, DEFAULT_BODY_LIMIT};
pub use context::{AttrValue, Attributes, JSON_BODY, RequestContext};
pub use error::Error;
pub use handler::{BoxFuture, Handler, IntoOutcome, Outcome};
pub use method::{Method, UnknownMethod};
pub use middleware::Middleware;
pub use pipeline::{Next, Pipeline};
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::{RouteMatch, Router};
pub use server::Server;
pub use status::Status;
