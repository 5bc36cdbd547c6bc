//! JSON body parsing.

use tracing::debug;

use crate::context::{AttrValue, JSON_BODY, RequestContext};
use crate::handler::{BoxFuture, Outcome};
use crate::middleware::Middleware;
use crate::pipeline::Next;
use crate::response::Response;
use crate::status::Status;

/// 100 KiB.
pub const DEFAULT_JSON_LIMIT: usize = 100 * 1024;

/// Parses `application/json` request bodies into the attribute bag under
/// [`JSON_BODY`]. Register it first so every later entry and the handler
/// can read [`RequestContext::json_body`].
///
/// Requests with another content type, or an empty body, pass through
/// untouched. Malformed JSON is answered with `400`, oversized bodies with
/// `413`; neither reaches the router.
///
/// The body is already in memory when this runs. What the server reads off
/// the wire is bounded separately by [`Config::body_limit`](crate::Config::body_limit),
/// so keep this limit at or below that one.
#[derive(Clone, Copy, Debug)]
pub struct JsonBody {
    limit: usize,
}

impl JsonBody {
    pub fn new() -> Self {
        Self { limit: DEFAULT_JSON_LIMIT }
    }

    /// Largest accepted body in bytes.
    pub fn limit(mut self, bytes: usize) -> Self {
        self.limit = bytes;
        self
    }
}

impl Default for JsonBody {
    fn default() -> Self { Self::new() }
}

impl Middleware for JsonBody {
    fn call(&self, mut ctx: RequestContext, next: Next) -> BoxFuture<Outcome> {
        let limit = self.limit;
        Box::pin(async move {
            if !is_json(ctx.header("content-type")) || ctx.body().is_empty() {
                return next.run(ctx).await;
            }

            if ctx.body().len() > limit {
                debug!(len = ctx.body().len(), limit, "json body over limit");
                return Ok(Response::builder()
                    .status(Status::ContentTooLarge)
                    .text("request body too large"));
            }

            match serde_json::from_slice::<serde_json::Value>(ctx.body()) {
                Ok(value) => {
                    ctx.attributes_mut().insert(JSON_BODY, AttrValue::Json(value));
                    next.run(ctx).await
                }
                Err(e) => {
                    debug!(error = %e, "rejecting malformed json body");
                    Ok(Response::builder()
                        .status(Status::BadRequest)
                        .text(format!("invalid JSON body: {e}")))
                }
            }
        })
    }
}

/// `application/json`, ignoring parameters such as `charset` and case.
fn is_json(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case("application/json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_essence_is_compared() {
        assert!(is_json(Some("application/json")));
        assert!(is_json(Some("Application/JSON; charset=utf-8")));
        assert!(!is_json(Some("application/jsonp")));
        assert!(!is_json(Some("text/plain")));
        assert!(!is_json(None));
    }
}
