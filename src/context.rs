//! Per-request state.
//!
//! A [`RequestContext`] is created when a request enters the pipeline and
//! is owned by that request's task until the response is produced. Nothing
//! else ever sees it, so nothing in here is synchronised.

use std::collections::HashMap;

use bytes::Bytes;

use crate::method::Method;
use crate::request::Request;

/// Attribute key under which [`JsonBody`](crate::middleware::JsonBody)
/// stores the parsed body.
pub const JSON_BODY: &str = "json_body";

/// A typed value in the [`Attributes`] bag.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Bytes(Bytes),
    Json(serde_json::Value),
}

/// String-keyed bag middleware uses to hand data to later entries and the
/// handler.
#[derive(Clone, Debug, Default)]
pub struct Attributes {
    values: HashMap<String, AttrValue>,
}

impl Attributes {
    /// Stores `value` under `key`, returning the previous value if any.
    pub fn insert(&mut self, key: impl Into<String>, value: AttrValue) -> Option<AttrValue> {
        self.values.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.values.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<AttrValue> {
        self.values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.values.get(key)? {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.values.get(key)? {
            AttrValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.values.get(key)? {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn get_json(&self, key: &str) -> Option<&serde_json::Value> {
        match self.values.get(key)? {
            AttrValue::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn len(&self) -> usize { self.values.len() }
    pub fn is_empty(&self) -> bool { self.values.is_empty() }
}

/// What handlers and middleware receive for one request.
///
/// Path parameters are filled in by the router just before the handler
/// runs; middleware always sees an empty parameter map.
#[derive(Clone, Debug)]
pub struct RequestContext {
    request: Request,
    params: HashMap<String, String>,
    attributes: Attributes,
}

impl RequestContext {
    pub fn new(request: Request) -> Self {
        Self { request, params: HashMap::new(), attributes: Attributes::default() }
    }

    pub fn request(&self) -> &Request { &self.request }
    pub fn method(&self) -> Method { self.request.method }
    pub fn path(&self) -> &str { &self.request.path }
    pub fn body(&self) -> &[u8] { &self.request.body }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.header(name)
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/:id`, `ctx.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> { &self.params }

    pub fn attributes(&self) -> &Attributes { &self.attributes }
    pub fn attributes_mut(&mut self) -> &mut Attributes { &mut self.attributes }

    /// The JSON body parsed by [`JsonBody`](crate::middleware::JsonBody), if
    /// that middleware ran and the request carried one.
    pub fn json_body(&self) -> Option<&serde_json::Value> {
        self.attributes.get_json(JSON_BODY)
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }
}
