//! A `/users` service: JSON body parsing, access logging, and a users
//! router mounted under `/users`.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example users
//!   RUST_LOG=info cargo run --example users -- switchyard.toml
//!
//! Try:
//!   curl http://localhost:3000/users
//!   curl http://localhost:3000/users/1
//!   curl -X POST http://localhost:3000/users \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"carol"}'
//!   curl -X DELETE http://localhost:3000/users/2

use std::collections::BTreeMap;
use std::sync::{Mutex, OnceLock};

use switchyard::middleware::{JsonBody, Logger};
use switchyard::{Config, Pipeline, RequestContext, Response, Router, Status};

#[tokio::main]
async fn main() -> Result<(), switchyard::Error> {
    tracing_subscriber::fmt::init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };

    let users = Router::new()
        .get("/",       list_users)
        .get("/:id",    get_user)
        .post("/",      create_user)
        .delete("/:id", delete_user);

    let mut app = Pipeline::with_config(Router::new().nest("/users", users), &config);
    app.use_middleware(JsonBody::new().limit(config.json_limit))?
       .use_middleware(Logger::new())?;

    app.start(&config.addr).await
}

// In-memory store; a real service would hold a database pool here.
type Store = Mutex<BTreeMap<u64, String>>;

fn store() -> &'static Store {
    static STORE: OnceLock<Store> = OnceLock::new();
    STORE.get_or_init(|| {
        let seed = [(1, "alice".to_owned()), (2, "bob".to_owned())];
        Mutex::new(seed.into_iter().collect())
    })
}

fn user_json(id: u64, name: &str) -> serde_json::Value {
    serde_json::json!({ "id": id, "name": name })
}

// GET /users
async fn list_users(_ctx: RequestContext) -> Result<Response, String> {
    let users: Vec<_> = {
        let store = store().lock().map_err(|e| e.to_string())?;
        store.iter().map(|(id, name)| user_json(*id, name)).collect()
    };
    let body = serde_json::to_vec(&users).map_err(|e| e.to_string())?;
    Ok(Response::json(body))
}

// GET /users/:id
async fn get_user(ctx: RequestContext) -> Result<Response, String> {
    let Some(id) = ctx.param("id").and_then(|id| id.parse::<u64>().ok()) else {
        return Ok(Response::status(Status::BadRequest));
    };
    let name = store().lock().map_err(|e| e.to_string())?.get(&id).cloned();
    match name {
        Some(name) => {
            let body = serde_json::to_vec(&user_json(id, &name)).map_err(|e| e.to_string())?;
            Ok(Response::json(body))
        }
        None => Ok(Response::status(Status::NotFound)),
    }
}

// POST /users
//
// The body was parsed by JsonBody before the router ran.
async fn create_user(ctx: RequestContext) -> Result<Response, String> {
    let Some(name) = ctx.json_body().and_then(|v| v["name"].as_str()) else {
        return Ok(Response::status(Status::UnprocessableContent));
    };
    let id = {
        let mut store = store().lock().map_err(|e| e.to_string())?;
        let id = store.keys().next_back().map_or(1, |last| last + 1);
        store.insert(id, name.to_owned());
        id
    };
    let body = serde_json::to_vec(&user_json(id, name)).map_err(|e| e.to_string())?;
    Ok(Response::builder()
        .status(Status::Created)
        .header("location", &format!("/users/{id}"))
        .json(body))
}

// DELETE /users/:id → 204 No Content
async fn delete_user(ctx: RequestContext) -> Result<Status, String> {
    let Some(id) = ctx.param("id").and_then(|id| id.parse::<u64>().ok()) else {
        return Ok(Status::BadRequest);
    };
    let removed = store().lock().map_err(|e| e.to_string())?.remove(&id);
    Ok(if removed.is_some() { Status::NoContent } else { Status::NotFound })
}
