//! Shared helpers for integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use switchyard::{Middleware, Next, RequestContext};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// Ordered record of what ran, shared between middleware and handlers.
#[derive(Clone, Default)]
pub struct Events(Arc<Mutex<Vec<String>>>);

impl Events {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

/// Middleware that records `<name>-enter` / `<name>-exit` around `next`.
pub fn recorder(name: &'static str, events: &Events) -> impl Middleware {
    let events = events.clone();
    move |ctx: RequestContext, next: Next| {
        let events = events.clone();
        async move {
            events.push(format!("{name}-enter"));
            let outcome = next.run(ctx).await;
            events.push(format!("{name}-exit"));
            outcome
        }
    }
}

/// Counts `ERROR` events emitted while it is the default subscriber.
#[derive(Clone, Default)]
pub struct ErrorCounter(Arc<AtomicUsize>);

impl ErrorCounter {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl<S: tracing::Subscriber> Layer<S> for ErrorCounter {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == tracing::Level::ERROR {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}
