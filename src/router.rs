//! The router (`spec.md` §4.8): dispatches events from the bounded queue
//! to the first matching route's policy expression, across a worker pool
//! of native OS threads.
//!
//! Workers are OS threads rather than async tasks because leaf terms
//! (`wdb_update`, KVDB calls) block the calling thread for the duration of
//! their I/O (`spec.md` §5) — there is no executor underneath to yield to
//! mid-evaluation, so a thread-per-worker pool draining a blocking queue
//! is the natural fit, the same way the event-bus sink workers in this
//! codebase's ancestry each own one loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::event::Event;
use crate::expr::Expression;
use crate::queue::EventQueue;
use crate::route::{Route, RouteError, RouteTable};

/// How often an idle worker re-checks the stop flag while no event is
/// available.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct Router {
    table: Arc<RwLock<RouteTable>>,
    stop: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            table: Arc::new(RwLock::new(RouteTable::new())),
            stop: Arc::new(AtomicBool::new(false)),
            workers: Vec::new(),
        }
    }

    /// Add a route with an already-compiled filter and policy expression.
    /// Compilation (asset lookup, helper building) happens upstream in the
    /// asset/policy compiler, which surfaces `CompilerError` synchronously
    /// to the caller before a route ever reaches the table (`spec.md`
    /// §4.8: "errors in compilation surface synchronously").
    pub fn add_route(
        &self,
        name: impl Into<String>,
        priority: i64,
        filter: Expression,
        policy: Expression,
    ) -> Result<(), RouteError> {
        self.table.write().add(name, priority, filter, policy)
    }

    pub fn remove_route(&self, name: &str) -> bool {
        self.table.write().remove(name)
    }

    pub fn clear(&self) {
        self.table.write().clear();
    }

    /// A snapshot of the current route table, in dispatch order.
    pub fn route_table_snapshot(&self) -> Vec<Route> {
        self.table.read().routes().to_vec()
    }

    pub fn fast_enqueue_event(&self, queue: &EventQueue, event: Event) {
        queue.push(event);
    }

    /// Start `worker_count` OS threads, each draining `queue` and
    /// dispatching events against the route table until [`Router::stop`]
    /// is called and the queue runs dry.
    pub fn run(&mut self, queue: Arc<EventQueue>, worker_count: usize) {
        self.stop.store(false, Ordering::SeqCst);
        for index in 0..worker_count {
            let queue = queue.clone();
            let table = self.table.clone();
            let stop = self.stop.clone();
            let handle = thread::Builder::new()
                .name(format!("router-worker-{index}"))
                .spawn(move || worker_loop(&queue, &table, &stop))
                .expect("failed to spawn router worker thread");
            self.workers.push(handle);
        }
    }

    /// Request cooperative shutdown: workers drain the queue and exit;
    /// any in-flight evaluation runs to completion (`spec.md` §5).
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

fn worker_loop(queue: &EventQueue, table: &RwLock<RouteTable>, stop: &AtomicBool) {
    loop {
        let Some(event) = queue.pop_timeout(POLL_INTERVAL) else {
            if stop.load(Ordering::SeqCst) {
                return;
            }
            continue;
        };
        dispatch(event, table);
    }
}

fn dispatch(event: Event, table: &RwLock<RouteTable>) {
    let routes = table.read();
    for route in routes.routes() {
        let filter_result = route.filter.eval(event.clone());
        if filter_result.ok {
            trace!(route = %route.name, "route matched");
            let _ = route.policy.eval(filter_result.event);
            return;
        }
    }
    debug!("no route matched; dropping event");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Document;
    use crate::expr::EvalResult;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn always(ok: bool, name: &str) -> Expression {
        Expression::term(name.to_string(), Arc::new(move |e| {
            if ok {
                EvalResult::success(e, "ok")
            } else {
                EvalResult::failure(e, "fail")
            }
        }))
    }

    fn mutating_policy(field: &'static str) -> Expression {
        Expression::term("mark", Arc::new(move |e: Event| {
            e.set_bool(field, true).unwrap();
            EvalResult::success(e, "marked")
        }))
    }

    #[test]
    fn dispatches_to_the_first_matching_route_by_priority() {
        let mut router = Router::new();
        router.add_route("low-priority", 10, always(true, "f1"), mutating_policy("/low")).unwrap();
        router.add_route("high-priority", 1, always(true, "f2"), mutating_policy("/high")).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let queue = Arc::new(EventQueue::new(crate::queue::QueueConfig {
            capacity: 8,
            flood_file: dir.path().join("flood.jsonl"),
            flood_attempts: 1,
            flood_sleep: Duration::from_millis(1),
        }));

        router.run(queue.clone(), 2);
        let event = Event::new(json!({}));
        queue.push(event.clone());

        // Give the worker pool a moment to drain the single queued event.
        for _ in 0..100 {
            if event.exists("/high") {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        router.stop();

        assert!(event.exists("/high"));
        assert!(!event.exists("/low"));
    }

    #[test]
    fn no_matching_route_drops_the_event_without_panicking() {
        let mut router = Router::new();
        router.add_route("never", 1, always(false, "f"), mutating_policy("/x")).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let queue = Arc::new(EventQueue::new(crate::queue::QueueConfig {
            capacity: 8,
            flood_file: dir.path().join("flood.jsonl"),
            flood_attempts: 1,
            flood_sleep: Duration::from_millis(1),
        }));
        router.run(queue.clone(), 1);
        queue.push(Event::new(json!({})));
        thread::sleep(Duration::from_millis(150));
        router.stop();
    }
}
