use std::collections::VecDeque;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, SyncSender};
use std::sync::{Mutex, MutexGuard};
use std::thread;

use tracing::{debug, warn};

use crate::config::FanoutOptions;
use crate::error::FanoutError;

/// One unit of work, bound to a single input position and its output slot.
struct Task<'a, I, T> {
    index: usize,
    id: &'a I,
    slot: &'a mut Option<T>,
}

struct Failure {
    index: usize,
    id: String,
    error: anyhow::Error,
}

/// Read by every task; only the two counters are ever written.
struct Shared<'a, F> {
    fetch: &'a F,
    failed: &'a AtomicBool,
    panicked: &'a AtomicUsize,
    cancel_on_failure: bool,
}

/// Fetch one item per identifier concurrently and return them in input order.
///
/// Behavior:
/// - every task runs to completion (or is skipped, see below) before this returns
/// - `result[i]` is the item fetched for `ids[i]`, whatever order fetches finish in
/// - with `max_parallel = None` each identifier gets its own thread, otherwise
///   `min(max_parallel, ids.len())` workers drain a shared queue
/// - a panicking fetch is contained to its own task; the worker moves on to the
///   next queued task and the panic is reported once everything has finished
/// - with `cancel_on_failure`, tasks that have not started yet are skipped once any
///   fetch has failed; in-flight fetches are never interrupted
/// - on failure no items are returned; the failure with the lowest input index is
///   reported along with the total number of failed fetches
pub fn fan_out<I, T, F>(ids: &[I], fetch: F, opts: &FanoutOptions) -> Result<Vec<T>, FanoutError>
where
    I: Display + Sync,
    T: Send,
    F: Fn(&I) -> anyhow::Result<T> + Sync,
{
    if opts.max_parallel == Some(0) {
        return Err(FanoutError::InvalidParallelism);
    }
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let expected_count = ids.len();
    let mut slots: Vec<Option<T>> = (0..expected_count).map(|_| None).collect();
    // Sized to the task count so a failing task never waits on the reader.
    let (failures_tx, failures_rx) = mpsc::sync_channel::<Failure>(expected_count);
    let failed = AtomicBool::new(false);
    let panicked = AtomicUsize::new(0);
    let shared = Shared {
        fetch: &fetch,
        failed: &failed,
        panicked: &panicked,
        cancel_on_failure: opts.cancel_on_failure,
    };

    let tasks = slots
        .iter_mut()
        .zip(ids)
        .enumerate()
        .map(|(index, (slot, id))| Task { index, id, slot });

    // Unbounded: every task gets its own thread. Bounded: workers drain a queue.
    let (direct, queued): (Vec<_>, VecDeque<_>) = match opts.max_parallel {
        None => (tasks.collect(), VecDeque::new()),
        Some(_) => (Vec::new(), tasks.collect()),
    };
    let worker_count = opts
        .max_parallel
        .map_or(0, |max_parallel| max_parallel.min(expected_count));
    let queue = Mutex::new(queued);

    let lost_threads = thread::scope(|s| {
        let shared = &shared;
        let queue = &queue;
        let mut handles = Vec::with_capacity(direct.len() + worker_count);

        for task in direct {
            let tx = failures_tx.clone();
            handles.push(s.spawn(move || run_guarded(task, shared, &tx)));
        }
        for _ in 0..worker_count {
            let tx = failures_tx.clone();
            handles.push(s.spawn(move || loop {
                let task = lock(queue).pop_front();
                let Some(task) = task else {
                    break;
                };
                run_guarded(task, shared, &tx);
            }));
        }
        debug!(tasks = expected_count, threads = handles.len(), "fan-out launched");

        handles
            .into_iter()
            .map(|h| h.join())
            .filter(|joined| joined.is_err())
            .count()
    });
    drop(queue);
    drop(failures_tx);

    let panicked = panicked.load(Ordering::SeqCst) + lost_threads;
    if panicked > 0 {
        return Err(FanoutError::TaskPanicked { panicked });
    }

    let mut failures: Vec<Failure> = failures_rx.into_iter().collect();
    if !failures.is_empty() {
        failures.sort_by_key(|f| f.index);
        let total = failures.len();
        if let Some(first) = failures.into_iter().next() {
            return Err(FanoutError::Fetch {
                index: first.index,
                id: first.id,
                failed: total,
                source: first.error,
            });
        }
    }

    let items: Vec<T> = slots.into_iter().flatten().collect();
    debug_assert_eq!(items.len(), expected_count);
    Ok(items)
}

/// Run one task, containing a panic in the fetch to that task alone.
fn run_guarded<I, T, F>(
    task: Task<'_, I, T>,
    shared: &Shared<'_, F>,
    failures: &SyncSender<Failure>,
)
where
    I: Display,
    F: Fn(&I) -> anyhow::Result<T>,
{
    let (index, id) = (task.index, task.id);
    if panic::catch_unwind(AssertUnwindSafe(|| run_task(task, shared, failures))).is_err() {
        shared.panicked.fetch_add(1, Ordering::SeqCst);
        shared.failed.store(true, Ordering::SeqCst);
        warn!(index, id = %id, "fetch panicked");
    }
}

fn run_task<I, T, F>(task: Task<'_, I, T>, shared: &Shared<'_, F>, failures: &SyncSender<Failure>)
where
    I: Display,
    F: Fn(&I) -> anyhow::Result<T>,
{
    let Task { index, id, slot } = task;

    if shared.cancel_on_failure && shared.failed.load(Ordering::SeqCst) {
        debug!(index, id = %id, "fetch skipped after earlier failure");
        return;
    }

    debug!(index, id = %id, "fetch started");
    match (shared.fetch)(id) {
        Ok(item) => {
            *slot = Some(item);
            debug!(index, id = %id, "fetch finished");
        }
        Err(error) => {
            shared.failed.store(true, Ordering::SeqCst);
            warn!(index, id = %id, error = %format!("{error:#}"), "fetch failed");
            // Capacity covers every task; the receiver outlives all senders.
            let _ = failures.send(Failure {
                index,
                id: id.to_string(),
                error,
            });
        }
    }
}

fn lock<X>(m: &Mutex<X>) -> MutexGuard<'_, X> {
    match m.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}
