//! Single-flight schema cache.
//!
//! Wraps a [`CompilePipeline`] so that it runs at most once per cache
//! generation. Callers that arrive while a compilation is in flight block on
//! that same flight and receive its result.
//!
//! State machine:
//!
//! ```text
//! Empty --load--> Loading(flight) --ok--> Ready(set)
//!   ^                  |                     |
//!   +------err---------+                     |
//!   +-----------------invalidate-------------+
//! ```
//!
//! `invalidate` during `Loading` moves to `Empty` immediately. The in-flight
//! compilation still completes for the callers already waiting on it, but its
//! result is not stored.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use collection_schema_core::SchemaSet;
use tracing::{debug, info, warn};

use crate::error::CompileError;
use crate::pipeline::CompilePipeline;

type FlightResult = Result<Arc<SchemaSet>, CompileError>;

/// Observable cache state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Empty,
    Loading,
    Ready,
}

/// Instrumentation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Pipeline executions started.
    pub pipeline_runs: u64,
    /// Loads answered from a ready cache.
    pub cache_hits: u64,
    /// Loads that waited on another caller's flight.
    pub joined_waiters: u64,
}

/// One in-flight compilation and the slot its waiters read.
#[derive(Debug, Default)]
struct Flight {
    result: Mutex<Option<FlightResult>>,
    done: Condvar,
}

impl Flight {
    fn complete(&self, result: FlightResult) {
        let mut slot = lock(&self.result);
        if slot.is_none() {
            *slot = Some(result);
            self.done.notify_all();
        }
    }

    fn wait(&self) -> FlightResult {
        let mut slot = lock(&self.result);
        loop {
            if let Some(result) = slot.as_ref() {
                return result.clone();
            }
            slot = self
                .done
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

enum CacheState {
    Empty,
    Loading(Arc<Flight>),
    Ready(Arc<SchemaSet>),
}

/// Process-wide cache over one [`CompilePipeline`].
pub struct SchemaCache {
    pipeline: Box<dyn CompilePipeline>,
    state: Mutex<CacheState>,
    pipeline_runs: AtomicU64,
    cache_hits: AtomicU64,
    joined_waiters: AtomicU64,
}

impl SchemaCache {
    pub fn new(pipeline: impl CompilePipeline + 'static) -> Self {
        Self {
            pipeline: Box::new(pipeline),
            state: Mutex::new(CacheState::Empty),
            pipeline_runs: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            joined_waiters: AtomicU64::new(0),
        }
    }

    /// Returns the compiled schema set, compiling it if needed.
    ///
    /// Blocks while a compilation is in flight. On failure the cache is left
    /// empty so the next call retries.
    pub fn load(&self) -> Result<Arc<SchemaSet>, CompileError> {
        let flight = {
            let mut state = lock(&self.state);
            match &*state {
                CacheState::Ready(set) => {
                    self.cache_hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(Arc::clone(set));
                }
                CacheState::Loading(flight) => {
                    self.joined_waiters.fetch_add(1, Ordering::Relaxed);
                    let flight = Arc::clone(flight);
                    drop(state);
                    debug!("Joining in-flight schema compilation");
                    return flight.wait();
                }
                CacheState::Empty => {
                    let flight = Arc::new(Flight::default());
                    *state = CacheState::Loading(Arc::clone(&flight));
                    flight
                }
            }
        };

        let mut guard = FlightGuard {
            cache: self,
            flight,
            finished: false,
        };
        self.pipeline_runs.fetch_add(1, Ordering::Relaxed);
        let result = self.pipeline.compile().map(Arc::new);
        guard.finish(result.clone());
        result
    }

    /// Discards any cached or in-flight result.
    pub fn invalidate(&self) {
        let mut state = lock(&self.state);
        let previous = std::mem::replace(&mut *state, CacheState::Empty);
        match previous {
            CacheState::Empty => {}
            CacheState::Loading(_) => debug!("Invalidated schema cache during compilation"),
            CacheState::Ready(_) => debug!("Invalidated schema cache"),
        }
    }

    pub fn status(&self) -> CacheStatus {
        match &*lock(&self.state) {
            CacheState::Empty => CacheStatus::Empty,
            CacheState::Loading(_) => CacheStatus::Loading,
            CacheState::Ready(_) => CacheStatus::Ready,
        }
    }

    /// The ready schema set, without compiling.
    pub fn cached(&self) -> Option<Arc<SchemaSet>> {
        match &*lock(&self.state) {
            CacheState::Ready(set) => Some(Arc::clone(set)),
            _ => None,
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            pipeline_runs: self.pipeline_runs.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            joined_waiters: self.joined_waiters.load(Ordering::Relaxed),
        }
    }

    /// Loads on a background thread and logs the outcome.
    pub fn warm_in_background(self: &Arc<Self>) -> std::io::Result<JoinHandle<()>> {
        let cache = Arc::clone(self);
        std::thread::Builder::new()
            .name("collection-schema-warm".into())
            .spawn(move || match cache.load() {
                Ok(set) => info!(collections = set.len(), "Schema cache warmed"),
                Err(e) => warn!(error = %e, "Schema cache warm-up failed"),
            })
    }
}

impl std::fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaCache")
            .field("status", &self.status())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Publishes a flight's result, or [`CompileError::Aborted`] if the pipeline
/// unwinds first.
struct FlightGuard<'a> {
    cache: &'a SchemaCache,
    flight: Arc<Flight>,
    finished: bool,
}

impl FlightGuard<'_> {
    fn finish(&mut self, result: FlightResult) {
        self.finished = true;
        {
            let mut state = lock(&self.cache.state);
            let current = matches!(&*state, CacheState::Loading(f) if Arc::ptr_eq(f, &self.flight));
            if current {
                *state = match &result {
                    Ok(set) => CacheState::Ready(Arc::clone(set)),
                    Err(_) => CacheState::Empty,
                };
            } else {
                debug!("Discarding result of invalidated compilation");
            }
        }
        self.flight.complete(result);
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!("Schema compilation panicked");
            self.finish(Err(CompileError::Aborted));
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
