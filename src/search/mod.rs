//! Search coordination: worker pool, cancellation, fallback and events.

pub mod binary;
pub(crate) mod context;
pub(crate) mod reader;
pub(crate) mod scanner;

use rayon::iter::{ParallelBridge, ParallelIterator};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::buffer::BufferPool;
use crate::config::SearchSettings;
use crate::errors::{SearchError, SearchResult};
use crate::events::{SearchEvent, SearchObserver, GENERAL_ERROR_ID};
use crate::pattern::CompiledPattern;
use crate::progress::{CancelToken, ProgressSnapshot, SearchCounters, PROGRESS_TICK};
use crate::source::SourceProvider;

use self::binary::{ClassifierFactory, MimeGuessFactory, PREFIX_SNIFF_SIZE};
use self::scanner::FileScanner;

pub use self::scanner::MAX_FILE_SIZE;

/// State shared between the coordinator and its tasks.
pub(crate) struct EngineInner {
    pub(crate) pattern: CompiledPattern,
    pub(crate) provider: Arc<dyn SourceProvider>,
    pub(crate) settings: SearchSettings,
    pub(crate) classifier_factory: Arc<dyn ClassifierFactory>,
    pub(crate) observers: Mutex<Vec<Arc<dyn SearchObserver>>>,
    pub(crate) counters: SearchCounters,
    pub(crate) cancel: CancelToken,
    pub(crate) search_done: AtomicBool,
    pub(crate) buffers: BufferPool,
}

impl EngineInner {
    /// Dispatches an event to every observer on the calling thread. The
    /// observer list is snapshotted first so no lock is held across
    /// subscriber code.
    pub(crate) fn emit(&self, event: &SearchEvent) {
        let observers: Vec<Arc<dyn SearchObserver>> = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in observers {
            observer.notify(event);
        }
    }
}

struct TaskHandles {
    counter: JoinHandle<()>,
    search: JoinHandle<()>,
    progress: JoinHandle<()>,
}

/// Drives a search run over a supply of data sources.
///
/// `begin` launches three tasks: a probe that counts the sources for
/// progress reporting, the search itself, and a periodic progress sampler.
/// Results and faults stream out through [`SearchObserver`]s; nothing is
/// returned to the caller after `begin`.
///
/// A first pass runs on a worker pool. If the source enumeration itself
/// fails with an I/O error under that pool, accumulated progress is reset
/// and the whole run is retried once on a single worker.
pub struct SearchCoordinator {
    inner: Arc<EngineInner>,
    tasks: Mutex<Option<TaskHandles>>,
}

impl SearchCoordinator {
    pub fn new(
        pattern: CompiledPattern,
        provider: Arc<dyn SourceProvider>,
        settings: SearchSettings,
    ) -> SearchResult<Self> {
        settings.validate()?;
        Ok(Self {
            inner: Arc::new(EngineInner {
                pattern,
                provider,
                settings,
                classifier_factory: Arc::new(MimeGuessFactory),
                observers: Mutex::new(Vec::new()),
                counters: SearchCounters::new(),
                cancel: CancelToken::default(),
                search_done: AtomicBool::new(false),
                buffers: BufferPool::new(PREFIX_SNIFF_SIZE),
            }),
            tasks: Mutex::new(None),
        })
    }

    /// Replaces the default MIME classifier factory.
    pub fn with_classifier_factory(mut self, factory: Arc<dyn ClassifierFactory>) -> Self {
        let inner = Arc::get_mut(&mut self.inner)
            .expect("classifier factory must be set before the search starts");
        inner.classifier_factory = factory;
        self
    }

    /// Registers an observer for subsequent runs.
    pub fn subscribe(&self, observer: Arc<dyn SearchObserver>) {
        self.inner
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// Current counter sample.
    pub fn progress(&self) -> ProgressSnapshot {
        self.inner.counters.snapshot()
    }

    /// Starts the search. Fails while a previous run's tasks have not been
    /// reaped with [`wait`](Self::wait) or [`cancel`](Self::cancel).
    pub fn begin(&self) -> SearchResult<()> {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if tasks.is_some() {
            return Err(SearchError::invalid_state(
                "a search is already in flight; call wait or cancel first",
            ));
        }

        self.inner.counters.reset_all();
        self.inner.cancel.reset();
        self.inner.search_done.store(false, Ordering::SeqCst);

        let counter = {
            let inner = Arc::clone(&self.inner);
            thread::spawn(move || count_sources(&inner))
        };
        let search = {
            let inner = Arc::clone(&self.inner);
            thread::spawn(move || run_search_task(&inner))
        };
        let progress = {
            let inner = Arc::clone(&self.inner);
            thread::spawn(move || run_progress_reporter(&inner))
        };

        *tasks = Some(TaskHandles {
            counter,
            search,
            progress,
        });
        Ok(())
    }

    /// Requests cancellation and blocks until every task has stopped.
    /// Safe to call repeatedly; later calls are no-ops.
    pub fn cancel(&self) {
        self.inner.cancel.cancel();
        self.join_tasks();
    }

    /// Blocks until the search, probe and progress tasks have terminated.
    pub fn wait(&self) {
        self.join_tasks();
    }

    fn join_tasks(&self) {
        let handles = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handles) = handles {
            let _ = handles.search.join();
            let _ = handles.progress.join();
            let _ = handles.counter.join();
        }
    }
}

/// Walks the source sequence once, only to count it. A failed or cancelled
/// walk leaves the total at 0, which consumers treat as unknown.
fn count_sources(inner: &EngineInner) {
    let mut count = 0u64;
    for item in inner.provider.sources() {
        if inner.cancel.is_cancelled() {
            return;
        }
        match item {
            Ok(_) => count += 1,
            Err(error) => {
                debug!("source count probe stopped: {}", error);
                return;
            }
        }
    }
    inner.counters.set_total(count);
}

fn run_progress_reporter(inner: &EngineInner) {
    loop {
        thread::sleep(PROGRESS_TICK);
        if inner.cancel.is_cancelled() || inner.search_done.load(Ordering::SeqCst) {
            break;
        }
        inner.emit(&SearchEvent::Progress(inner.counters.snapshot()));
    }
}

fn run_search_task(inner: &Arc<EngineInner>) {
    let started = Instant::now();
    info!("starting search with pattern: {}", inner.pattern.pattern());

    let fatal = match run_pass(inner, true) {
        Ok(()) => None,
        Err(error) if error.is_parallel_walk() => {
            warn!("parallel pass failed, retrying on one worker: {}", error);
            inner.counters.reset_progress();
            inner.emit(&SearchEvent::Reset);
            inner.emit(&SearchEvent::Error {
                source_id: GENERAL_ERROR_ID.to_string(),
                error: SearchError::Fallback {
                    cause: Box::new(error),
                },
            });
            run_pass(inner, false).err()
        }
        Err(error) => Some(error),
    };

    inner.search_done.store(true, Ordering::SeqCst);
    let counters = inner.counters.snapshot();
    info!(
        "search finished in {:?}: {} done, {} failed, {} skipped",
        started.elapsed(),
        counters.done,
        counters.failed,
        counters.skipped
    );
    inner.emit(&SearchEvent::Completed {
        elapsed: started.elapsed(),
        counters,
        error: fatal,
    });
}

/// Runs one scan pass over the whole source sequence.
///
/// Per-source failures are absorbed inside the workers; the only errors that
/// escape are enumeration failures and pool construction failures.
fn run_pass(inner: &Arc<EngineInner>, parallel: bool) -> SearchResult<()> {
    let threads = if parallel {
        inner.settings.thread_count.get()
    } else {
        1
    };
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|error| SearchError::WorkerPool(error.to_string()))?;
    debug!("scanning with {} worker threads", threads);

    pool.install(|| {
        inner.provider.sources().par_bridge().try_for_each_init(
            || FileScanner::new(Arc::clone(inner)),
            |scanner, item| -> SearchResult<()> {
                if inner.cancel.is_cancelled() {
                    return Ok(());
                }
                let source = item.map_err(|source| SearchError::ParallelWalk { source })?;
                scanner.scan_source(source.as_ref());
                Ok(())
            },
        )
    })
}
