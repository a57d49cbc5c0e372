//! Runs a search on a worker thread and hands its findings to a polling
//! front end.
//!
//! The worker never touches the visible result list. It appends to a small
//! mutex-guarded mailbox, and the front end drains that mailbox on a fixed
//! tick by calling [`SearchSession::poll`]. This keeps every piece of
//! presentation state on the front end's own thread.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::criteria::SearchCriteria;
use crate::errors::{SearchError, SearchResult};
use crate::external::run_external_search;
use crate::results::{FoundFile, SearchOutput, SearchSummary};
use crate::stats::SearchStats;
use crate::walker::{SearchMessage, WalkOutcome, Walker};

/// Number of steps in the progress pulse
pub const PROGRESS_MAX: u32 = 50;
/// Default time between two polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

const WORKER_NAME: &str = "cmdsearch-worker";
const REAPER_NAME: &str = "cmdsearch-reaper";

/// Which engine the worker runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchBackend {
    /// Built-in walker
    #[default]
    Internal,
    /// The system `find` and `grep` commands
    External,
}

#[derive(Debug, Default)]
struct Mailbox {
    pending: Vec<FoundFile>,
    status: Option<String>,
}

/// Flags shared by the worker and the front end
#[derive(Debug, Default)]
struct RunFlags {
    stopped: AtomicBool,
    done: AtomicBool,
    closed: AtomicBool,
}

#[derive(Debug, Default)]
struct Shared {
    flags: RunFlags,
    mailbox: Mutex<Mailbox>,
}

/// Everything one poll tick produced
#[derive(Debug, Clone, Default)]
pub struct PollUpdate {
    /// Files drained from the worker since the previous tick
    pub new_files: Vec<FoundFile>,
    /// Latest status text, if the worker posted one
    pub status: Option<String>,
    /// Position of the progress pulse, `0..PROGRESS_MAX`
    pub progress: u32,
    /// Set once the run is over; polling should stop
    pub finished: Option<SearchSummary>,
}

impl PollUpdate {
    pub fn keep_polling(&self) -> bool {
        self.finished.is_none()
    }

    /// Progress pulse as a fraction in `0.0..1.0`
    pub fn fraction(&self) -> f64 {
        f64::from(self.progress) / f64::from(PROGRESS_MAX)
    }
}

/// One search window's worth of state: at most one worker at a time,
/// the visible results, and the poll tick that connects them.
#[derive(Debug)]
pub struct SearchSession {
    poll_interval: Duration,
    backend: SearchBackend,
    shared: Option<Arc<Shared>>,
    worker: Option<JoinHandle<SearchResult<WalkOutcome>>>,
    results: SearchOutput,
    stats: SearchStats,
    progress: u32,
    summary: Option<SearchSummary>,
    error: Option<SearchError>,
}

impl Default for SearchSession {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl SearchSession {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            backend: SearchBackend::default(),
            shared: None,
            worker: None,
            results: SearchOutput::new(),
            stats: SearchStats::new(),
            progress: 0,
            summary: None,
            error: None,
        }
    }

    pub fn with_backend(mut self, backend: SearchBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn backend(&self) -> SearchBackend {
        self.backend
    }

    /// Starts a new run, replacing whatever the previous one found.
    ///
    /// Patterns are compiled and the root is checked here, so those errors
    /// come back before any thread is spawned. A previous worker is stopped
    /// and joined first.
    pub fn start(&mut self, root: &Path, criteria: &SearchCriteria) -> SearchResult<()> {
        self.join_worker();

        let stats = SearchStats::new();
        let compiled = criteria.compile(&stats)?;

        let root_meta = fs::metadata(root).map_err(|e| SearchError::from_io(root, e))?;
        if !root_meta.is_dir() {
            return Err(SearchError::config_error(format!(
                "Not a directory: {}",
                root.display()
            )));
        }

        self.results = SearchOutput::new();
        self.stats = stats.clone();
        self.progress = 0;
        self.summary = None;
        self.error = None;

        let shared = Arc::new(Shared::default());
        let worker_shared = Arc::clone(&shared);
        let root: PathBuf = root.to_path_buf();
        let criteria = criteria.clone();
        let backend = self.backend;
        let walker = Walker::new(compiled, stats);

        info!("Starting {:?} search in {}", backend, root.display());

        let handle = thread::Builder::new()
            .name(WORKER_NAME.to_string())
            .spawn(move || {
                let flags = &worker_shared.flags;
                let mut on_message = |message: SearchMessage| {
                    let mut mailbox = worker_shared.mailbox.lock();
                    match message {
                        SearchMessage::Found(file) => mailbox.pending.push(file),
                        SearchMessage::Status(text) => {
                            if !flags.closed.load(Ordering::Relaxed) {
                                mailbox.status = Some(text);
                            }
                        }
                    }
                };

                let result = match backend {
                    SearchBackend::Internal => walker.walk(&root, &flags.stopped, &mut on_message),
                    SearchBackend::External => {
                        run_external_search(&criteria, &root, &flags.stopped, &mut on_message)
                    }
                };

                flags.done.store(true, Ordering::Release);
                result
            })
            .map_err(SearchError::IoError)?;

        self.shared = Some(shared);
        self.worker = Some(handle);
        Ok(())
    }

    /// Asks the worker to stop at its next check
    pub fn stop(&self) {
        if let Some(shared) = &self.shared {
            debug!("Stop requested");
            shared.flags.stopped.store(true, Ordering::Release);
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared
            .as_ref()
            .is_some_and(|s| !s.flags.done.load(Ordering::Acquire))
            && self.summary.is_none()
    }

    /// One tick of the front end's timer.
    ///
    /// Drains the mailbox into the visible results, then decides whether
    /// the front end should poll again. A session with no run, or one that
    /// was closed, reports itself finished.
    pub fn poll(&mut self) -> PollUpdate {
        self.reap_worker();

        if let Some(summary) = &self.summary {
            return PollUpdate {
                progress: self.progress,
                finished: Some(summary.clone()),
                ..Default::default()
            };
        }

        let Some(shared) = self.shared.clone() else {
            return PollUpdate {
                finished: Some(SearchSummary {
                    matches: self.results.len(),
                    aborted: false,
                }),
                ..Default::default()
            };
        };

        self.progress = (self.progress + 1) % PROGRESS_MAX;

        let (new_files, status) = {
            let mut mailbox = shared.mailbox.lock();
            (mem::take(&mut mailbox.pending), mailbox.status.take())
        };

        for file in &new_files {
            self.results.add_file(file.clone());
        }

        let done = shared.flags.done.load(Ordering::Acquire);
        let stopped = shared.flags.stopped.load(Ordering::Acquire);
        let pending = !shared.mailbox.lock().pending.is_empty();

        let finished = if (!done && !stopped) || pending {
            None
        } else {
            Some(self.finish(done, stopped))
        };

        PollUpdate {
            new_files,
            status,
            progress: self.progress,
            finished,
        }
    }

    fn finish(&mut self, done: bool, stopped: bool) -> SearchSummary {
        let mut aborted = stopped;

        // A stopped worker that has not returned yet is joined by a later
        // poll or take_error, once it sets `done`
        if done {
            if let Some(handle) = self.worker.take() {
                aborted |= self.collect_worker(handle);
            }
        }

        self.record_summary(aborted)
    }

    fn record_summary(&mut self, aborted: bool) -> SearchSummary {
        self.results.stopped = aborted;
        let summary = SearchSummary {
            matches: self.results.len(),
            aborted,
        };
        info!("{}", summary.message());
        self.summary = Some(summary.clone());
        summary
    }

    /// Joins a finished worker and keeps its error. Returns whether the
    /// run ended early.
    fn collect_worker(&mut self, handle: JoinHandle<SearchResult<WalkOutcome>>) -> bool {
        match handle.join() {
            Ok(Ok(outcome)) => {
                debug!("Worker joined after {} matches", outcome.matches);
                outcome.stopped
            }
            Ok(Err(e)) => {
                error!("Search failed: {}", e);
                self.error = Some(e);
                true
            }
            Err(_) => {
                error!("Search worker panicked");
                true
            }
        }
    }

    /// Joins a worker that outlived its run, but only once it has returned
    fn reap_worker(&mut self) {
        let done = self
            .shared
            .as_ref()
            .is_some_and(|s| s.flags.done.load(Ordering::Acquire));
        if done && self.summary.is_some() {
            if let Some(handle) = self.worker.take() {
                self.collect_worker(handle);
            }
        }
    }

    /// Polls on the calling thread every `poll_interval` until the run ends
    pub fn run_to_completion(&mut self, mut on_update: impl FnMut(&PollUpdate)) -> SearchSummary {
        loop {
            let update = self.poll();
            on_update(&update);
            if let Some(summary) = update.finished {
                return summary;
            }
            thread::sleep(self.poll_interval);
        }
    }

    /// Files found so far, in the order they were drained
    pub fn results(&self) -> &[FoundFile] {
        &self.results.files
    }

    /// Directories that contain at least one drained match
    pub fn match_dirs(&self) -> &[PathBuf] {
        &self.results.match_dirs
    }

    pub fn output(&self) -> &SearchOutput {
        &self.results
    }

    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    pub fn summary(&self) -> Option<&SearchSummary> {
        self.summary.as_ref()
    }

    /// Error that ended the last run after it started.
    ///
    /// A stopped run finishes before its worker has returned. An error the
    /// worker reports while winding down appears here once it has exited.
    pub fn take_error(&mut self) -> Option<SearchError> {
        self.reap_worker();
        self.error.take()
    }

    /// Tears the session down without waiting for the worker.
    ///
    /// The run is stopped and reported as aborted. A worker that is still
    /// busy, e.g. blocked in a read, is joined on a separate thread.
    pub fn close(&mut self) {
        let Some(shared) = self.shared.take() else {
            return;
        };
        shared.flags.closed.store(true, Ordering::Release);
        shared.flags.stopped.store(true, Ordering::Release);

        if self.summary.is_none() {
            self.record_summary(true);
        }

        if let Some(handle) = self.worker.take() {
            if shared.flags.done.load(Ordering::Acquire) {
                self.collect_worker(handle);
            } else {
                release_worker(handle);
            }
        }
    }

    /// Stops the current worker and waits for it. Used before a new run.
    fn join_worker(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.flags.stopped.store(true, Ordering::Release);
        }
        if let Some(handle) = self.worker.take() {
            match handle.join() {
                Ok(Ok(outcome)) => debug!("Worker joined after {} matches", outcome.matches),
                Ok(Err(e)) => debug!("Worker ended with an error: {}", e),
                Err(_) => error!("Search worker panicked"),
            }
        }
    }
}

/// Hands a still-running worker to a reaper thread that waits for it
fn release_worker(handle: JoinHandle<SearchResult<WalkOutcome>>) {
    let reaper = thread::Builder::new()
        .name(REAPER_NAME.to_string())
        .spawn(move || match handle.join() {
            Ok(Ok(outcome)) => debug!("Closed worker exited after {} matches", outcome.matches),
            Ok(Err(e)) => warn!("Closed worker ended with an error: {}", e),
            Err(_) => error!("Search worker panicked"),
        });
    if let Err(e) = reaper {
        warn!("Detaching search worker, no reaper thread: {}", e);
    }
}

impl Drop for SearchSession {
    fn drop(&mut self) {
        self.close();
    }
}
