//! Polling file watcher with debounce.
//!
//! Each watched path is fingerprinted by existence and the SHA-256 of its
//! contents, so touching a file without changing it is not a change. A change
//! is reported once fingerprints have stayed identical for the debounce
//! window. Callbacks run on the watcher thread, one at a time.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::WatchConfig;

/// Content identity of one watched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fingerprint {
    Missing,
    Present([u8; 32]),
}

impl Fingerprint {
    /// Fingerprints `path`. Unreadable files count as missing.
    pub fn of(path: &Path) -> Self {
        match fs::read(path) {
            Ok(bytes) => {
                let mut digest = [0u8; 32];
                digest.copy_from_slice(&Sha256::digest(&bytes));
                Self::Present(digest)
            }
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    debug!(path = %path.display(), error = %e, "Cannot fingerprint watched file");
                }
                Self::Missing
            }
        }
    }
}

/// Watches a fixed set of paths for content changes.
#[derive(Debug, Clone)]
pub struct ConfigWatcher {
    paths: Vec<PathBuf>,
    poll_interval: Duration,
    debounce: Duration,
}

impl ConfigWatcher {
    pub fn new(paths: Vec<PathBuf>, config: &WatchConfig) -> Self {
        Self {
            paths,
            poll_interval: config.poll_interval(),
            debounce: config.debounce(),
        }
    }

    /// Starts the watcher thread. `on_change` receives the paths whose
    /// fingerprint changed.
    pub fn spawn<F>(self, on_change: F) -> std::io::Result<WatchHandle>
    where
        F: FnMut(&[PathBuf]) + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel();
        let thread = std::thread::Builder::new()
            .name("collection-schema-watch".into())
            .spawn(move || self.run(stop_rx, on_change))?;
        Ok(WatchHandle {
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }

    fn snapshot(&self) -> Vec<Fingerprint> {
        self.paths.iter().map(|p| Fingerprint::of(p)).collect()
    }

    fn run<F>(self, stop: mpsc::Receiver<()>, mut on_change: F)
    where
        F: FnMut(&[PathBuf]),
    {
        info!(paths = self.paths.len(), "Watching schema definition files");
        let mut baseline = self.snapshot();
        let mut pending: Option<(Vec<Fingerprint>, Instant)> = None;

        loop {
            match stop.recv_timeout(self.poll_interval) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }

            let current = self.snapshot();
            let candidate = match pending.as_mut() {
                None => {
                    if current != baseline {
                        pending = Some((current, Instant::now()));
                    }
                    continue;
                }
                Some((candidate, since)) => {
                    if current != *candidate {
                        *candidate = current;
                        *since = Instant::now();
                        continue;
                    }
                    if since.elapsed() < self.debounce {
                        continue;
                    }
                    candidate
                }
            };

            let changed: Vec<PathBuf> = self
                .paths
                .iter()
                .zip(baseline.iter().zip(candidate.iter()))
                .filter(|(_, (before, after))| before != after)
                .map(|(path, _)| path.clone())
                .collect();
            baseline = current;
            pending = None;

            if !changed.is_empty() {
                debug!(changed = changed.len(), "Schema definition changed");
                on_change(&changed);
            }
        }
        debug!("Watcher stopped");
    }
}

/// Running watcher. Stops and joins its thread on [`stop`](Self::stop) or
/// drop.
#[derive(Debug)]
pub struct WatchHandle {
    stop: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl WatchHandle {
    pub fn stop(mut self) {
        self.shutdown();
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                debug!("Watcher thread panicked");
            }
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
