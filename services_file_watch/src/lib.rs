//! # Score File Watcher
//!
//! Edge-triggered change detection for one watched path. A background
//! thread polls the file at a fixed interval and fires the caller's
//! callback once per *content* change, judged by SHA-256 digest rather
//! than timestamps, so touch-without-change and identical re-saves stay
//! silent.
//!
//! The consumer of a change often re-saves the same path with derived
//! output, which would immediately re-trigger the watcher. Suppression is
//! explicit: [`WatchHandle::silenced_write`] runs the save under the
//! watcher's digest lock and re-arms on the new content before any poll
//! can observe it; [`WatchHandle::acknowledge_write`] is the bare re-arm
//! for writes that already happened.

use log::{debug, info};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

/// Default pacing of the poll loop
pub const DEFAULT_POLL: Duration = Duration::from_millis(200);

type ContentDigest = [u8; 32];

/// Errors surfaced by watcher operations
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("failed to read watched file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot acknowledge a write to missing file {}", .0.display())]
    Missing(PathBuf),

    #[error("failed to spawn watcher thread: {0}")]
    Spawn(String),

    #[error("watcher thread panicked")]
    Panicked,
}

/// Configures and spawns the watcher for one path
pub struct ScoreWatcher {
    path: PathBuf,
    poll: Duration,
}

impl ScoreWatcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            poll: DEFAULT_POLL,
        }
    }

    pub fn with_poll(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    /// Starts the poll thread; `on_change` runs on it, once per change
    ///
    /// A file that already exists arms the watcher with its current
    /// content and does not fire. A missing file is not an error; the
    /// first appearance counts as a change.
    pub fn spawn<F>(self, mut on_change: F) -> Result<WatchHandle, WatchError>
    where
        F: FnMut(&Path) + Send + 'static,
    {
        let initial = digest_file(&self.path)?;
        let shared = Arc::new(WatchShared {
            running: AtomicBool::new(true),
            last_seen: Mutex::new(initial),
        });

        let path = self.path.clone();
        let state = Arc::clone(&shared);
        let poll = self.poll;
        let thread = std::thread::Builder::new()
            .name("score-watcher".to_string())
            .spawn(move || {
                info!("watching {} every {:?}", path.display(), poll);
                while state.running.load(Ordering::SeqCst) {
                    match digest_file(&path) {
                        Ok(Some(digest)) => {
                            let changed = {
                                let mut last = state.lock_last_seen();
                                if last.as_ref() != Some(&digest) {
                                    *last = Some(digest);
                                    true
                                } else {
                                    false
                                }
                            };
                            if changed {
                                debug!("content change on {}", path.display());
                                on_change(&path);
                            }
                        }
                        // Missing is not a change; the watcher stays armed
                        // on whatever it saw last.
                        Ok(None) => {}
                        Err(err) => debug!("poll failed: {}", err),
                    }
                    std::thread::sleep(poll);
                }
            })
            .map_err(|err| WatchError::Spawn(err.to_string()))?;

        Ok(WatchHandle {
            path: self.path,
            shared,
            thread: Some(thread),
        })
    }
}

struct WatchShared {
    running: AtomicBool,
    last_seen: Mutex<Option<ContentDigest>>,
}

impl WatchShared {
    fn lock_last_seen(&self) -> MutexGuard<'_, Option<ContentDigest>> {
        match self.last_seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Controls a running watcher
pub struct WatchHandle {
    path: PathBuf,
    shared: Arc<WatchShared>,
    thread: Option<JoinHandle<()>>,
}

impl WatchHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-arms the watcher on the file's current content without firing
    ///
    /// Call after re-saving the watched path. A poll that lands between
    /// the save and this call still fires; wrap the save in
    /// [`silenced_write`](WatchHandle::silenced_write) to close that
    /// window.
    pub fn acknowledge_write(&self) -> Result<(), WatchError> {
        let mut last = self.shared.lock_last_seen();
        match digest_file(&self.path)? {
            Some(digest) => {
                *last = Some(digest);
                Ok(())
            }
            None => Err(WatchError::Missing(self.path.clone())),
        }
    }

    /// Runs `write` under the watcher's digest lock and re-arms afterwards
    ///
    /// No poll can observe the file between the write and the re-arm, so
    /// the consumer's own save never fires the callback. The closure must
    /// not call back into this handle.
    pub fn silenced_write<T>(&self, write: impl FnOnce() -> T) -> Result<T, WatchError> {
        let mut last = self.shared.lock_last_seen();
        let out = write();
        match digest_file(&self.path)? {
            Some(digest) => {
                *last = Some(digest);
                Ok(out)
            }
            None => Err(WatchError::Missing(self.path.clone())),
        }
    }

    /// Stops the poll loop and joins the thread
    pub fn stop(mut self) -> Result<(), WatchError> {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            thread.join().map_err(|_| WatchError::Panicked)?;
        }
        Ok(())
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn digest_file(path: &Path) -> Result<Option<ContentDigest>, WatchError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(WatchError::Io {
                path: path.to_path_buf(),
                source: err,
            })
        }
    };
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(Some(hasher.finalize().into()))
}
