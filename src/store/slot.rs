//! Per-file change tracking for hot reload.

use crate::error::Result;
use crate::storage;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

/// Tracks the last modification time seen for one source file.
///
/// The mutex doubles as the reopen lock: at most one thread reopens a given
/// file at a time, and a second thread arriving during a reopen waits and
/// then observes the recorded time, so it does not reopen again.
#[derive(Debug)]
pub(crate) struct FileWatch {
    /// Base path and extension for a companion whose spelling may change.
    companion: Option<(PathBuf, &'static str)>,
    state: Mutex<Watched>,
    failed: AtomicBool,
}

#[derive(Debug)]
struct Watched {
    path: PathBuf,
    seen: Option<SystemTime>,
}

impl FileWatch {
    /// Watch a file at a fixed path.
    pub(crate) fn new(path: PathBuf, seen: Option<SystemTime>) -> Self {
        Self {
            companion: None,
            state: Mutex::new(Watched { path, seen }),
            failed: AtomicBool::new(false),
        }
    }

    /// Watch the `ext` companion of `base`. While the file is missing its
    /// path is resolved again on every refresh, so a companion created
    /// later in any letter case is found.
    pub(crate) fn companion(base: &Path, ext: &'static str, seen: Option<SystemTime>) -> Self {
        Self {
            companion: Some((base.to_path_buf(), ext)),
            state: Mutex::new(Watched {
                path: storage::companion(base, ext),
                seen,
            }),
            failed: AtomicBool::new(false),
        }
    }

    /// Whether the last reopen failed.
    pub(crate) fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Run `reopen` with the file's path if its modification time differs
    /// from the one last seen. A missing or unreadable file counts as `None`.
    ///
    /// The new time is recorded even when `reopen` fails, so an unchanged
    /// broken file is not retried on every call. Returns whether `reopen` ran.
    pub(crate) fn refresh<F>(&self, reopen: F) -> bool
    where
        F: FnOnce(&Path, Option<SystemTime>) -> Result<()>,
    {
        let mut state = self.state.lock();
        let mut current = storage::modified(&state.path).ok();
        if current.is_none()
            && let Some((base, ext)) = &self.companion
        {
            let found = storage::companion(base, ext);
            if found != state.path
                && let Ok(modified) = storage::modified(&found)
            {
                log::debug!("Companion file is now {}", found.display());
                state.path = found;
                current = Some(modified);
            }
        }
        if state.seen == current {
            return false;
        }
        state.seen = current;

        match reopen(&state.path, current) {
            Ok(()) => self.failed.store(false, Ordering::Release),
            Err(e) => {
                log::warn!("{} is unavailable at the moment: {}", state.path.display(), e);
                self.failed.store(true, Ordering::Release);
            }
        }
        true
    }
}
