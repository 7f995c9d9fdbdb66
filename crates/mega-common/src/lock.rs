//! Mutex that can trace its acquisitions.
//!
//! In [`LockMode::Logging`] every lock and unlock is logged together with the
//! file and line of the caller, which is enough to spot the holder of a lock
//! that never comes back. [`LockMode::Plain`] skips all of that and is what
//! production nodes run with.

use parking_lot::{Mutex, MutexGuard};
use std::ops::{Deref, DerefMut};
use std::panic::Location;
use tracing::info;

/// Selects how a [`DebugMutex`] behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockMode {
    /// Plain mutex, no logging.
    #[default]
    Plain,
    /// Log every acquisition and release with the caller location.
    Logging,
}

/// A named mutex whose tracing can be switched on by configuration.
#[derive(Debug)]
pub struct DebugMutex<T> {
    name: String,
    mode: LockMode,
    inner: Mutex<T>,
}

impl<T> DebugMutex<T> {
    /// Creates a new mutex.
    pub fn new(name: impl Into<String>, value: T, mode: LockMode) -> Self {
        Self {
            name: name.into(),
            mode,
            inner: Mutex::new(value),
        }
    }

    /// Name used in lock traces.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The lock flavour.
    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// Acquires the mutex, blocking the current thread until it is available.
    #[track_caller]
    pub fn lock(&self) -> DebugMutexGuard<'_, T> {
        match self.mode {
            LockMode::Plain => DebugMutexGuard {
                guard: self.inner.lock(),
                trace: None,
            },
            LockMode::Logging => {
                let caller = Location::caller();
                info!(lock = %self.name, "locking: {}:{}", caller.file(), caller.line());
                let guard = self.inner.lock();
                info!(lock = %self.name, "locked: {}:{}", caller.file(), caller.line());
                DebugMutexGuard {
                    guard,
                    trace: Some(ReleaseTrace {
                        name: self.name.as_str(),
                        caller,
                    }),
                }
            }
        }
    }
}

/// RAII guard returned by [`DebugMutex::lock`].
///
/// Fields drop in order: `guard` releases the mutex before `trace` logs it.
pub struct DebugMutexGuard<'a, T> {
    guard: MutexGuard<'a, T>,
    trace: Option<ReleaseTrace<'a>>,
}

struct ReleaseTrace<'a> {
    name: &'a str,
    caller: &'static Location<'static>,
}

impl Drop for ReleaseTrace<'_> {
    fn drop(&mut self) {
        info!(lock = %self.name, "unlocked: {}:{}", self.caller.file(), self.caller.line());
    }
}

impl<T> Deref for DebugMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for DebugMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for DebugMutexGuard<'_, T> {
    fn drop(&mut self) {
        if let Some(trace) = &self.trace {
            info!(lock = %trace.name, "unlocking: {}:{}", trace.caller.file(), trace.caller.line());
        }
    }
}
