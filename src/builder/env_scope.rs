//! Environment scope stack.
//!
//! Nested builds are configured through environment variables. A scope
//! overrides a set of variables for the duration of one nested invocation and
//! then restores each one exactly, including variables that were unset.
//!
//! The process environment is shared by every thread, so the stack lives
//! behind a process-wide mutex. [`EnvScopeStack::lock`] returns a guard that
//! is the only way to push or pop frames; holding it for the whole
//! "push → resolve → pop" sequence serializes concurrent invocations.
//! Dropping the guard pops any frame it left behind, so a scope never
//! outlives the code that pushed it, even on early return or panic.

use std::ffi::{OsStr, OsString};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Frames pushed by all guards.
static STACK: Mutex<Vec<Frame>> = Mutex::new(Vec::new());

/// An ordered set of variable overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverlay {
    vars: Vec<(OsString, OsString)>,
}

impl EnvOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable, replacing an earlier entry with the same name.
    pub fn set(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        let key = key.as_ref().to_os_string();
        let value = value.as_ref().to_os_string();
        match self.vars.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.vars.push((key, value)),
        }
        self
    }

    pub fn get(&self, key: impl AsRef<OsStr>) -> Option<&OsStr> {
        self.vars
            .iter()
            .find(|(k, _)| k.as_os_str() == key.as_ref())
            .map(|(_, v)| v.as_os_str())
    }

    /// Variables in assignment order.
    pub fn iter(&self) -> impl Iterator<Item = (&OsStr, &OsStr)> {
        self.vars.iter().map(|(k, v)| (k.as_os_str(), v.as_os_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Prior state of the variables touched by one push.
#[derive(Debug)]
struct Frame {
    saved: Vec<(OsString, Option<OsString>)>,
}

/// Entry point to the process-wide environment scope stack.
pub struct EnvScopeStack;

impl EnvScopeStack {
    /// Acquire exclusive access to the stack, blocking until it is free.
    pub fn lock() -> EnvScopeGuard<'static> {
        let frames = STACK.lock().unwrap_or_else(PoisonError::into_inner);
        let base_depth = frames.len();
        EnvScopeGuard { frames, base_depth }
    }
}

/// Exclusive handle on the environment scope stack.
pub struct EnvScopeGuard<'a> {
    frames: MutexGuard<'a, Vec<Frame>>,
    base_depth: usize,
}

impl EnvScopeGuard<'_> {
    /// Record the current value of every overridden variable, then apply the
    /// overrides.
    pub fn push(&mut self, overlay: &EnvOverlay) {
        let mut saved = Vec::with_capacity(overlay.len());
        for (key, value) in overlay.iter() {
            saved.push((key.to_os_string(), std::env::var_os(key)));
            std::env::set_var(key, value);
        }
        tracing::trace!("pushed environment scope with {} variable(s)", saved.len());
        self.frames.push(Frame { saved });
        #[cfg(test)]
        journal::record(journal::Event::Push, overlay);
    }

    /// Restore the variables of the most recent frame pushed through this
    /// guard. Returns `false` if this guard has no frame left to pop.
    pub fn pop(&mut self) -> bool {
        if self.frames.len() <= self.base_depth {
            return false;
        }
        let Some(frame) = self.frames.pop() else {
            return false;
        };
        #[cfg(test)]
        journal::record_keys(journal::Event::Pop, frame.saved.iter().map(|(k, _)| k));
        for (key, prior) in frame.saved.into_iter().rev() {
            match prior {
                Some(value) => std::env::set_var(&key, value),
                None => std::env::remove_var(&key),
            }
        }
        tracing::trace!("popped environment scope");
        true
    }

    /// Run `f` with `overlay` applied, popping the frame afterwards whatever
    /// `f` returns.
    pub fn with_scope<R>(&mut self, overlay: &EnvOverlay, f: impl FnOnce(&mut Self) -> R) -> R {
        self.push(overlay);
        let depth = self.frames.len();
        let result = f(self);
        while self.frames.len() >= depth && self.pop() {}
        result
    }

    /// Frames currently pushed through this guard.
    pub fn depth(&self) -> usize {
        self.frames.len() - self.base_depth
    }
}

impl Drop for EnvScopeGuard<'_> {
    fn drop(&mut self) {
        while self.pop() {}
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn test_round_trip_restores_set_and_unset() {
        let mut guard = EnvScopeStack::lock();
        std::env::set_var("BERTH_TEST_SCOPE_SET", "before");
        std::env::remove_var("BERTH_TEST_SCOPE_UNSET");

        let overlay = EnvOverlay::new()
            .set("BERTH_TEST_SCOPE_SET", "during")
            .set("BERTH_TEST_SCOPE_UNSET", "during");

        guard.push(&overlay);
        assert_eq!(std::env::var("BERTH_TEST_SCOPE_SET").unwrap(), "during");
        assert_eq!(std::env::var("BERTH_TEST_SCOPE_UNSET").unwrap(), "during");
        assert!(guard.pop());

        assert_eq!(std::env::var("BERTH_TEST_SCOPE_SET").unwrap(), "before");
        assert!(std::env::var_os("BERTH_TEST_SCOPE_UNSET").is_none());
        std::env::remove_var("BERTH_TEST_SCOPE_SET");
    }

    #[test]
    fn test_nested_frames_restore_in_order() {
        let mut guard = EnvScopeStack::lock();
        std::env::set_var("BERTH_TEST_SCOPE_NESTED", "0");

        guard.push(&EnvOverlay::new().set("BERTH_TEST_SCOPE_NESTED", "1"));
        guard.push(&EnvOverlay::new().set("BERTH_TEST_SCOPE_NESTED", "2"));
        assert_eq!(guard.depth(), 2);
        assert_eq!(std::env::var("BERTH_TEST_SCOPE_NESTED").unwrap(), "2");

        assert!(guard.pop());
        assert_eq!(std::env::var("BERTH_TEST_SCOPE_NESTED").unwrap(), "1");
        assert!(guard.pop());
        assert_eq!(std::env::var("BERTH_TEST_SCOPE_NESTED").unwrap(), "0");
        assert!(!guard.pop());
        std::env::remove_var("BERTH_TEST_SCOPE_NESTED");
    }

    #[test]
    fn test_same_variable_twice_in_one_frame() {
        let mut guard = EnvScopeStack::lock();
        std::env::remove_var("BERTH_TEST_SCOPE_TWICE");

        let overlay = EnvOverlay::new()
            .set("BERTH_TEST_SCOPE_TWICE", "a")
            .set("BERTH_TEST_SCOPE_TWICE", "b");
        assert_eq!(overlay.len(), 1);

        guard.with_scope(&overlay, |_| {
            assert_eq!(std::env::var("BERTH_TEST_SCOPE_TWICE").unwrap(), "b");
        });
        assert!(std::env::var_os("BERTH_TEST_SCOPE_TWICE").is_none());
    }

    #[test]
    fn test_with_scope_pops_on_error() {
        let mut guard = EnvScopeStack::lock();
        std::env::remove_var("BERTH_TEST_SCOPE_ERR");

        let overlay = EnvOverlay::new().set("BERTH_TEST_SCOPE_ERR", "x");
        let result: Result<(), &str> = guard.with_scope(&overlay, |_| Err("nested failed"));

        assert!(result.is_err());
        assert_eq!(guard.depth(), 0);
        assert!(std::env::var_os("BERTH_TEST_SCOPE_ERR").is_none());
    }

    #[test]
    fn test_with_scope_pops_frames_left_by_closure() {
        let mut guard = EnvScopeStack::lock();
        std::env::remove_var("BERTH_TEST_SCOPE_LEAK");

        guard.with_scope(&EnvOverlay::new().set("BERTH_TEST_SCOPE_LEAK", "outer"), |g| {
            g.push(&EnvOverlay::new().set("BERTH_TEST_SCOPE_LEAK", "inner"));
        });

        assert_eq!(guard.depth(), 0);
        assert!(std::env::var_os("BERTH_TEST_SCOPE_LEAK").is_none());
    }

    #[test]
    fn test_drop_restores_unpopped_frames() {
        std::env::remove_var("BERTH_TEST_SCOPE_DROP");
        {
            let mut guard = EnvScopeStack::lock();
            guard.push(&EnvOverlay::new().set("BERTH_TEST_SCOPE_DROP", "leaked"));
        }
        let _guard = EnvScopeStack::lock();
        assert!(std::env::var_os("BERTH_TEST_SCOPE_DROP").is_none());
    }

    #[test]
    fn test_restored_after_panic() {
        std::env::remove_var("BERTH_TEST_SCOPE_PANIC");
        let result = thread::spawn(|| {
            let mut guard = EnvScopeStack::lock();
            guard.push(&EnvOverlay::new().set("BERTH_TEST_SCOPE_PANIC", "x"));
            panic!("nested invocation panicked");
        })
        .join();
        assert!(result.is_err());

        let _guard = EnvScopeStack::lock();
        assert!(std::env::var_os("BERTH_TEST_SCOPE_PANIC").is_none());
    }

    #[test]
    fn test_concurrent_scopes_are_serialized() {
        let threads = 4;
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let mut guard = EnvScopeStack::lock();
                    let value = format!("thread-{}", i);
                    let overlay = EnvOverlay::new().set("BERTH_TEST_SCOPE_RACE", &value);
                    guard.with_scope(&overlay, |_| {
                        thread::yield_now();
                        std::env::var("BERTH_TEST_SCOPE_RACE").unwrap() == value
                    })
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }

        let entries = journal::entries_touching("BERTH_TEST_SCOPE_RACE");
        assert_eq!(entries.len(), threads * 2);
        for pair in entries.chunks(2) {
            assert_eq!(pair[0].event, journal::Event::Push);
            assert_eq!(pair[1].event, journal::Event::Pop);
            assert_eq!(pair[0].thread, pair[1].thread);
        }
    }
}
