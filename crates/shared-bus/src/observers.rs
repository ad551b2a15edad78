//! # Observer Lists
//!
//! Explicit, ordered callback lists for synchronous lifecycle hooks.
//!
//! Every callback runs in isolation: an error or panic in one observer is
//! logged and counted, and the remaining observers still run. Nothing a hook
//! does can propagate into the caller that fired it.

use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Error returned by an observer callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ObserverError(pub String);

impl From<&str> for ObserverError {
    fn from(msg: &str) -> Self {
        Self(msg.to_string())
    }
}

impl From<String> for ObserverError {
    fn from(msg: String) -> Self {
        Self(msg)
    }
}

type Callback<T: ?Sized> = Arc<dyn Fn(&T) -> Result<(), ObserverError> + Send + Sync>;

/// Outcome of one notification round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifyReport {
    /// Observers that returned `Ok`.
    pub delivered: usize,
    /// Observers that returned an error or panicked.
    pub failed: usize,
}

/// Ordered list of named observers for events of type `T`.
pub struct ObserverList<T: ?Sized> {
    hook: &'static str,
    entries: RwLock<Vec<(String, Callback<T>)>>,
}

impl<T: ?Sized> ObserverList<T> {
    /// Create an empty list. `hook` names the list in log output.
    #[must_use]
    pub fn new(hook: &'static str) -> Self {
        Self {
            hook,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Append an observer. Observers run in registration order.
    pub fn add<F>(&self, name: impl Into<String>, callback: F)
    where
        F: Fn(&T) -> Result<(), ObserverError> + Send + Sync + 'static,
    {
        self.entries.write().push((name.into(), Arc::new(callback)));
    }

    /// Remove every observer registered under `name`. Returns how many went.
    pub fn remove(&self, name: &str) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(n, _)| n != name);
        before - entries.len()
    }

    /// Number of registered observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no observers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Run every observer against `event`.
    pub fn notify(&self, event: &T) -> NotifyReport {
        // Callbacks run outside the lock so they may register observers.
        let snapshot: Vec<(String, Callback<T>)> = self.entries.read().clone();
        let mut report = NotifyReport::default();

        for (name, callback) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    warn!(hook = self.hook, observer = %name, error = %e, "Observer failed");
                }
                Err(payload) => {
                    report.failed += 1;
                    warn!(
                        hook = self.hook,
                        observer = %name,
                        panic = %panic_message(payload.as_ref()),
                        "Observer panicked"
                    );
                }
            }
        }

        report
    }
}

impl<T: ?Sized> fmt::Debug for ObserverList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.entries.read().iter().map(|(n, _)| n.clone()).collect();
        f.debug_struct("ObserverList")
            .field("hook", &self.hook)
            .field("observers", &names)
            .finish()
    }
}

/// Best-effort text of a caught panic payload.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_notify_in_order() {
        let list: ObserverList<u32> = ObserverList::new("test");
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let seen = seen.clone();
            list.add(tag, move |v: &u32| {
                seen.lock().push(format!("{tag}{v}"));
                Ok(())
            });
        }

        let report = list.notify(&1);
        assert_eq!(report, NotifyReport { delivered: 3, failed: 0 });
        assert_eq!(*seen.lock(), vec!["a1", "b1", "c1"]);
    }

    #[test]
    fn test_error_and_panic_contained() {
        let list: ObserverList<str> = ObserverList::new("test");
        let reached = Arc::new(AtomicUsize::new(0));

        list.add("errors", |_: &str| Err("nope".into()));
        list.add("panics", |_: &str| panic!("observer blew up"));
        let r = reached.clone();
        list.add("counts", move |_: &str| {
            r.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let report = list.notify("event");
        assert_eq!(report.failed, 2);
        assert_eq!(report.delivered, 1);
        assert_eq!(reached.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove() {
        let list: ObserverList<u8> = ObserverList::new("test");
        list.add("x", |_: &u8| Ok(()));
        list.add("y", |_: &u8| Ok(()));
        list.add("x", |_: &u8| Ok(()));

        assert_eq!(list.remove("x"), 2);
        assert_eq!(list.len(), 1);
        assert!(!list.is_empty());
    }

    #[test]
    fn test_panic_message() {
        let payload = catch_unwind(|| panic!("boom {}", 1)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom 1");
    }
}
