//! Shutdown hooks for instantiated components.

use std::sync::Arc;

use parking_lot::Mutex;

/// Trait for components that need structured teardown.
///
/// # Examples
///
/// ```
/// use ferrous_resolver::{Dispose, LifecycleManager};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// struct Connection {
///     open: AtomicBool,
/// }
///
/// impl Dispose for Connection {
///     fn dispose(&self) {
///         self.open.store(false, Ordering::SeqCst);
///     }
/// }
///
/// let lifecycle = LifecycleManager::new();
/// let conn = Arc::new(Connection { open: AtomicBool::new(true) });
/// lifecycle.register_disposer(conn.clone());
/// lifecycle.close();
/// assert!(!conn.open.load(Ordering::SeqCst));
/// ```
pub trait Dispose: Send + Sync + 'static {
    fn dispose(&self);
}

/// Collects shutdown hooks and runs them in reverse registration order.
///
/// A handle is passed to every constructor through
/// [`Dependencies::lifecycle`](crate::Dependencies::lifecycle), so
/// components can register their own cleanup.
#[derive(Default)]
pub struct LifecycleManager {
    hooks: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a hook to run on [`close`](Self::close).
    pub fn on_close(&self, hook: impl FnOnce() + Send + 'static) {
        self.hooks.lock().push(Box::new(hook));
    }

    /// Registers a component's [`Dispose`] implementation.
    pub fn register_disposer<T: Dispose>(&self, component: Arc<T>) {
        self.on_close(move || component.dispose());
    }

    /// Runs all hooks, most recently registered first. Hooks registered
    /// while closing run as well.
    pub fn close(&self) {
        loop {
            // Release the lock before running the hook; it may register more.
            let next = self.hooks.lock().pop();
            match next {
                Some(hook) => hook(),
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.hooks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.lock().is_empty()
    }
}

impl std::fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("hooks", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hooks_run_lifo_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let lifecycle = LifecycleManager::new();
        for i in 0..3 {
            let log = log.clone();
            lifecycle.on_close(move || log.lock().push(i));
        }
        assert_eq!(lifecycle.len(), 3);

        lifecycle.close();
        lifecycle.close();
        assert_eq!(*log.lock(), vec![2, 1, 0]);
        assert!(lifecycle.is_empty());
    }
}
