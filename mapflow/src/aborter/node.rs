//! The aborter tree node.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::warn;

use super::timer::AbortTimer;
use crate::errors::CancellationError;

/// A callback invoked once when an aborter fires.
pub type AbortCallback = Box<dyn FnOnce() + Send>;

/// Handle returned by [`Aborter::add_event_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub(crate) struct AborterNode {
    aborted: AtomicBool,
    parent: Option<Weak<AborterNode>>,
    children: Mutex<Vec<Arc<AborterNode>>>,
    timer: Mutex<Option<AbortTimer>>,
    timeout_ms: u64,
    binding: Option<(String, String)>,
    listeners: Mutex<Vec<(ListenerId, AbortCallback)>>,
    onabort: Mutex<Option<AbortCallback>>,
    next_listener_id: AtomicU64,
    notify: Notify,
}

impl AborterNode {
    fn new(
        parent: Option<Weak<Self>>,
        timeout_ms: u64,
        binding: Option<(String, String)>,
    ) -> Arc<Self> {
        Arc::new(Self {
            aborted: AtomicBool::new(false),
            parent,
            children: Mutex::new(Vec::new()),
            timer: Mutex::new(None),
            timeout_ms,
            binding,
            listeners: Mutex::new(Vec::new()),
            onabort: Mutex::new(None),
            next_listener_id: AtomicU64::new(0),
            notify: Notify::new(),
        })
    }

    pub(crate) const fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    fn start_timer(self: &Arc<Self>) {
        if self.timeout_ms == 0 {
            return;
        }
        let mut slot = self.timer.lock();
        if !self.is_aborted() {
            *slot = Some(AbortTimer::schedule(
                Arc::downgrade(self),
                Duration::from_millis(self.timeout_ms),
            ));
        }
    }

    /// Aborts this node and every descendant.
    ///
    /// Walks the subtree with an explicit stack so depth is not bounded by
    /// the call stack.
    pub(crate) fn abort(&self) {
        let mut pending = match self.abort_self() {
            Some(children) => children,
            None => return,
        };
        while let Some(node) = pending.pop() {
            if let Some(children) = node.abort_self() {
                pending.extend(children);
            }
        }
        self.detach_from_parent();
    }

    /// Drops the parent's owning reference to this node once it fired on its
    /// own. A parent that is itself aborted keeps its list untouched.
    fn detach_from_parent(&self) {
        let Some(parent) = self.parent.as_ref().and_then(Weak::upgrade) else {
            return;
        };
        if parent.is_aborted() {
            return;
        }
        parent
            .children
            .lock()
            .retain(|child| !std::ptr::eq(Arc::as_ptr(child), self));
    }

    /// Fires this node only; returns its children, or `None` if it was
    /// already aborted.
    fn abort_self(&self) -> Option<Vec<Arc<Self>>> {
        if self
            .aborted
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return None;
        }

        let timer = self.timer.lock().take();
        if let Some(timer) = timer {
            timer.cancel();
        }

        let listeners = std::mem::take(&mut *self.listeners.lock());
        for (_, callback) in listeners {
            invoke(callback);
        }
        // The slot lock is released first; the callback may touch the slot.
        let onabort = self.onabort.lock().take();
        if let Some(callback) = onabort {
            invoke(callback);
        }
        self.notify.notify_waiters();

        Some(self.children.lock().clone())
    }
}

fn invoke(callback: AbortCallback) {
    if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(callback)) {
        warn!("Abort listener panicked: {:?}", e);
    }
}

/// A node in a tree of cancellation scopes.
///
/// Calling [`abort`](Self::abort) fires the node's listeners and then aborts
/// every descendant; ancestors and siblings are never affected. Aborting is
/// idempotent and irreversible.
///
/// Children are owned by their parent and hold only a weak back-reference,
/// so a subtree stays reachable (for cascading aborts and for
/// [`get_value`](Self::get_value) lookups) only while its root is alive.
///
/// Cloning an `Aborter` yields another handle to the same node.
#[derive(Clone)]
pub struct Aborter {
    inner: Arc<AborterNode>,
}

impl Aborter {
    /// Creates a root aborter that never fires on its own.
    #[must_use]
    pub fn none() -> Self {
        Self {
            inner: AborterNode::new(None, 0, None),
        }
    }

    /// Creates a root aborter that fires after `timeout_ms` milliseconds.
    ///
    /// A timeout of 0 means no timer. The timer runs on the current tokio
    /// runtime, or on a dedicated thread outside one; either is released as
    /// soon as the node aborts.
    #[must_use]
    pub fn timeout(timeout_ms: u64) -> Self {
        let inner = AborterNode::new(None, timeout_ms, None);
        inner.start_timer();
        Self { inner }
    }

    /// Derives a child that fires after `timeout_ms` milliseconds, or when
    /// this node fires, whichever comes first.
    ///
    /// The timer only applies to the child; this node's own timer is left
    /// untouched.
    #[must_use]
    pub fn with_timeout(&self, timeout_ms: u64) -> Self {
        self.derive(timeout_ms, None)
    }

    /// Derives a child carrying an immutable key/value binding.
    #[must_use]
    pub fn with_value(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.derive(0, Some((key.into(), value.into())))
    }

    fn derive(&self, timeout_ms: u64, binding: Option<(String, String)>) -> Self {
        let child = AborterNode::new(Some(Arc::downgrade(&self.inner)), timeout_ms, binding);

        // The flag is read under the children lock: `abort` sets the flag
        // before taking its snapshot, so a child is either in the snapshot
        // or sees the flag here.
        let parent_aborted = {
            let mut children = self.inner.children.lock();
            children.push(Arc::clone(&child));
            self.inner.is_aborted()
        };

        if parent_aborted {
            child.abort();
        } else {
            child.start_timer();
        }

        Self { inner: child }
    }

    /// Resolves `key` against this node and then its ancestors, nearest first.
    #[must_use]
    pub fn get_value(&self, key: &str) -> Option<String> {
        let mut node = Some(Arc::clone(&self.inner));
        while let Some(current) = node {
            if let Some((k, v)) = &current.binding {
                if k == key {
                    return Some(v.clone());
                }
            }
            node = current.parent.as_ref().and_then(Weak::upgrade);
        }
        None
    }

    /// Aborts this node and all of its descendants.
    pub fn abort(&self) {
        self.inner.abort();
    }

    /// Returns whether this node has been aborted.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.inner.is_aborted()
    }

    /// Resolves once this node has been aborted.
    pub async fn aborted(&self) {
        let notified = self.inner.notify.notified();
        if self.is_aborted() {
            return;
        }
        notified.await;
    }

    /// Returns a cancellation error if this node has been aborted.
    pub fn check(&self, context: &str) -> Result<(), CancellationError> {
        if self.is_aborted() {
            Err(CancellationError::new(context))
        } else {
            Ok(())
        }
    }

    /// Registers a callback to run when this node is aborted.
    ///
    /// If the node is already aborted the callback runs immediately, on the
    /// calling thread, and is not retained. Either way it runs exactly once.
    pub fn add_event_listener<F>(&self, callback: F) -> ListenerId
    where
        F: FnOnce() + Send + 'static,
    {
        let id = ListenerId(self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed));
        let mut listeners = self.inner.listeners.lock();
        if self.is_aborted() {
            drop(listeners);
            invoke(Box::new(callback));
        } else {
            listeners.push((id, Box::new(callback)));
        }
        id
    }

    /// Unregisters a listener. Returns false if it already fired or was never
    /// registered on this node.
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Fills the single `onabort` slot, replacing any previous callback.
    ///
    /// Same late-registration rule as [`add_event_listener`](Self::add_event_listener).
    pub fn set_onabort<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut slot = self.inner.onabort.lock();
        if self.is_aborted() {
            drop(slot);
            invoke(Box::new(callback));
        } else {
            *slot = Some(Box::new(callback));
        }
    }

    /// Empties the `onabort` slot.
    pub fn clear_onabort(&self) {
        self.inner.onabort.lock().take();
    }

    /// Returns the parent node, if it is still alive.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.inner
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| Self { inner })
    }

    /// Returns the number of children still attached to this node.
    ///
    /// A child that is aborted on its own (by `abort()` or its timer) detaches
    /// from a live parent; children aborted by the parent's cascade stay.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.inner.children.lock().len()
    }

    /// Returns the timer delay this node was created with (0 = none).
    #[must_use]
    pub fn timeout_ms(&self) -> u64 {
        self.inner.timeout_ms()
    }

    /// Returns the key bound on this node itself, if any.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.inner.binding.as_ref().map(|(k, _)| k.as_str())
    }

    /// Returns true if both handles refer to the same node.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Aborter {
    fn default() -> Self {
        Self::none()
    }
}

impl std::fmt::Debug for Aborter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aborter")
            .field("aborted", &self.is_aborted())
            .field("timeout_ms", &self.timeout_ms())
            .field("key", &self.key())
            .field("children", &self.child_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let clone = count.clone();
        (count, move || {
            clone.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_none_not_aborted() {
        let aborter = Aborter::none();
        assert!(!aborter.is_aborted());
        assert_eq!(aborter.timeout_ms(), 0);
        assert!(aborter.parent().is_none());
    }

    #[test]
    fn test_abort_idempotent() {
        let aborter = Aborter::none();
        let (count, callback) = counter();
        aborter.add_event_listener(callback);

        aborter.abort();
        aborter.abort();

        assert!(aborter.is_aborted());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_abort_cascades_to_all_descendants_once() {
        let root = Aborter::none();
        let a = root.with_timeout(0);
        let b = root.with_value("k", "v");
        let a1 = a.with_timeout(0);
        let a1x = a1.with_value("x", "y");

        let counts: Vec<_> = [&a, &b, &a1, &a1x]
            .iter()
            .map(|node| {
                let (count, callback) = counter();
                node.add_event_listener(callback);
                count
            })
            .collect();

        root.abort();
        root.abort();
        a1.abort();

        for node in [&a, &b, &a1, &a1x] {
            assert!(node.is_aborted());
        }
        for count in &counts {
            assert_eq!(count.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn test_abort_does_not_propagate_upward() {
        let root = Aborter::none();
        let left = root.with_timeout(0);
        let right = root.with_timeout(0);

        left.abort();

        assert!(left.is_aborted());
        assert!(!root.is_aborted());
        assert!(!right.is_aborted());
    }

    #[test]
    fn test_deep_tree_abort() {
        let root = Aborter::none();
        let mut leaf = root.clone();
        for _ in 0..1_000 {
            leaf = leaf.with_timeout(0);
        }

        root.abort();
        assert!(leaf.is_aborted());
    }

    #[test]
    fn test_get_value_nearest_binding_wins() {
        let root = Aborter::none();
        let outer = root.with_value("region", "eu");
        let inner = outer.with_value("region", "us");
        let leaf = inner.with_timeout(0);

        assert_eq!(leaf.get_value("region"), Some("us".to_string()));
        assert_eq!(outer.get_value("region"), Some("eu".to_string()));
        assert_eq!(root.get_value("region"), None);
        assert_eq!(leaf.get_value("missing"), None);
    }

    #[test]
    fn test_listener_after_abort_fires_immediately() {
        let aborter = Aborter::none();
        aborter.abort();

        let (count, callback) = counter();
        aborter.add_event_listener(callback);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        aborter.abort();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_event_listener() {
        let aborter = Aborter::none();
        let (count, callback) = counter();
        let id = aborter.add_event_listener(callback);

        assert!(aborter.remove_event_listener(id));
        assert!(!aborter.remove_event_listener(id));

        aborter.abort();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_onabort_slot_replaced() {
        let aborter = Aborter::none();
        let (first, first_cb) = counter();
        let (second, second_cb) = counter();
        aborter.set_onabort(first_cb);
        aborter.set_onabort(second_cb);

        aborter.abort();

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_onabort_may_reenter_its_node() {
        let aborter = Aborter::none();
        let (count, callback) = counter();
        let inner = aborter.clone();
        aborter.set_onabort(move || {
            inner.clear_onabort();
            inner.set_onabort(|| {});
            let _listener = inner.add_event_listener(|| {});
            callback();
        });

        let (done_tx, done_rx) = std::sync::mpsc::channel();
        let trigger = aborter.clone();
        std::thread::spawn(move || {
            trigger.abort();
            let _ = done_tx.send(());
        });

        done_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("abort should return");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_may_reenter_its_node() {
        let aborter = Aborter::none();
        let inner = aborter.clone();
        let (count, callback) = counter();
        aborter.add_event_listener(move || {
            inner.set_onabort(callback);
        });

        aborter.abort();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_panic_suppressed() {
        let aborter = Aborter::none();
        aborter.add_event_listener(|| panic!("Intentional panic"));
        let (count, callback) = counter();
        aborter.add_event_listener(callback);

        aborter.abort();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_derive_from_aborted_parent() {
        let root = Aborter::none();
        root.abort();

        let child = root.with_timeout(10_000);
        assert!(child.is_aborted());
        assert_eq!(root.child_count(), 1);
    }

    #[test]
    fn test_individually_aborted_child_detaches() {
        let root = Aborter::none().with_value("k", "v");
        let first = root.with_timeout(0);
        let second = root.with_timeout(0);
        assert_eq!(root.child_count(), 2);

        first.abort();
        assert_eq!(root.child_count(), 1);
        assert_eq!(first.get_value("k").as_deref(), Some("v"));

        root.abort();
        assert!(second.is_aborted());
        assert_eq!(root.child_count(), 1);
    }

    #[test]
    fn test_check() {
        let aborter = Aborter::none();
        assert!(aborter.check("before send").is_ok());
        aborter.abort();
        let err = aborter.check("before send").unwrap_err();
        assert_eq!(err.reason, "before send");
    }

    #[tokio::test]
    async fn test_timeout_fires() {
        let aborter = Aborter::timeout(20);
        tokio::time::timeout(Duration::from_secs(2), aborter.aborted())
            .await
            .expect("aborter should fire");
        assert!(aborter.is_aborted());
    }

    #[tokio::test]
    async fn test_timeout_zero_never_fires() {
        let aborter = Aborter::timeout(0);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!aborter.is_aborted());
    }

    #[tokio::test]
    async fn test_child_timer_independent_of_parent() {
        let parent = Aborter::timeout(10_000);
        let child = parent.with_timeout(20);

        child.aborted().await;
        assert!(child.is_aborted());
        assert!(!parent.is_aborted());
    }

    #[tokio::test]
    async fn test_parent_timer_aborts_child() {
        let parent = Aborter::timeout(20);
        let child = parent.with_timeout(10_000);

        tokio::time::timeout(Duration::from_secs(2), child.aborted())
            .await
            .expect("child should fire with parent");
    }

    #[test]
    fn test_timeout_without_runtime() {
        let aborter = Aborter::timeout(10);
        std::thread::sleep(Duration::from_millis(100));
        assert!(aborter.is_aborted());
    }

    #[test]
    fn test_abort_releases_timer_thread() {
        let aborter = Aborter::timeout(60_000);
        // The sleeping timer thread holds the only weak reference.
        assert_eq!(Arc::weak_count(&aborter.inner), 1);

        aborter.abort();

        let started = std::time::Instant::now();
        while Arc::weak_count(&aborter.inner) > 0 {
            assert!(started.elapsed() < Duration::from_secs(2), "timer thread still running");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_concurrent_derive_and_abort() {
        let root = Aborter::none();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let root = root.clone();
                std::thread::spawn(move || {
                    (0..200).map(|_| root.with_timeout(0)).collect::<Vec<_>>()
                })
            })
            .collect();

        root.abort();

        for handle in handles {
            for child in handle.join().unwrap() {
                assert!(child.is_aborted());
            }
        }
        assert_eq!(root.child_count(), 1600);
    }
}
