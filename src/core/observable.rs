//! Observable value holders.
//!
//! An [`Observable`] keeps one value and tells observers when it changes,
//! either through synchronous callbacks ([`Observable::subscribe`]) or through
//! a `tokio::sync::watch` receiver ([`Observable::watch`]) for async code.
//!
//! Emissions are staged under a short lock and delivered by a single drainer
//! with no lock held, so callbacks see values in `set` order and may freely
//! call back into the observable, set it, or drop their own [`Subscription`].
//! A value set from inside a callback is delivered after the current round.
//! Once [`Observable::close`] or [`Subscription::unsubscribe`] returns, no
//! callback invocation starts for the affected observers.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

struct Entry<T> {
    active: AtomicBool,
    callback: Box<dyn Fn(&T) + Send + Sync>,
}

struct Emitter<T> {
    next_id: u64,
    entries: Vec<(u64, Arc<Entry<T>>)>,
    queue: VecDeque<T>,
    draining: bool,
}

struct Shared<T> {
    tx: watch::Sender<T>,
    emitter: Mutex<Emitter<T>>,
    closed: AtomicBool,
}

/// Resets the drainer when a callback panics, dropping undelivered values.
struct DrainGuard<'a, T> {
    shared: &'a Shared<T>,
}

impl<T> Drop for DrainGuard<'_, T> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let mut emitter = self.shared.emitter.lock();
            emitter.draining = false;
            emitter.queue.clear();
        }
    }
}

/// Shared, writable value holder. Cloning yields a handle to the same value.
pub struct Observable<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("value", &*self.shared.tx.borrow())
            .field("closed", &self.shared.closed.load(Ordering::Acquire))
            .finish()
    }
}

impl<T: Clone + Send + Sync + 'static> Observable<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self {
            shared: Arc::new(Shared {
                tx,
                emitter: Mutex::new(Emitter {
                    next_id: 0,
                    entries: Vec::new(),
                    queue: VecDeque::new(),
                    draining: false,
                }),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn get(&self) -> T {
        self.shared.tx.borrow().clone()
    }

    /// Stores `value` and notifies every observer. Returns false once closed.
    pub fn set(&self, value: T) -> bool {
        if !self.stage(value) {
            return false;
        }
        self.flush();
        true
    }

    /// Stores `value` and queues it for the callbacks without running them.
    /// The value is visible to `get` and `watch` immediately; callbacks run
    /// on the next [`Observable::flush`]. Staging order is delivery order.
    pub(crate) fn stage(&self, value: T) -> bool {
        let mut emitter = self.shared.emitter.lock();
        if self.shared.closed.load(Ordering::Acquire) {
            return false;
        }
        self.shared.tx.send_replace(value.clone());
        if !emitter.entries.is_empty() {
            emitter.queue.push_back(value);
        }
        true
    }

    /// Delivers every staged value. Returns at once if another caller is
    /// already delivering; that caller picks up the queued values.
    pub(crate) fn flush(&self) {
        {
            let mut emitter = self.shared.emitter.lock();
            if emitter.draining {
                return;
            }
            emitter.draining = true;
        }
        let _guard = DrainGuard {
            shared: &self.shared,
        };

        loop {
            let (value, entries) = {
                let mut emitter = self.shared.emitter.lock();
                match emitter.queue.pop_front() {
                    Some(value) => {
                        let entries: Vec<Arc<Entry<T>>> =
                            emitter.entries.iter().map(|(_, e)| Arc::clone(e)).collect();
                        (value, entries)
                    }
                    None => {
                        emitter.draining = false;
                        return;
                    }
                }
            };
            for entry in entries {
                if self.shared.closed.load(Ordering::Acquire) {
                    break;
                }
                if entry.active.load(Ordering::Acquire) {
                    (entry.callback)(&value);
                }
            }
        }
    }

    /// Registers `callback`; it is invoked on every later emission until the
    /// returned guard is dropped.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let mut emitter = self.shared.emitter.lock();
        if self.shared.closed.load(Ordering::Acquire) {
            return Subscription::inert();
        }
        let id = emitter.next_id;
        emitter.next_id += 1;
        emitter.entries.push((
            id,
            Arc::new(Entry {
                active: AtomicBool::new(true),
                callback: Box::new(callback),
            }),
        ));

        let weak = Arc::downgrade(&self.shared);
        Subscription {
            unsubscribe: Some(Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    let mut emitter = shared.emitter.lock();
                    emitter.entries.retain(|(eid, entry)| {
                        if *eid == id {
                            entry.active.store(false, Ordering::Release);
                        }
                        *eid != id
                    });
                }
            })),
        }
    }

    /// Async view of the value. The receiver starts out having seen the
    /// current value.
    pub fn watch(&self) -> watch::Receiver<T> {
        self.shared.tx.subscribe()
    }

    pub fn view(&self) -> ObservableView<T> {
        ObservableView {
            inner: self.clone(),
        }
    }

    /// Freezes the value and drops every callback. Idempotent.
    pub fn close(&self) {
        let mut emitter = self.shared.emitter.lock();
        self.shared.closed.store(true, Ordering::Release);
        for (_, entry) in emitter.entries.drain(..) {
            entry.active.store(false, Ordering::Release);
        }
        emitter.queue.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.shared.emitter.lock().entries.len()
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Observable<T> {
    /// Like [`Observable::set`], but skips the emission when the value is
    /// unchanged. Returns whether an emission happened.
    pub fn set_if_changed(&self, value: T) -> bool {
        let changed = self.stage_if_changed(value);
        if changed {
            self.flush();
        }
        changed
    }

    /// [`Observable::stage`] for values that differ from the current one.
    pub(crate) fn stage_if_changed(&self, value: T) -> bool {
        let mut emitter = self.shared.emitter.lock();
        if self.shared.closed.load(Ordering::Acquire) {
            return false;
        }
        let changed = self.shared.tx.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value.clone();
                true
            }
        });
        if changed && !emitter.entries.is_empty() {
            emitter.queue.push_back(value);
        }
        changed
    }
}

/// Read-only handle handed to the presentation layer.
pub struct ObservableView<T> {
    inner: Observable<T>,
}

impl<T> Clone for ObservableView<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ObservableView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

impl<T: Clone + Send + Sync + 'static> ObservableView<T> {
    pub fn get(&self) -> T {
        self.inner.get()
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.inner.subscribe(callback)
    }

    pub fn watch(&self) -> watch::Receiver<T> {
        self.inner.watch()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

/// RAII guard for a callback registered with [`Observable::subscribe`].
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    fn inert() -> Self {
        Self { unsubscribe: None }
    }

    pub fn unsubscribe(mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}
