//! Bounded blocking circular queue shared between producer and consumer
//! threads.
//!
//! [`BlockingQueue`] is a fixed-capacity MPMC handoff primitive: producers
//! block while the queue is full, consumers block while it is empty, and
//! every blocking wait honors the process-wide [`ShutdownSignal`] plus an
//! optional per-call [`CancelToken`].
//!
//! # Blocking protocol
//!
//! A blocked caller parks on a condition variable with a ~1 ms timed
//! wait, re-checking its predicate and both cancellation sources on every
//! wake-up. The lock is released for the duration of each
//! suspension and re-acquired before the predicate is evaluated, so an
//! operation that passes its check completes atomically and cannot be
//! aborted mid-flight. Every state-changing operation signals the condition
//! variable; the timed wait makes a missed or stolen wakeup cost at most
//! one poll interval, which is also the bound on cancellation latency.
//!
//! Cancellation is checked only while blocked: a push into a queue with
//! free space succeeds even if shutdown is already in progress.
//!
//! # Ordering
//!
//! Elements move through the buffer in FIFO order. With multiple waiting
//! producers (or multiple waiting consumers) no fairness is guaranteed -
//! any unblocked waiter may win the race to re-acquire the lock.

use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crossbeam_utils::CachePadded;
use thiserror::Error;

use crate::cancel::{CancelToken, ShutdownSignal};
use crate::trace::{debug, trace};

/// Capacity used when the `N` parameter is left at its default.
///
/// Inherited from the host system this queue was built for, where 666
/// slots was the standard handoff depth.
pub const DEFAULT_CAPACITY: usize = 666;

/// Granularity of cancellation polling while blocked.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// A blocking wait ended by a cancellation signal instead of completing.
///
/// The queue is left unchanged by the cancelled attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Cancelled {
    /// The process-wide [`ShutdownSignal`] was raised.
    #[error("wait aborted: shutdown signal raised")]
    Shutdown,
    /// The caller-supplied [`CancelToken`] was cancelled.
    #[error("wait aborted: cancellation token triggered")]
    Token,
}

/// The queue had no free slot for a non-blocking push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("queue is full")]
pub struct Full;

/// Index state and element storage, guarded by the queue's mutex.
struct State<T, const N: usize> {
    /// Index of the oldest occupied slot, always in `[0, N)`.
    head: usize,
    /// Number of occupied slots, always in `[0, N]`.
    count: usize,
    /// Slot `(head + i) % N` holds a live element for `i` in `[0, count)`.
    /// Slots outside that range are stale and are never read.
    storage: [MaybeUninit<T>; N],
}

/// Fixed-capacity blocking queue for producer/consumer handoff.
///
/// The buffer is stored inline: a `BlockingQueue<T, N>` is roughly
/// `N * size_of::<T>()` bytes. Share it between threads behind an `Arc`,
/// or place it in a `static` - construction is `const`.
///
/// `T` must be [`Copy`]: elements are handed over by value, `clear` can
/// forget contents in O(1) without drop bookkeeping, and a cancelled
/// `push` loses nothing because the caller still owns its copy.
///
/// # Example
///
/// ```
/// use handoff::{BlockingQueue, ShutdownSignal};
///
/// let queue: BlockingQueue<u32, 4> = BlockingQueue::new();
/// let shutdown = ShutdownSignal::new();
///
/// queue.push(7, &shutdown, None).unwrap();
/// assert_eq!(queue.peek(&shutdown, None), Ok(7));
/// assert_eq!(queue.pop(&shutdown, None), Ok(7));
/// ```
pub struct BlockingQueue<T, const N: usize = DEFAULT_CAPACITY> {
    state: Mutex<State<T, N>>,
    /// Signaled on every state-changing push/pop/clear.
    changed: Condvar,
    /// Mirror of `count`, maintained under the lock, read relaxed by
    /// [`approx_len`](Self::approx_len). Padded so diagnostic polling does
    /// not contend with the mutex's cache line.
    len_mirror: CachePadded<AtomicUsize>,
}

impl<T: Copy, const N: usize> BlockingQueue<T, N> {
    /// Compile-time assertion that queue capacity is non-zero.
    const CAPACITY_OK: () = assert!(N > 0, "queue capacity must be greater than 0");

    /// Creates an empty queue.
    ///
    /// # Panics
    ///
    /// Fails to compile if `N == 0`.
    #[must_use]
    pub const fn new() -> Self {
        let () = Self::CAPACITY_OK;

        Self {
            state: Mutex::new(State {
                head: 0,
                count: 0,
                // SAFETY: an array of MaybeUninit doesn't require
                // initialization; slots are written before they enter the
                // live range.
                storage: unsafe { MaybeUninit::<[MaybeUninit<T>; N]>::uninit().assume_init() },
            }),
            changed: Condvar::new(),
            len_mirror: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    /// Returns the fixed capacity `N`.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Wraps a slot index into `[0, N)`.
    ///
    /// Callers never produce an index beyond `2N - 2`, so a single
    /// subtraction replaces the modulo.
    #[inline]
    const fn wrap(index: usize) -> usize {
        if index >= N { index - N } else { index }
    }

    /// Acquires the state lock, recovering from poisoning.
    ///
    /// No mutation in this crate can panic between index updates, so a
    /// poisoned guard still holds consistent state.
    fn lock_state(&self) -> MutexGuard<'_, State<T, N>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until `blocked` returns false or a cancellation signal is
    /// observed. The common wait loop behind `push`, `pop`, and `peek_at`.
    ///
    /// The guard is released while suspended; the predicate is only ever
    /// evaluated under the lock.
    fn wait_while<'a, F>(
        &'a self,
        mut state: MutexGuard<'a, State<T, N>>,
        shutdown: &ShutdownSignal,
        cancel: Option<&CancelToken>,
        blocked: F,
    ) -> Result<MutexGuard<'a, State<T, N>>, Cancelled>
    where
        F: Fn(&State<T, N>) -> bool,
    {
        while blocked(&state) {
            cancellation(shutdown, cancel)?;
            let (guard, _timed_out) = self
                .changed
                .wait_timeout(state, POLL_INTERVAL)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
        Ok(state)
    }

    /// Enqueues `item`, blocking while the queue is full.
    ///
    /// Cancellation is checked only while blocked: if a slot is free the
    /// push succeeds even mid-shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] if a signal ended the wait before a slot
    /// became free. The queue is unchanged and the caller still owns its
    /// copy of `item`.
    pub fn push(
        &self,
        item: T,
        shutdown: &ShutdownSignal,
        cancel: Option<&CancelToken>,
    ) -> Result<(), Cancelled> {
        let mut state = self
            .wait_while(self.lock_state(), shutdown, cancel, |s| s.count == N)
            .map_err(|reason| {
                trace!(?reason, "push abandoned while waiting for space");
                reason
            })?;

        let slot = Self::wrap(state.head + state.count);
        state.storage[slot] = MaybeUninit::new(item);
        state.count += 1;
        self.len_mirror.store(state.count, Ordering::Relaxed);
        drop(state);
        self.changed.notify_all();
        Ok(())
    }

    /// Dequeues the oldest element, blocking while the queue is empty.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] if a signal ended the wait before data became
    /// available. The queue is unchanged.
    pub fn pop(
        &self,
        shutdown: &ShutdownSignal,
        cancel: Option<&CancelToken>,
    ) -> Result<T, Cancelled> {
        let mut state = self
            .wait_while(self.lock_state(), shutdown, cancel, |s| s.count == 0)
            .map_err(|reason| {
                trace!(?reason, "pop abandoned while waiting for data");
                reason
            })?;

        // SAFETY: count > 0, so `head` is inside the live range and the
        // slot was initialized by a prior push.
        let item = unsafe { state.storage[state.head].assume_init_read() };
        state.head = Self::wrap(state.head + 1);
        state.count -= 1;
        self.len_mirror.store(state.count, Ordering::Relaxed);
        drop(state);
        self.changed.notify_all();
        Ok(item)
    }

    /// Copies out the oldest element without removing it, blocking while
    /// the queue is empty.
    ///
    /// Equivalent to [`peek_at`](Self::peek_at) with offset 0.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] if a signal ended the wait.
    pub fn peek(
        &self,
        shutdown: &ShutdownSignal,
        cancel: Option<&CancelToken>,
    ) -> Result<T, Cancelled> {
        self.peek_at(0, shutdown, cancel)
    }

    /// Copies out the element `offset` positions behind the head without
    /// removing it, blocking until the queue holds more than `offset`
    /// elements.
    ///
    /// The copy is taken under the lock, so the returned value is a
    /// consistent snapshot even with concurrent pops and clears. An
    /// `offset >= N` can never be satisfied and blocks until cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] if a signal ended the wait.
    pub fn peek_at(
        &self,
        offset: usize,
        shutdown: &ShutdownSignal,
        cancel: Option<&CancelToken>,
    ) -> Result<T, Cancelled> {
        let state = self
            .wait_while(self.lock_state(), shutdown, cancel, |s| s.count <= offset)
            .map_err(|reason| {
                trace!(?reason, offset, "peek abandoned while waiting for data");
                reason
            })?;

        // SAFETY: count > offset, so the slot is inside the live range and
        // was initialized by a prior push.
        Ok(unsafe { state.storage[Self::wrap(state.head + offset)].assume_init_read() })
    }

    /// Enqueues `item` if a slot is free, without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`Full`] if the queue is at capacity.
    pub fn try_push(&self, item: T) -> Result<(), Full> {
        let mut state = self.lock_state();
        if state.count == N {
            return Err(Full);
        }
        let slot = Self::wrap(state.head + state.count);
        state.storage[slot] = MaybeUninit::new(item);
        state.count += 1;
        self.len_mirror.store(state.count, Ordering::Relaxed);
        drop(state);
        self.changed.notify_all();
        Ok(())
    }

    /// Dequeues the oldest element if one is present, without blocking.
    #[must_use]
    pub fn try_pop(&self) -> Option<T> {
        let mut state = self.lock_state();
        if state.count == 0 {
            return None;
        }
        // SAFETY: count > 0, so `head` is inside the live range and the
        // slot was initialized by a prior push.
        let item = unsafe { state.storage[state.head].assume_init_read() };
        state.head = Self::wrap(state.head + 1);
        state.count -= 1;
        self.len_mirror.store(state.count, Ordering::Relaxed);
        drop(state);
        self.changed.notify_all();
        Some(item)
    }

    /// Returns the number of queued elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_state().count
    }

    /// Returns `true` if the queue holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock_state().count == 0
    }

    /// Returns `true` if the queue is at capacity.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.lock_state().count == N
    }

    /// Approximate element count from a relaxed atomic read, without
    /// taking the lock.
    ///
    /// The value may be stale by the time the caller looks at it. Intended
    /// for diagnostics and load reporting only - never base a correctness
    /// decision on it; use [`len`](Self::len) instead.
    #[must_use]
    pub fn approx_len(&self) -> usize {
        self.len_mirror.load(Ordering::Relaxed)
    }

    /// Discards all queued elements.
    ///
    /// O(1): `head` is left where it was and the storage is not erased,
    /// the elements are simply no longer reachable. Wakes producers
    /// blocked on a full queue.
    pub fn clear(&self) {
        let mut state = self.lock_state();
        debug!(dropped = state.count, "queue cleared");
        state.count = 0;
        self.len_mirror.store(0, Ordering::Relaxed);
        drop(state);
        self.changed.notify_all();
    }
}

impl<T: Copy, const N: usize> Default for BlockingQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Polls both cancellation sources, shutdown first.
fn cancellation(shutdown: &ShutdownSignal, cancel: Option<&CancelToken>) -> Result<(), Cancelled> {
    if shutdown.is_raised() {
        return Err(Cancelled::Shutdown);
    }
    if cancel.is_some_and(CancelToken::is_cancelled) {
        return Err(Cancelled::Token);
    }
    Ok(())
}
