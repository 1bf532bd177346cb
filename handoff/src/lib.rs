//! # handoff
//!
//! A fixed-capacity blocking queue for handing values between cooperating
//! threads.
//!
//! [`BlockingQueue`] is the single primitive this crate provides: a
//! circular buffer of compile-time capacity `N` guarded by one lock, with
//! blocking `push`/`pop`/`peek` operations that suspend the caller until
//! space or data is available. Every blocking wait is cooperatively
//! cancellable through two independent signals:
//!
//! - [`ShutdownSignal`] - a process-wide flag the host raises when it is
//!   terminating; every blocking call polls it, with no opt-out.
//! - [`CancelToken`] - an optional per-call flag for ending one specific
//!   wait early.
//!
//! Waits never hold the lock across a suspension, and cancellation is
//! observed within about a millisecond of the flag being set.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//!
//! use handoff::{BlockingQueue, ShutdownSignal};
//!
//! let queue = Arc::new(BlockingQueue::<u64, 8>::new());
//! let shutdown = ShutdownSignal::new();
//!
//! let producer = thread::spawn({
//!     let queue = Arc::clone(&queue);
//!     let shutdown = shutdown.clone();
//!     move || {
//!         for i in 0..32 {
//!             queue.push(i, &shutdown, None).expect("wait cancelled");
//!         }
//!     }
//! });
//!
//! for i in 0..32 {
//!     assert_eq!(queue.pop(&shutdown, None), Ok(i));
//! }
//! producer.join().unwrap();
//! ```

pub mod cancel;
pub mod queue;

mod trace;

#[doc(inline)]
pub use cancel::{CancelToken, ShutdownSignal};
#[doc(inline)]
pub use queue::{BlockingQueue, Cancelled, DEFAULT_CAPACITY, Full};

pub use trace::init_tracing;
