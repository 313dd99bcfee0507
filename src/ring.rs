//! Single-producer / single-consumer ring buffer.
//!
//! The only coordination between a venue's WebSocket reader (producer) and
//! its parser thread (consumer). Fixed power-of-two capacity; `head` and
//! `tail` indices wrap via bitmasking. One slot is sacrificed to tell a full
//! ring from an empty one, so a ring of capacity `N` holds `N - 1` items.
//!
//! The producer publishes with a release store of `head`; the consumer reads
//! it with acquire and publishes its own progress with a release store of
//! `tail`. No other synchronization exists between the two threads.
//!
//! Single-producer/single-consumer is enforced by ownership: [`split`] hands
//! out one non-cloneable [`Producer`] and one non-cloneable [`Consumer`].
//!
//! # Example
//!
//! ```rust
//! let (mut tx, mut rx) = crossbook::ring::spsc::<String>(8);
//! tx.try_push("frame".to_string()).unwrap();
//! assert_eq!(rx.try_pop().as_deref(), Some("frame"));
//! assert!(rx.try_pop().is_none());
//! ```

// The slot storage below is the one place in the crate that needs raw
// cell access; everything else stays under the crate-wide deny.
#![allow(unsafe_code)]

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Shared<T> {
    buf: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: usize,
    /// Next slot the producer writes. Written by the producer only.
    head: AtomicUsize,
    /// Next slot the consumer reads. Written by the consumer only.
    tail: AtomicUsize,
}

// Safety: slots are only touched by the endpoint that owns the index
// guarding them; the release/acquire pair on head (resp. tail) orders the
// slot write (resp. read) before the index becomes visible.
unsafe impl<T: Send> Send for Shared<T> {}
unsafe impl<T: Send> Sync for Shared<T> {}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        // Exclusive access here: both endpoints are gone.
        let mut tail = *self.tail.get_mut();
        let head = *self.head.get_mut();
        while tail != head {
            unsafe { (*self.buf[tail].get()).assume_init_drop() };
            tail = (tail + 1) & self.mask;
        }
    }
}

/// Producer endpoint of an SPSC ring. Move it to the producing thread.
pub struct Producer<T> {
    shared: Arc<Shared<T>>,
}

/// Consumer endpoint of an SPSC ring. Move it to the consuming thread.
pub struct Consumer<T> {
    shared: Arc<Shared<T>>,
}

/// Create a ring of the given power-of-two capacity and split it into its
/// two endpoints.
///
/// # Panics
///
/// Panics if `capacity` is not a power of two or is smaller than 2.
pub fn spsc<T>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    assert!(
        capacity.is_power_of_two() && capacity >= 2,
        "ring capacity must be a power of two >= 2, got {}",
        capacity
    );
    let buf: Box<[UnsafeCell<MaybeUninit<T>>]> = (0..capacity)
        .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
        .collect();
    let shared = Arc::new(Shared {
        buf,
        mask: capacity - 1,
        head: AtomicUsize::new(0),
        tail: AtomicUsize::new(0),
    });
    (
        Producer {
            shared: Arc::clone(&shared),
        },
        Consumer { shared },
    )
}

impl<T> Producer<T> {
    /// Attempt to push; returns the value back on a full ring so the caller
    /// can decide its backpressure policy. Never blocks.
    pub fn try_push(&mut self, value: T) -> Result<(), T> {
        let shared = &*self.shared;
        let head = shared.head.load(Ordering::Relaxed);
        let next = (head + 1) & shared.mask;
        if next == shared.tail.load(Ordering::Acquire) {
            return Err(value);
        }
        unsafe { (*shared.buf[head].get()).write(value) };
        shared.head.store(next, Ordering::Release);
        Ok(())
    }

    /// True when the next `try_push` would fail.
    pub fn is_full(&self) -> bool {
        let shared = &*self.shared;
        let next = (shared.head.load(Ordering::Relaxed) + 1) & shared.mask;
        next == shared.tail.load(Ordering::Acquire)
    }

    /// Usable capacity (one slot below the allocated power of two).
    pub fn capacity(&self) -> usize {
        self.shared.buf.len() - 1
    }
}

impl<T> Consumer<T> {
    /// Attempt to pop the oldest item; `None` on an empty ring. Never blocks.
    pub fn try_pop(&mut self) -> Option<T> {
        let shared = &*self.shared;
        let tail = shared.tail.load(Ordering::Relaxed);
        if tail == shared.head.load(Ordering::Acquire) {
            return None;
        }
        let value = unsafe { (*shared.buf[tail].get()).assume_init_read() };
        shared.tail.store((tail + 1) & shared.mask, Ordering::Release);
        Some(value)
    }

    /// True when the next `try_pop` would return `None`.
    pub fn is_empty(&self) -> bool {
        let shared = &*self.shared;
        shared.tail.load(Ordering::Relaxed) == shared.head.load(Ordering::Acquire)
    }

    /// Number of items currently buffered.
    pub fn len(&self) -> usize {
        let shared = &*self.shared;
        let head = shared.head.load(Ordering::Acquire);
        let tail = shared.tail.load(Ordering::Relaxed);
        head.wrapping_sub(tail) & shared.mask
    }
}

impl<T> std::fmt::Debug for Producer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer")
            .field("capacity", &self.capacity())
            .field("full", &self.is_full())
            .finish()
    }
}

impl<T> std::fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer").field("len", &self.len()).finish()
    }
}
