//! Per-call buffer scope.
//!
//! Every intermediate array created during one filter call is registered
//! with a [`CallScope`] and wrapped in a [`ScopedBuffer`]. Each buffer
//! carries a release token, so dropping the buffer (normal return, early
//! `?` exit or unwinding) releases it exactly once. The final result is
//! detached with [`ScopedBuffer::into_inner`] before it is handed to the
//! caller.
//!
//! A [`BufferLedger`] aggregates the accounting for a filter instance so
//! callers can check that nothing outlives a call.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use ndarray::{Array, Dimension};

/// Shared allocation counters for one filter instance.
#[derive(Debug, Default)]
pub struct BufferLedger {
    live_buffers: AtomicUsize,
    live_bytes: AtomicUsize,
    peak_bytes: AtomicUsize,
    total_allocations: AtomicU64,
}

/// Point-in-time copy of a [`BufferLedger`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferStats {
    pub live_buffers: usize,
    pub live_bytes: usize,
    pub peak_bytes: usize,
    pub total_allocations: u64,
}

impl BufferLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn stats(&self) -> BufferStats {
        BufferStats {
            live_buffers: self.live_buffers.load(Ordering::Acquire),
            live_bytes: self.live_bytes.load(Ordering::Acquire),
            peak_bytes: self.peak_bytes.load(Ordering::Acquire),
            total_allocations: self.total_allocations.load(Ordering::Acquire),
        }
    }

    fn acquire(&self, bytes: usize) {
        self.live_buffers.fetch_add(1, Ordering::AcqRel);
        let live = self.live_bytes.fetch_add(bytes, Ordering::AcqRel) + bytes;
        self.peak_bytes.fetch_max(live, Ordering::AcqRel);
        self.total_allocations.fetch_add(1, Ordering::Relaxed);
    }

    fn release(&self, bytes: usize) {
        self.live_buffers.fetch_sub(1, Ordering::AcqRel);
        self.live_bytes.fetch_sub(bytes, Ordering::AcqRel);
    }
}

#[derive(Debug, Default)]
struct ScopeCounters {
    tracked: AtomicUsize,
    outstanding: AtomicUsize,
}

/// Release token for one registered buffer.
#[derive(Debug)]
struct ReleaseToken {
    ledger: Arc<BufferLedger>,
    counters: Arc<ScopeCounters>,
    bytes: usize,
}

impl Drop for ReleaseToken {
    fn drop(&mut self) {
        self.ledger.release(self.bytes);
        self.counters.outstanding.fetch_sub(1, Ordering::AcqRel);
    }
}

/// An array registered with a [`CallScope`].
#[derive(Debug)]
pub struct ScopedBuffer<D: Dimension> {
    array: Array<f32, D>,
    _token: ReleaseToken,
}

impl<D: Dimension> ScopedBuffer<D> {
    pub fn array_mut(&mut self) -> &mut Array<f32, D> {
        &mut self.array
    }

    /// Release the buffer from the scope and take ownership of the data.
    pub fn into_inner(self) -> Array<f32, D> {
        let ScopedBuffer { array, _token } = self;
        drop(_token);
        array
    }
}

impl<D: Dimension> std::ops::Deref for ScopedBuffer<D> {
    type Target = Array<f32, D>;

    fn deref(&self) -> &Self::Target {
        &self.array
    }
}

/// Tracks every intermediate buffer of one top-level call.
#[derive(Debug)]
pub struct CallScope {
    label: &'static str,
    ledger: Arc<BufferLedger>,
    counters: Arc<ScopeCounters>,
}

impl CallScope {
    pub fn open(label: &'static str, ledger: &Arc<BufferLedger>) -> Self {
        Self {
            label,
            ledger: Arc::clone(ledger),
            counters: Arc::new(ScopeCounters::default()),
        }
    }

    /// Register `array` with this scope.
    pub fn track<D: Dimension>(&self, array: Array<f32, D>) -> ScopedBuffer<D> {
        let bytes = array.len() * std::mem::size_of::<f32>();
        self.ledger.acquire(bytes);
        self.counters.tracked.fetch_add(1, Ordering::Relaxed);
        self.counters.outstanding.fetch_add(1, Ordering::AcqRel);
        ScopedBuffer {
            array,
            _token: ReleaseToken {
                ledger: Arc::clone(&self.ledger),
                counters: Arc::clone(&self.counters),
                bytes,
            },
        }
    }

    pub fn tracked(&self) -> usize {
        self.counters.tracked.load(Ordering::Relaxed)
    }

    pub fn outstanding(&self) -> usize {
        self.counters.outstanding.load(Ordering::Acquire)
    }
}

impl Drop for CallScope {
    fn drop(&mut self) {
        let outstanding = self.outstanding();
        if outstanding > 0 {
            warn!(
                "{}: {} of {} buffers outlived their call scope",
                self.label,
                outstanding,
                self.tracked()
            );
        } else {
            debug!("{}: released {} intermediate buffers", self.label, self.tracked());
        }
    }
}
