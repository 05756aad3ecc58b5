//! Lease-based lifetime tracking.
//!
//! Every device and resource owns a [`ReferenceTracker`]. Operations take a
//! [`Lease`] for their duration; disposal drops the creation reference, and
//! whichever release brings the count to zero runs the owner's teardown.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use tracing::trace;

use crate::error::{GpuError, Result};

type Teardown = Box<dyn FnOnce() + Send>;

pub struct ReferenceTracker {
    object: &'static str,
    /// Outstanding leases plus one for the creation reference until disposal.
    count: AtomicUsize,
    disposed: AtomicBool,
    teardown: Mutex<Option<Teardown>>,
}

impl ReferenceTracker {
    /// Start tracking an object. The count begins at one (the creation
    /// reference); `teardown` runs exactly once, after [`dispose`] and the
    /// last lease release.
    ///
    /// [`dispose`]: ReferenceTracker::dispose
    pub fn new(object: &'static str, teardown: impl FnOnce() + Send + 'static) -> Self {
        Self {
            object,
            count: AtomicUsize::new(1),
            disposed: AtomicBool::new(false),
            teardown: Mutex::new(Some(Box::new(teardown))),
        }
    }

    /// Acquire a lease, or fail with [`GpuError::ObjectDisposed`] once
    /// disposal has been requested.
    pub fn lease(&self) -> Result<Lease<'_>> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(self.disposed_error());
        }
        let mut current = self.count.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return Err(self.disposed_error());
            }
            match self.count.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(Lease { tracker: self }),
                Err(actual) => current = actual,
            }
        }
    }

    /// Request teardown. Idempotent: only the first call drops the creation
    /// reference.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        trace!(object = self.object, "dispose requested");
        self.release();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Number of leases currently held, excluding the creation reference.
    pub fn lease_count(&self) -> usize {
        let count = self.count.load(Ordering::Acquire);
        if self.is_disposed() {
            count
        } else {
            count.saturating_sub(1)
        }
    }

    /// Whether teardown has already run.
    pub fn is_torn_down(&self) -> bool {
        self.count.load(Ordering::Acquire) == 0
    }

    fn release(&self) {
        let previous = self.count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "{} released more often than leased", self.object);
        if previous == 1 {
            let teardown = self
                .teardown
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .take();
            if let Some(teardown) = teardown {
                trace!(object = self.object, "tearing down");
                teardown();
            }
        }
    }

    fn disposed_error(&self) -> GpuError {
        GpuError::ObjectDisposed {
            object: self.object,
        }
    }
}

impl fmt::Debug for ReferenceTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceTracker")
            .field("object", &self.object)
            .field("leases", &self.lease_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Proof that a tracked object stays alive while this guard exists.
#[must_use = "a lease is released as soon as it is dropped"]
pub struct Lease<'a> {
    tracker: &'a ReferenceTracker,
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        self.tracker.release();
    }
}

impl fmt::Debug for Lease<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Lease").field(&self.tracker.object).finish()
    }
}
