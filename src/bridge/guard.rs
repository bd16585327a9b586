use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::{Backoff, CachePadded};
use cqlbridge_abi::NativeHandle;
use cqlbridge_abi::symbols::ReleaseFn;
use tracing::{debug, trace, warn};

use super::library::{NativeApi, NativeLibrary};
use super::result::NativeCallResult;
use crate::error::{BridgeError, Result};

/// Set once the guard has been disposed; the remaining bits count in-flight calls.
const DISPOSED: usize = 1 << (usize::BITS - 1);
const IN_FLIGHT: usize = !DISPOSED;

/// A kind of engine-owned object and the entry point that frees it.
pub trait NativeResource {
    /// Human-readable name used in errors and logs.
    const NAME: &'static str;
    const RELEASE_ENTRY_POINT: &'static str;

    fn release_fn(api: &NativeApi) -> ReleaseFn;
}

/// Owns one native handle.
///
/// Every operation runs inside [`ResourceGuard::call`], which registers it as
/// in flight. Disposal flips a flag so no new call can start; the handle is
/// freed by whichever comes last, the disposal or the final in-flight call.
/// The release entry point therefore runs exactly once, and never while a
/// call is still using the handle.
pub struct ResourceGuard<R: NativeResource> {
    state: CachePadded<AtomicUsize>,
    handle: NativeHandle,
    library: Arc<NativeLibrary>,
    _resource: PhantomData<fn() -> R>,
}

impl<R: NativeResource> ResourceGuard<R> {
    /// Takes ownership of `handle`.
    ///
    /// # Safety
    ///
    /// `handle` must be a live `R` produced by `library`'s engine and must not
    /// be released by anyone else.
    pub unsafe fn new(library: Arc<NativeLibrary>, handle: NativeHandle) -> Result<Self> {
        if handle.is_null() {
            return Err(BridgeError::NullHandle { resource: R::NAME });
        }
        trace!(resource = R::NAME, ?handle, "guarding native handle");
        Ok(Self {
            state: CachePadded::new(AtomicUsize::new(0)),
            handle,
            library,
            _resource: PhantomData,
        })
    }

    /// Runs `op` against the live handle.
    ///
    /// Returns [`BridgeError::ResourceDisposed`] without running `op` once the
    /// guard is disposed. `op` must not keep the handle past its return.
    pub fn call<T>(
        &self,
        op: impl FnOnce(&NativeLibrary, NativeHandle) -> Result<T>,
    ) -> Result<T> {
        let _in_flight = self.enter()?;
        trace!(resource = R::NAME, "guarded call");
        op(&self.library, self.handle)
    }

    /// Stops new calls and frees the handle once the in-flight ones finish.
    ///
    /// Returns `false` when the guard was already disposed.
    pub fn dispose(&self) -> bool {
        let previous = self.state.fetch_or(DISPOSED, Ordering::AcqRel);
        if previous & DISPOSED != 0 {
            trace!(resource = R::NAME, "dispose after dispose ignored");
            return false;
        }

        let in_flight = previous & IN_FLIGHT;
        if in_flight == 0 {
            self.release();
        } else {
            debug!(
                resource = R::NAME,
                in_flight, "release deferred until in-flight calls finish"
            );
        }
        true
    }

    pub fn is_disposed(&self) -> bool {
        self.state.load(Ordering::Acquire) & DISPOSED != 0
    }

    /// Calls currently running against the handle.
    pub fn in_flight(&self) -> usize {
        self.state.load(Ordering::Acquire) & IN_FLIGHT
    }

    pub fn library(&self) -> &Arc<NativeLibrary> {
        &self.library
    }

    fn enter(&self) -> Result<InFlight<'_, R>> {
        let backoff = Backoff::new();
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if current & DISPOSED != 0 {
                return Err(BridgeError::ResourceDisposed { resource: R::NAME });
            }
            debug_assert!(current < IN_FLIGHT, "in-flight counter overflow");

            match self.state.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(InFlight { guard: self }),
                Err(actual) => {
                    current = actual;
                    backoff.spin();
                }
            }
        }
    }

    fn exit(&self) {
        let previous = self.state.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous & IN_FLIGHT != 0, "in-flight counter underflow");

        // Last call out after disposal frees.
        if previous == DISPOSED | 1 {
            self.release();
        }
    }

    fn release(&self) {
        let release = R::release_fn(self.library.api());
        let raw = unsafe { release(self.handle) };
        match self.library.decode(R::RELEASE_ENTRY_POINT, raw) {
            Ok(NativeCallResult::Success) => {
                debug!(resource = R::NAME, handle = ?self.handle, "released native handle");
            }
            Ok(NativeCallResult::Failure { code, message }) => {
                warn!(
                    resource = R::NAME,
                    %code,
                    message = message.as_deref().unwrap_or(""),
                    "native release failed"
                );
            }
            Err(err) => {
                warn!(resource = R::NAME, error = %err, "native release returned garbage");
            }
        }
    }
}

impl<R: NativeResource> Drop for ResourceGuard<R> {
    fn drop(&mut self) {
        // `&mut self` rules out in-flight calls, so this releases immediately.
        self.dispose();
    }
}

impl<R: NativeResource> fmt::Debug for ResourceGuard<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceGuard")
            .field("resource", &R::NAME)
            .field("handle", &self.handle)
            .field("disposed", &self.is_disposed())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// Registration of one call; dropping it ends the call, even on unwind.
struct InFlight<'a, R: NativeResource> {
    guard: &'a ResourceGuard<R>,
}

impl<R: NativeResource> Drop for InFlight<'_, R> {
    fn drop(&mut self) {
        self.guard.exit();
    }
}
