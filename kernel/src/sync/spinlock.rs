use core::cell::UnsafeCell;
use core::fmt;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use super::IrqScope;

const NO_CPU: usize = usize::MAX;

// ============================================================================
// RawSpinLock
// ============================================================================

/// Raw spinlock recording the CPU that holds it
///
/// A lock may be acquired by one thread of execution and released by another
/// running on the same CPU; ownership follows the CPU, not the caller.
pub struct RawSpinLock {
    locked: AtomicBool,
    cpu_id: AtomicUsize,
    // Lock analytics (very lightweight)
    acquire_count: AtomicU64,
    contended_count: AtomicU64,
}

impl RawSpinLock {
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
            cpu_id: AtomicUsize::new(NO_CPU),
            acquire_count: AtomicU64::new(0),
            contended_count: AtomicU64::new(0),
        }
    }

    pub fn acquire(&self, scope: &dyn IrqScope, name: &str) {
        // Disable interrupts to prevent deadlock with the timer path
        scope.push_off();
        if self.holding(scope) {
            panic!("acquire {}", name);
        }

        let mut contended = false;
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            contended = true;
            core::hint::spin_loop();
        }
        self.acquire_count.fetch_add(1, Ordering::Relaxed);
        if contended {
            self.contended_count.fetch_add(1, Ordering::Relaxed);
        }

        self.cpu_id.store(scope.cpu_id(), Ordering::Relaxed);
    }

    pub fn release(&self, scope: &dyn IrqScope, name: &str) {
        if !self.holding(scope) {
            panic!("release {}", name);
        }
        self.cpu_id.store(NO_CPU, Ordering::Relaxed);
        self.locked.store(false, Ordering::Release);
        scope.pop_off();
    }

    /// Check if the lock is currently held
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// Check if the calling CPU holds the lock; call with interrupts off
    pub fn holding(&self, scope: &dyn IrqScope) -> bool {
        self.is_locked() && self.cpu_id.load(Ordering::Relaxed) == scope.cpu_id()
    }

    /// Get total lock acquisitions (for diagnostics)
    pub fn acquire_count(&self) -> u64 {
        self.acquire_count.load(Ordering::Relaxed)
    }

    /// Get total contended acquisitions (for diagnostics)
    pub fn contended_count(&self) -> u64 {
        self.contended_count.load(Ordering::Relaxed)
    }
}

impl Default for RawSpinLock {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SpinLock<T>
// ============================================================================

/// Spinlock protecting a value; interrupts stay off on the holding CPU
pub struct SpinLock<T: ?Sized> {
    name: &'static str,
    raw: RawSpinLock,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Sync for SpinLock<T> {}
unsafe impl<T: ?Sized + Send> Send for SpinLock<T> {}

impl<T> SpinLock<T> {
    pub const fn new(name: &'static str, data: T) -> Self {
        Self {
            name,
            raw: RawSpinLock::new(),
            data: UnsafeCell::new(data),
        }
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> SpinLock<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn lock<'a>(&'a self, scope: &'a dyn IrqScope) -> SpinLockGuard<'a, T> {
        self.raw.acquire(scope, self.name);
        SpinLockGuard { lock: self, scope }
    }

    /// Release the lock held through `guard` and hand back the lock itself,
    /// so the caller can re-acquire it later
    pub fn unlock(guard: SpinLockGuard<'_, T>) -> &'_ SpinLock<T> {
        let lock = guard.lock;
        drop(guard);
        lock
    }

    /// Release a lock whose guard lives on another stack
    ///
    /// # Safety
    ///
    /// The calling CPU must hold the lock, and the guard that acquired it must
    /// never be dropped.
    pub unsafe fn force_unlock(&self, scope: &dyn IrqScope) {
        self.raw.release(scope, self.name);
    }

    pub fn holding(&self, scope: &dyn IrqScope) -> bool {
        self.raw.holding(scope)
    }

    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }

    pub fn raw(&self) -> &RawSpinLock {
        &self.raw
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }
}

impl<T: ?Sized> fmt::Debug for SpinLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpinLock")
            .field("name", &self.name)
            .field("locked", &self.is_locked())
            .finish()
    }
}

/// RAII guard for SpinLock
pub struct SpinLockGuard<'a, T: ?Sized> {
    lock: &'a SpinLock<T>,
    scope: &'a dyn IrqScope,
}

impl<'a, T: ?Sized> SpinLockGuard<'a, T> {
    pub fn spinlock(&self) -> &'a SpinLock<T> {
        self.lock
    }

    pub fn scope(&self) -> &'a dyn IrqScope {
        self.scope
    }
}

impl<T: ?Sized> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for SpinLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.raw.release(self.scope, self.lock.name);
    }
}
