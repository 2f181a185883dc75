//! Capabilities the scheduling core consumes from the rest of the kernel
//!
//! The core never touches page tables, file objects, or registers directly.
//! It sequences calls to these traits around its own state transitions, so a
//! bare-metal port and a hosted simulation differ only in the implementor.

use alloc::sync::Arc;

use crate::types::Context;

/// Kernel stacks and user address spaces
pub trait Memory {
    /// Opaque handle to a user address space
    type AddressSpace;
    /// Opaque handle to a kernel stack
    type KernelStack;

    /// Allocate a kernel stack, `None` when memory is exhausted
    fn alloc_kstack(&self) -> Option<Self::KernelStack>;

    /// Return a kernel stack to the allocator
    fn free_kstack(&self, stack: Self::KernelStack);

    /// Initial stack pointer for a fresh stack
    fn kstack_top(&self, stack: &Self::KernelStack) -> usize;

    /// Build the address space of the first process; returns it with its size
    fn create_address_space(&self) -> Option<(Self::AddressSpace, usize)>;

    /// Copy `parent` (of `size` bytes) for a forked child
    fn duplicate_address_space(
        &self,
        parent: &Self::AddressSpace,
        size: usize,
    ) -> Option<Self::AddressSpace>;

    /// Grow or shrink `space` from `old_size` to `new_size` bytes; returns the new size
    fn grow_address_space(
        &self,
        space: &mut Self::AddressSpace,
        old_size: usize,
        new_size: usize,
    ) -> Option<usize>;

    /// Tear down an address space of `size` bytes
    fn destroy_address_space(&self, space: Self::AddressSpace, size: usize);

    /// Install `space` as the user half and `kstack_top` as the trap stack
    fn switch_user(&self, space: &Self::AddressSpace, kstack_top: usize);

    /// Switch back to the kernel-only address space
    fn switch_kernel(&self);
}

/// Open-file and current-directory handles
///
/// Handles are shared through `Arc`: duplicating is a refcount increment and
/// the final release is handed back to the implementor.
pub trait Files {
    type File;
    type Dir;

    /// Directory handle for the first process
    fn root_dir(&self) -> Option<Arc<Self::Dir>>;

    fn dup_file(&self, file: &Arc<Self::File>) -> Arc<Self::File> {
        Arc::clone(file)
    }

    fn close_file(&self, file: Arc<Self::File>);

    fn dup_dir(&self, dir: &Arc<Self::Dir>) -> Arc<Self::Dir> {
        Arc::clone(dir)
    }

    fn release_dir(&self, dir: Arc<Self::Dir>);
}

/// Per-CPU architecture primitives
pub trait Arch {
    /// Index of the CPU the caller executes on; must be called with interrupts off
    fn cpu_id(&self) -> usize;

    fn intr_on(&self);

    fn intr_off(&self);

    fn intr_get(&self) -> bool;

    /// Prepare `ctx` so the first switch into it enters the new-process path
    /// on the stack whose top is `kstack_top`
    fn init_context(&self, ctx: &mut Context, kstack_top: usize);

    /// Save the running context into `old` and resume `new`
    ///
    /// # Safety
    ///
    /// Both pointers must stay valid until the caller is resumed, and the
    /// caller must hold the process table lock with interrupts disabled.
    unsafe fn swtch(&self, old: *mut Context, new: *const Context);

    /// Hint issued by a scheduler pass that found no work
    fn idle(&self) {
        core::hint::spin_loop();
    }
}

/// Everything a kernel instance needs from its host
pub trait Platform: Memory + Files + Arch {}

impl<T: Memory + Files + Arch> Platform for T {}
