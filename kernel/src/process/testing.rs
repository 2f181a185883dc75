//! Test platforms: an inert one for table bookkeeping, and one whose memory
//! side is a mock so allocation failures can be injected

use alloc::sync::Arc;

use mockall::mock;
use sched_api::{Arch, Context, Files, Memory};

pub(crate) struct NullPlatform;

impl Memory for NullPlatform {
    type AddressSpace = ();
    type KernelStack = ();

    fn alloc_kstack(&self) -> Option<()> {
        Some(())
    }

    fn free_kstack(&self, _stack: ()) {}

    fn kstack_top(&self, _stack: &()) -> usize {
        0
    }

    fn create_address_space(&self) -> Option<((), usize)> {
        Some(((), 0))
    }

    fn duplicate_address_space(&self, _parent: &(), _size: usize) -> Option<()> {
        Some(())
    }

    fn grow_address_space(&self, _space: &mut (), _old: usize, new: usize) -> Option<usize> {
        Some(new)
    }

    fn destroy_address_space(&self, _space: (), _size: usize) {}

    fn switch_user(&self, _space: &(), _kstack_top: usize) {}

    fn switch_kernel(&self) {}
}

impl Files for NullPlatform {
    type File = ();
    type Dir = ();

    fn root_dir(&self) -> Option<Arc<()>> {
        Some(Arc::new(()))
    }

    fn close_file(&self, _file: Arc<()>) {}

    fn release_dir(&self, _dir: Arc<()>) {}
}

impl Arch for NullPlatform {
    fn cpu_id(&self) -> usize {
        0
    }

    fn intr_on(&self) {}

    fn intr_off(&self) {}

    fn intr_get(&self) -> bool {
        false
    }

    fn init_context(&self, _ctx: &mut Context, _kstack_top: usize) {}

    unsafe fn swtch(&self, _old: *mut Context, _new: *const Context) {
        panic!("swtch on a platform without processes");
    }
}

mock! {
    pub(crate) Mem {}

    impl Memory for Mem {
        type AddressSpace = u32;
        type KernelStack = u32;

        fn alloc_kstack(&self) -> Option<u32>;
        fn free_kstack(&self, stack: u32);
        fn kstack_top(&self, stack: &u32) -> usize;
        fn create_address_space(&self) -> Option<(u32, usize)>;
        fn duplicate_address_space(&self, parent: &u32, size: usize) -> Option<u32>;
        fn grow_address_space(&self, space: &mut u32, old_size: usize, new_size: usize) -> Option<usize>;
        fn destroy_address_space(&self, space: u32, size: usize);
        fn switch_user(&self, space: &u32, kstack_top: usize);
        fn switch_kernel(&self);
    }
}

/// Platform on CPU 0 whose memory calls go to a [`MockMem`]
pub(crate) struct MockedPlatform {
    pub(crate) mem: MockMem,
}

impl MockedPlatform {
    pub(crate) fn new(mem: MockMem) -> Self {
        Self { mem }
    }
}

impl Memory for MockedPlatform {
    type AddressSpace = u32;
    type KernelStack = u32;

    fn alloc_kstack(&self) -> Option<u32> {
        self.mem.alloc_kstack()
    }

    fn free_kstack(&self, stack: u32) {
        self.mem.free_kstack(stack)
    }

    fn kstack_top(&self, stack: &u32) -> usize {
        self.mem.kstack_top(stack)
    }

    fn create_address_space(&self) -> Option<(u32, usize)> {
        self.mem.create_address_space()
    }

    fn duplicate_address_space(&self, parent: &u32, size: usize) -> Option<u32> {
        self.mem.duplicate_address_space(parent, size)
    }

    fn grow_address_space(&self, space: &mut u32, old: usize, new: usize) -> Option<usize> {
        self.mem.grow_address_space(space, old, new)
    }

    fn destroy_address_space(&self, space: u32, size: usize) {
        self.mem.destroy_address_space(space, size)
    }

    fn switch_user(&self, space: &u32, kstack_top: usize) {
        self.mem.switch_user(space, kstack_top)
    }

    fn switch_kernel(&self) {
        self.mem.switch_kernel()
    }
}

impl Files for MockedPlatform {
    type File = u32;
    type Dir = u32;

    fn root_dir(&self) -> Option<Arc<u32>> {
        Some(Arc::new(0))
    }

    fn close_file(&self, _file: Arc<u32>) {}

    fn release_dir(&self, _dir: Arc<u32>) {}
}

impl Arch for MockedPlatform {
    fn cpu_id(&self) -> usize {
        0
    }

    fn intr_on(&self) {}

    fn intr_off(&self) {}

    fn intr_get(&self) -> bool {
        false
    }

    fn init_context(&self, ctx: &mut Context, kstack_top: usize) {
        ctx.sp = kstack_top;
    }

    unsafe fn swtch(&self, _old: *mut Context, _new: *const Context) {
        panic!("swtch on a platform without processes");
    }
}
