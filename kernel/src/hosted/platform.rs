//! Thread-backed implementation of the collaborator traits
//!
//! Every CPU and every process runs on its own OS thread. A thread only
//! executes while it holds its baton; [`Arch::swtch`] hands the calling
//! CPU to the target thread and parks the caller until some CPU is handed
//! back to it. At any moment exactly one thread runs on behalf of each CPU,
//! which is the property the scheduler relies on.

use std::boxed::Box;
use std::cell::Cell;
use std::format;
use std::string::String;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use std::vec::Vec;

use sched_api::{Arch, Context, Files, Memory};

/// `Context::ra` of a context that has never run
const ENTRY: usize = 1;
/// `Context::ra` of a context parked inside `swtch`
const RESUME: usize = 2;

/// Size of the image the root process starts with
pub const ROOT_IMAGE_SIZE: usize = 4096;
/// Largest address space `grow_address_space` will produce
pub const MAX_SPACE_SIZE: usize = 1 << 30;

#[derive(Debug, Clone, Copy)]
struct Binding {
    token: usize,
    cpu: usize,
}

std::thread_local! {
    static CURRENT: Cell<Option<Binding>> = const { Cell::new(None) };
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Baton
// ============================================================================

/// Parking spot of one thread; holds the CPU handed to it, if any
struct Baton {
    cpu: Mutex<Option<usize>>,
    ready: Condvar,
    spawned: AtomicBool,
}

impl Baton {
    fn new(spawned: bool) -> Self {
        Self {
            cpu: Mutex::new(None),
            ready: Condvar::new(),
            spawned: AtomicBool::new(spawned),
        }
    }

    fn give(&self, cpu: usize) {
        *lock(&self.cpu) = Some(cpu);
        self.ready.notify_one();
    }

    fn take(&self) -> usize {
        let mut slot = lock(&self.cpu);
        loop {
            if let Some(cpu) = slot.take() {
                return cpu;
            }
            slot = self
                .ready
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

// ============================================================================
// Resources
// ============================================================================

/// Kernel stack: names the thread that executes on it
#[derive(Debug)]
pub struct HostedStack {
    token: usize,
}

#[derive(Debug)]
pub struct HostedSpace {
    id: usize,
    size: usize,
}

impl HostedSpace {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

#[derive(Debug)]
pub struct HostedFile {
    name: String,
}

impl HostedFile {
    pub fn new(name: &str) -> Self {
        Self {
            name: String::from(name),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug)]
pub struct HostedDir {
    path: String,
}

impl HostedDir {
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Resource counters, for leak checks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlatformStats {
    pub live_kstacks: usize,
    pub live_spaces: usize,
    pub closed_files: usize,
    pub released_dirs: usize,
}

// ============================================================================
// Platform
// ============================================================================

struct Shared {
    /// CPU id reported to threads not bound to any CPU
    monitor: usize,
    intr: Vec<AtomicBool>,
    batons: Mutex<Vec<Option<Arc<Baton>>>>,
    entry: spin::Once<Box<dyn Fn() + Send + Sync>>,
    next_space: AtomicUsize,
    live_kstacks: AtomicUsize,
    live_spaces: AtomicUsize,
    closed_files: AtomicUsize,
    released_dirs: AtomicUsize,
    fail_kstack: AtomicBool,
    fail_space: AtomicBool,
}

impl Shared {
    fn register(&self, spawned: bool) -> (usize, Arc<Baton>) {
        let baton = Arc::new(Baton::new(spawned));
        let mut batons = lock(&self.batons);
        batons.push(Some(Arc::clone(&baton)));
        (batons.len() - 1, baton)
    }

    fn baton(&self, token: usize) -> Arc<Baton> {
        match lock(&self.batons).get(token) {
            Some(Some(baton)) => Arc::clone(baton),
            _ => panic!("swtch: no thread for stack {}", token),
        }
    }
}

/// Collaborators for a kernel hosted on OS threads
///
/// Built for `cpus` scheduler CPUs; one extra CPU id serves threads that
/// are not bound to any CPU, such as a test driving the kernel from outside.
pub struct HostedPlatform {
    shared: Arc<Shared>,
}

impl HostedPlatform {
    pub fn new(cpus: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                monitor: cpus,
                intr: (0..=cpus).map(|_| AtomicBool::new(false)).collect(),
                batons: Mutex::new(Vec::new()),
                entry: spin::Once::new(),
                next_space: AtomicUsize::new(1),
                live_kstacks: AtomicUsize::new(0),
                live_spaces: AtomicUsize::new(0),
                closed_files: AtomicUsize::new(0),
                released_dirs: AtomicUsize::new(0),
                fail_kstack: AtomicBool::new(false),
                fail_space: AtomicBool::new(false),
            }),
        }
    }

    /// CPU id used by threads outside the machine
    pub fn monitor_cpu(&self) -> usize {
        self.shared.monitor
    }

    /// Install the code every new process thread starts in; it must never return
    pub fn set_entry(&self, entry: Box<dyn Fn() + Send + Sync>) {
        self.shared.entry.call_once(|| entry);
    }

    /// Bind the calling thread to `cpu` as that CPU's scheduler thread
    pub fn bind_cpu(&self, cpu: usize) {
        let (token, _) = self.shared.register(true);
        CURRENT.with(|c| c.set(Some(Binding { token, cpu })));
    }

    /// Make the next kernel stack allocation fail
    pub fn fail_next_kstack(&self) {
        self.shared.fail_kstack.store(true, Ordering::SeqCst);
    }

    /// Make the next address space duplication fail
    pub fn fail_next_duplicate(&self) {
        self.shared.fail_space.store(true, Ordering::SeqCst);
    }

    pub fn stats(&self) -> PlatformStats {
        let s = &self.shared;
        PlatformStats {
            live_kstacks: s.live_kstacks.load(Ordering::SeqCst),
            live_spaces: s.live_spaces.load(Ordering::SeqCst),
            closed_files: s.closed_files.load(Ordering::SeqCst),
            released_dirs: s.released_dirs.load(Ordering::SeqCst),
        }
    }

    fn binding(&self) -> Option<Binding> {
        CURRENT.with(Cell::get)
    }

    fn intr_flag(&self) -> &AtomicBool {
        &self.shared.intr[self.cpu_id()]
    }

    fn spawn_process(&self, token: usize, baton: Arc<Baton>) {
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(format!("proc-{}", token))
            .spawn(move || {
                let cpu = baton.take();
                CURRENT.with(|c| c.set(Some(Binding { token, cpu })));
                match shared.entry.get() {
                    Some(entry) => entry(),
                    None => panic!("process started before an entry was installed"),
                }
            });
        if let Err(e) = spawned {
            panic!("swtch: cannot start process thread: {}", e);
        }
    }
}

impl Memory for HostedPlatform {
    type AddressSpace = HostedSpace;
    type KernelStack = HostedStack;

    fn alloc_kstack(&self) -> Option<HostedStack> {
        if self.shared.fail_kstack.swap(false, Ordering::SeqCst) {
            return None;
        }
        let (token, _) = self.shared.register(false);
        self.shared.live_kstacks.fetch_add(1, Ordering::SeqCst);
        Some(HostedStack { token })
    }

    fn free_kstack(&self, stack: HostedStack) {
        // A finished process thread keeps its own handle on the baton.
        if let Some(entry) = lock(&self.shared.batons).get_mut(stack.token) {
            *entry = None;
        }
        self.shared.live_kstacks.fetch_sub(1, Ordering::SeqCst);
    }

    fn kstack_top(&self, stack: &HostedStack) -> usize {
        stack.token
    }

    fn create_address_space(&self) -> Option<(HostedSpace, usize)> {
        let id = self.shared.next_space.fetch_add(1, Ordering::SeqCst);
        self.shared.live_spaces.fetch_add(1, Ordering::SeqCst);
        let space = HostedSpace {
            id,
            size: ROOT_IMAGE_SIZE,
        };
        Some((space, ROOT_IMAGE_SIZE))
    }

    fn duplicate_address_space(&self, _parent: &HostedSpace, size: usize) -> Option<HostedSpace> {
        if self.shared.fail_space.swap(false, Ordering::SeqCst) {
            return None;
        }
        let id = self.shared.next_space.fetch_add(1, Ordering::SeqCst);
        self.shared.live_spaces.fetch_add(1, Ordering::SeqCst);
        Some(HostedSpace { id, size })
    }

    fn grow_address_space(&self, space: &mut HostedSpace, _old: usize, new: usize) -> Option<usize> {
        if new > MAX_SPACE_SIZE {
            return None;
        }
        space.size = new;
        Some(new)
    }

    fn destroy_address_space(&self, _space: HostedSpace, _size: usize) {
        self.shared.live_spaces.fetch_sub(1, Ordering::SeqCst);
    }

    fn switch_user(&self, _space: &HostedSpace, _kstack_top: usize) {}

    fn switch_kernel(&self) {}
}

impl Files for HostedPlatform {
    type File = HostedFile;
    type Dir = HostedDir;

    fn root_dir(&self) -> Option<Arc<HostedDir>> {
        Some(Arc::new(HostedDir {
            path: String::from("/"),
        }))
    }

    fn close_file(&self, file: Arc<HostedFile>) {
        if Arc::strong_count(&file) == 1 {
            log::trace!("close {}", file.name());
        }
        self.shared.closed_files.fetch_add(1, Ordering::SeqCst);
    }

    fn release_dir(&self, _dir: Arc<HostedDir>) {
        self.shared.released_dirs.fetch_add(1, Ordering::SeqCst);
    }
}

impl Arch for HostedPlatform {
    fn cpu_id(&self) -> usize {
        self.binding().map_or(self.shared.monitor, |b| b.cpu)
    }

    fn intr_on(&self) {
        self.intr_flag().store(true, Ordering::SeqCst);
    }

    fn intr_off(&self) {
        self.intr_flag().store(false, Ordering::SeqCst);
    }

    fn intr_get(&self) -> bool {
        self.intr_flag().load(Ordering::SeqCst)
    }

    fn init_context(&self, ctx: &mut Context, kstack_top: usize) {
        *ctx = Context::default();
        ctx.ra = ENTRY;
        ctx.sp = kstack_top;
    }

    unsafe fn swtch(&self, old: *mut Context, new: *const Context) {
        let Some(me) = self.binding() else {
            panic!("swtch: thread not bound to a cpu");
        };
        let target = unsafe { *new };
        unsafe {
            (*old).ra = RESUME;
            (*old).sp = me.token;
        }

        // Once the cpu is given away a parent may reap this process and free
        // its stack, so the own baton has to be in hand before the handoff.
        let mine = self.shared.baton(me.token);
        let baton = self.shared.baton(target.sp);
        if target.ra == ENTRY && !baton.spawned.swap(true, Ordering::SeqCst) {
            self.spawn_process(target.sp, Arc::clone(&baton));
        }
        baton.give(me.cpu);

        let cpu = mine.take();
        CURRENT.with(|c| c.set(Some(Binding { token: me.token, cpu })));
    }

    fn idle(&self) {
        thread::sleep(Duration::from_micros(100));
    }
}
