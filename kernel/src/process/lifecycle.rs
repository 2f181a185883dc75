//! Process creation and teardown

use sched_api::{
    Error, Pid, Platform, ProcName, ProcState, ProcTimes, Result, TrapFrame, WaitxStatus,
};

use crate::kernel::Kernel;
use crate::param::{NOFILE, ROOT_NAME};
use crate::process::Proc;
use crate::sync::Channel;

impl<P: Platform> Kernel<P> {
    // ========================================================================
    // Allocation
    // ========================================================================

    /// Claim a slot and give it a kernel stack and a context that starts in
    /// [`Kernel::fork_return`]
    fn alloc_proc(&self) -> Result<usize> {
        let slot = self.lock_table().allocate(self.now())?;

        let Some(kstack) = self.platform().alloc_kstack() else {
            let _ = self.lock_table().reclaim(slot);
            log::warn!("alloc_proc: out of kernel stacks");
            return Err(Error::OutOfMemory);
        };
        let top = self.platform().kstack_top(&kstack);

        let mut table = self.lock_table();
        let p = table.get_mut(slot);
        p.kstack = Some(kstack);
        p.kstack_top = top;
        p.trapframe = TrapFrame::default();
        self.platform().init_context(&mut p.context, top);
        Ok(slot)
    }

    /// Give back everything a reclaimed slot still owned
    fn release_resources(&self, old: Proc<P>) {
        let Proc {
            kstack,
            space,
            size,
            ofile,
            cwd,
            ..
        } = old;
        for file in ofile.into_iter().flatten() {
            self.platform().close_file(file);
        }
        if let Some(dir) = cwd {
            self.platform().release_dir(dir);
        }
        if let Some(space) = space {
            self.platform().destroy_address_space(space, size);
        }
        if let Some(kstack) = kstack {
            self.platform().free_kstack(kstack);
        }
    }

    /// Undo an allocation that could not be completed
    fn abandon(&self, slot: usize) {
        let old = self.lock_table().reclaim(slot);
        self.release_resources(old);
    }

    /// Create the root process, runnable from the start of its address space
    pub fn userinit(&self) -> Result<Pid> {
        if self.lock_table().root().is_some() {
            return Err(Error::InvalidArgument("root process already exists"));
        }
        let slot = self.alloc_proc()?;
        let Some((space, size)) = self.platform().create_address_space() else {
            self.abandon(slot);
            return Err(Error::OutOfMemory);
        };
        let cwd = self.platform().root_dir();

        let mut table = self.lock_table();
        let p = table.get_mut(slot);
        p.space = Some(space);
        p.size = size;
        p.name = ProcName::new(ROOT_NAME);
        p.cwd = cwd;
        p.state = ProcState::Runnable;
        let pid = p.pid;
        table.set_root(pid);
        log::info!("userinit: root process {} ({})", pid, ROOT_NAME);
        Ok(pid)
    }

    // ========================================================================
    // Fork / exit / wait
    // ========================================================================

    /// Copy the calling process. The child resumes at the caller's trap frame
    /// with a zero return value; the parent gets the child's pid.
    pub fn fork(&self) -> Result<Pid> {
        let cur = self.current_slot().ok_or(Error::NoCurrentProcess)?;
        let child = self.alloc_proc()?;

        let mut table = self.lock_table();
        let parent = table.get(cur);
        let parent_pid = parent.pid;
        let space = parent
            .space
            .as_ref()
            .and_then(|space| self.platform().duplicate_address_space(space, parent.size));
        let Some(space) = space else {
            let old = table.reclaim(child);
            drop(table);
            self.release_resources(old);
            log::warn!("fork: cannot copy address space of pid {}", parent_pid);
            return Err(Error::OutOfMemory);
        };

        let parent = table.get(cur);
        let size = parent.size;
        let name = parent.name;
        let mut trapframe = parent.trapframe;
        trapframe.ret = 0;
        let ofile: [_; NOFILE] = core::array::from_fn(|fd| {
            parent.ofile[fd]
                .as_ref()
                .map(|file| self.platform().dup_file(file))
        });
        let cwd = parent.cwd.as_ref().map(|dir| self.platform().dup_dir(dir));

        let c = table.get_mut(child);
        c.space = Some(space);
        c.size = size;
        c.parent = Some(parent_pid);
        c.trapframe = trapframe;
        c.ofile = ofile;
        c.cwd = cwd;
        c.name = name;
        c.state = ProcState::Runnable;
        let pid = c.pid;
        log::debug!("fork: {} -> {}", parent_pid, pid);
        Ok(pid)
    }

    /// Terminate the calling process. It stays a zombie until its parent
    /// reaps it, and never runs again.
    pub fn exit(&self) -> ! {
        let Some(cur) = self.current_slot() else {
            panic!("exit: no process");
        };

        let (files, cwd) = {
            let mut table = self.lock_table();
            if table.root() == Some(table.get(cur).pid) {
                panic!("init exiting");
            }
            let p = table.get_mut(cur);
            let files = core::mem::replace(&mut p.ofile, core::array::from_fn(|_| None));
            (files, p.cwd.take())
        };
        for file in files.into_iter().flatten() {
            self.platform().close_file(file);
        }
        if let Some(dir) = cwd {
            self.platform().release_dir(dir);
        }

        let mut table = self.lock_table();
        let pid = table.get(cur).pid;

        // Parent might be sleeping in wait().
        if let Some(parent) = table.get(cur).parent {
            table.wakeup(Channel::Proc(parent));
        }

        if let Some(root) = table.root() {
            if table.reparent(pid, root) {
                table.wakeup(Channel::Proc(root));
            }
        }

        let now = self.now();
        let p = table.get_mut(cur);
        p.times.exittime = now;
        p.state = ProcState::Zombie;
        log::debug!("exit: {} at tick {}", pid, now);

        self.sched(&mut table);
        panic!("zombie exit");
    }

    /// Wait for a child to exit and reclaim it; returns its pid
    pub fn wait(&self) -> Result<Pid> {
        self.reap_child().map(|(pid, _)| pid)
    }

    /// Like [`Kernel::wait`], also reporting how long the child waited and ran
    pub fn waitx(&self) -> Result<WaitxStatus> {
        let (pid, times) = self.reap_child()?;
        Ok(WaitxStatus {
            pid,
            wait_time: times.wait_time(),
            run_time: times.runtime,
        })
    }

    fn reap_child(&self) -> Result<(Pid, ProcTimes)> {
        let cur = self.current_slot().ok_or(Error::NoCurrentProcess)?;
        let mut table = self.lock_table();
        loop {
            let me = table.get(cur).pid;
            let (have_kids, zombie) = table.zombie_child(me);
            if let Some(slot) = zombie {
                let old = table.reclaim(slot);
                drop(table);
                let reaped = (old.pid, old.times);
                log::debug!("wait: {} reaped {}", me, old.pid);
                self.release_resources(old);
                return Ok(reaped);
            }

            if !have_kids || table.get(cur).killed {
                return Err(Error::NoChildren);
            }

            // Woken by a child's exit.
            table = self.sleep_locked(Channel::Proc(me), table);
        }
    }

    /// Flag `pid` for termination at its next checkpoint
    pub fn kill(&self, pid: Pid) -> Result<()> {
        self.lock_table().kill(pid)
    }

    // ========================================================================
    // Per-process state of the caller
    // ========================================================================

    /// First code every new process runs, entered from its initial context
    pub fn fork_return(&self) {
        // Still holding the table lock from the scheduler.
        unsafe { self.ptable.force_unlock(self) };
    }

    pub fn current_pid(&self) -> Result<Pid> {
        let cur = self.current_slot().ok_or(Error::NoCurrentProcess)?;
        Ok(self.lock_table().get(cur).pid)
    }

    /// Whether the caller has been killed; polled at trap-return checkpoints
    pub fn is_killed(&self) -> Result<bool> {
        let cur = self.current_slot().ok_or(Error::NoCurrentProcess)?;
        Ok(self.lock_table().get(cur).killed)
    }

    pub fn set_name(&self, name: &str) -> Result<()> {
        let cur = self.current_slot().ok_or(Error::NoCurrentProcess)?;
        self.lock_table().get_mut(cur).name = ProcName::new(name);
        Ok(())
    }

    /// Run `f` on the caller's saved user registers
    pub fn with_trapframe<R>(&self, f: impl FnOnce(&mut TrapFrame) -> R) -> Result<R> {
        let cur = self.current_slot().ok_or(Error::NoCurrentProcess)?;
        Ok(f(&mut self.lock_table().get_mut(cur).trapframe))
    }

    /// Install `file` in the caller's lowest free descriptor
    pub fn fdalloc(&self, file: alloc::sync::Arc<P::File>) -> Result<usize> {
        let cur = self.current_slot().ok_or(Error::NoCurrentProcess)?;
        let mut table = self.lock_table();
        let p = table.get_mut(cur);
        let Some(fd) = p.ofile.iter().position(Option::is_none) else {
            drop(table);
            self.platform().close_file(file);
            return Err(Error::InvalidArgument("descriptor table full"));
        };
        p.ofile[fd] = Some(file);
        Ok(fd)
    }

    /// Grow (or with a negative `delta`, shrink) the caller's address space;
    /// returns the previous size
    pub fn grow(&self, delta: isize) -> Result<usize> {
        let cur = self.current_slot().ok_or(Error::NoCurrentProcess)?;
        let mut table = self.lock_table();
        let p = table.get_mut(cur);
        let old = p.size;
        let new = if delta >= 0 {
            old.checked_add(delta.unsigned_abs())
        } else {
            old.checked_sub(delta.unsigned_abs())
        }
        .ok_or(Error::InvalidArgument("address space size out of range"))?;

        let space = p.space.as_mut().ok_or(Error::OutOfMemory)?;
        let size = self
            .platform()
            .grow_address_space(space, old, new)
            .ok_or(Error::OutOfMemory)?;
        p.size = size;
        self.platform().switch_user(space, p.kstack_top);
        Ok(old)
    }
}
