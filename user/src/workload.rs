//! CPU-bound bodies for demo processes

use std::hint::black_box;

use sched_kernel::hosted::Sys;

/// Repeated digit sum, e.g. 9875 -> 29 -> 11 -> 2
pub fn digit_root(mut n: u64) -> u64 {
    while n >= 10 {
        let mut sum = 0;
        while n > 0 {
            sum += n % 10;
            n /= 10;
        }
        n = sum;
    }
    n
}

/// Run `steps` additions, stopping at a return-to-user checkpoint every
/// `every` steps so a pending timer tick can preempt the caller
///
/// Returns `None` once the process has been killed.
pub fn spin(sys: &Sys, steps: u64, every: u64) -> Option<u64> {
    burn(sys, steps, every, false)
}

/// Like [`spin`], but also gives up the CPU at every checkpoint
pub fn spin_yielding(sys: &Sys, steps: u64, every: u64) -> Option<u64> {
    burn(sys, steps, every, true)
}

fn burn(sys: &Sys, steps: u64, every: u64, yield_cpu: bool) -> Option<u64> {
    let every = every.max(1);
    let mut acc: u64 = 0;
    for k in 0..steps {
        acc = acc.wrapping_add(black_box(k));
        if k % every == 0 {
            if sys.checkpoint() {
                log::debug!("process {} killed after {} steps", sys.pid(), k);
                return None;
            }
            if yield_cpu && sys.yield_now().is_err() {
                return None;
            }
        }
    }
    Some(acc)
}
