//! Round-robin demo: several CPU-bound processes that report progress
//!
//! Usage: rrdemo [processes]
//!
//! Interleaved progress lines from different processes show the round-robin
//! scheduler at work.

use std::process;
use std::time::Duration;

use sched_api::SchedPolicy;
use sched_kernel::hosted::{Machine, Sys};
use sched_user::workload::spin_yielding;

const ITERATIONS: u32 = 10;
const STEPS_PER_ITERATION: u64 = 10_000_000;
const YIELD_EVERY: u64 = 1_000_000;

fn worker(sys: &Sys, id: usize) {
    for j in 0..ITERATIONS {
        if spin_yielding(sys, STEPS_PER_ITERATION, YIELD_EVERY).is_none() {
            println!("Process {}: killed", id);
            return;
        }
        println!("Process {}: completed iteration {}/{}", id, j + 1, ITERATIONS);
    }
    println!("Process {}: FINISHED", id);
}

fn run(sys: &Sys, n: usize) -> u64 {
    println!();
    println!("=== ROUND ROBIN SCHEDULING TEST ===");
    println!("Creating {} CPU-intensive processes", n);
    println!();

    let start = sys.uptime().unwrap_or(0);
    let mut forked = 0;
    for i in 0..n {
        match sys.fork(move |child| worker(child, i + 1)) {
            Ok(_) => forked += 1,
            Err(e) => {
                log::error!("Fork failed: {}", e);
                break;
            }
        }
    }
    for _ in 0..forked {
        let _ = sys.wait();
    }
    sys.uptime().unwrap_or(start) - start
}

fn main() {
    let n = std::env::args()
        .nth(1)
        .and_then(|a| a.parse::<usize>().ok())
        .unwrap_or(3)
        .clamp(1, 8);

    let machine = match Machine::builder()
        .cpus(1)
        .policy(SchedPolicy::RoundRobin)
        .tick_interval(Some(Duration::from_millis(1)))
        .timeout(Duration::from_secs(600))
        .build()
    {
        Ok(machine) => machine,
        Err(e) => {
            log::error!("rrdemo: {}", e);
            process::exit(1);
        }
    };

    match machine.run(move |sys| run(sys, n)) {
        Ok(elapsed) => {
            println!();
            println!("=== TEST COMPLETE ===");
            println!("All processes completed in {} timer ticks", elapsed);
        }
        Err(e) => {
            log::error!("rrdemo: {}", e);
            process::exit(1);
        }
    }
}
