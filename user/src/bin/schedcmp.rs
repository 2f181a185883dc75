//! Run the same CPU-bound child under every scheduling policy and compare
//! wait time, run time, and syscall usage
//!
//! Usage: schedcmp [steps] [cpus]

use std::process;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sched_api::SchedPolicy;
use sched_kernel::hosted::{Machine, Sys};
use sched_user::format_table;
use sched_user::report::{Measurement, Summary};
use sched_user::workload::{digit_root, spin};

const DEFAULT_STEPS: u64 = 40_000_000;
const CHECK_EVERY: u64 = 10_000;
const SETTLE_TICKS: i32 = 20;

fn arg_or<T: std::str::FromStr>(arg: Option<String>, default: T) -> T {
    arg.and_then(|a| a.parse().ok()).unwrap_or(default)
}

fn measure(sys: &Sys, policy: SchedPolicy, steps: u64) -> Option<Measurement> {
    if let Err(e) = sys.set_policy(policy) {
        log::error!("Error setting scheduler policy {}: {}", policy.name(), e);
        return None;
    }
    println!("Policy set to {}", policy.name());

    // Only the parent's own attributes change; the child starts from defaults.
    match policy {
        SchedPolicy::Bjf => {
            let _ = sys.set_priority(10);
        }
        SchedPolicy::Sjf => {
            let _ = sys.set_burst_estimate(50);
        }
        _ => {}
    }

    let start_total = sys.num_syscalls().ok()?;
    let start_good = sys.num_good_syscalls().ok()?;

    let pid = match sys.fork(move |child| {
        let me = child.pid();
        let lifetime = child.lifetime(me).unwrap_or(0);
        let uncles = child.uncle_count(me).unwrap_or(0);
        println!("Child process {} starting: Lifetime={}, Uncles={}", me, lifetime, uncles);
        let _ = spin(child, steps, CHECK_EVERY);
    }) {
        Ok(pid) => pid,
        Err(e) => {
            log::error!("Fork failed: {}", e);
            return None;
        }
    };

    let _ = sys.sleep(SETTLE_TICKS);
    let lifetime = sys.lifetime(pid).unwrap_or(0);
    let uncles = sys.uncle_count(pid).unwrap_or(0);
    println!("Child {} metrics during execution: Life: {}, Uncles: {}", pid, lifetime, uncles);

    let status = match sys.waitx() {
        Ok(status) => status,
        Err(e) => {
            log::error!("Waitx failed for policy {}: {}", policy.name(), e);
            return None;
        }
    };
    let measurement = Measurement {
        wait_time: status.wait_time,
        run_time: status.run_time,
        syscalls: sys.num_syscalls().ok()? - start_total,
        good_syscalls: sys.num_good_syscalls().ok()? - start_good,
        lifetime,
        uncles,
    };
    println!(
        "PID {} finished. Wait: {}, Run: {}, Life: {}, Syscalls: {}/{}, Uncles: {}",
        status.pid,
        measurement.wait_time,
        measurement.run_time,
        measurement.lifetime,
        measurement.good_syscalls,
        measurement.syscalls,
        measurement.uncles
    );
    Some(measurement)
}

fn compare(sys: &Sys, steps: u64) -> Summary {
    let mut summary = Summary::new();
    for policy in SchedPolicy::ALL {
        println!();
        println!("Testing Scheduler: {:<6} ({})", policy.name(), policy.as_raw());
        summary.record(policy, measure(sys, policy, steps));
    }

    println!();
    println!("Process table at completion:");
    print!("{}", format_table(&sys.processes()));
    summary
}

fn main() {
    let mut args = std::env::args().skip(1);
    let steps = arg_or(args.next(), DEFAULT_STEPS);
    let cpus = arg_or(args.next(), 1usize);

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let seed = digit_root(now) as u32;

    let machine = match Machine::builder()
        .cpus(cpus)
        .seed(seed)
        .tick_interval(Some(Duration::from_millis(1)))
        .timeout(Duration::from_secs(600))
        .build()
    {
        Ok(machine) => machine,
        Err(e) => {
            log::error!("schedcmp: {}", e);
            process::exit(1);
        }
    };

    println!(
        "--- Scheduling Policy Comparison ({} steps, {} cpu(s), Seed: {}) ---",
        steps, cpus, seed
    );
    match machine.run(move |sys| compare(sys, steps)) {
        Ok(summary) => {
            println!();
            print!("{}", summary.render());
        }
        Err(e) => {
            log::error!("schedcmp: {}", e);
            process::exit(1);
        }
    }
}
