//! Worker topology: `-P` processes, each running `-T` threads, every thread
//! looping batches against the shared [`PhaseBarrier`] until the run stops.
//!
//! Process fan-out uses raw `libc::fork`/`libc::waitpid` rather than
//! `std::process::Command`: the latter can only exec a fresh image, and
//! this harness needs to fork a *running* process so every child inherits
//! the parent's already-built shared mappings and already-calibrated clock
//! by copy-on-write, exactly as the original did. Thread fan-out within a
//! process uses `std::thread::scope`, the idiomatic replacement for
//! `pthread_create`/`pthread_join`: it lets every thread borrow the kernel,
//! the barrier and the config by reference instead of needing an `Arc`.

use crate::config::RunConfig;
use crate::kernel::{Kernel, Tsd};
use mbench_clock::ClockCalibration;
use mbench_sync::{PhaseBarrier, SampleResult};
use std::io;

/// Rounds a TSD size up to a 128-byte stride, matching the padding the
/// original harness used so per-thread scratch regions never share a cache
/// line with their neighbors.
pub fn tsd_stride(tsd_size: usize) -> usize {
    tsd_size.div_ceil(128) * 128
}

/// Computes the byte offset of worker `(p, t)`'s scratch region within the
/// shared TSD arena.
fn tsd_offset(p: usize, t: usize, threads: usize, stride: usize) -> usize {
    (p * threads + t) * stride
}

/// Returns a raw pointer to worker `(p, t)`'s TSD slice. The harness never
/// dereferences it; it only ever hands it to the kernel.
fn tsd_ptr(base: *mut u8, p: usize, t: usize, threads: usize, stride: usize) -> Tsd {
    unsafe { base.add(tsd_offset(p, t, threads, stride)) }
}

/// Raw pointers aren't `Send`, but a TSD pointer handed to exactly one
/// worker thread for the lifetime of a `thread::scope` call is as sound to
/// move as any other exclusively-owned value; this newtype carries it
/// across that boundary.
struct SendPtr(*mut u8);
unsafe impl Send for SendPtr {}

/// One worker thread's full batch loop: init, then repeated
/// init_batch/run/fini_batch cycles gated by the phase barrier, until the
/// barrier's run flag drops, then fini. Returns the thread's total error
/// count across every batch it ran.
///
/// Each batch's errors (`init_batch` + `run` + `fini_batch`, in that order,
/// mirroring libmicro.c's single running `r.re_errors` accumulator) are
/// folded into that batch's own [`SampleResult`] before it's committed, so
/// every kernel callback's errors reach `PhaseBarrier::total_errors`, not
/// just `run`'s.
#[allow(clippy::too_many_arguments)]
fn worker_thread<K: Kernel + ?Sized>(
    kernel: &K,
    barrier: &PhaseBarrier,
    cfg: &RunConfig,
    clock: ClockCalibration,
    total_threads: i64,
    tsd: Tsd,
) -> u64 {
    let mut total_errors = kernel.init_worker(tsd);
    let mut last_align = 0i64;

    while barrier.is_running() {
        let mut batch_errors = kernel.init_batch(tsd);

        if cfg.align_clock {
            let now = mbench_clock::now_ns();
            if now - last_align > 75_000_000 {
                std::thread::sleep(std::time::Duration::from_millis(10));
                last_align = now;
            }
        }

        // First rendezvous: every thread arrives here before any of them
        // starts timing, so a slow-to-start sibling can't skew this
        // thread's t0 against the phase's true start.
        barrier.queue(None, clock, total_threads);

        let t0 = mbench_clock::now_ns();
        let outcome = kernel.run(tsd);
        let t1 = mbench_clock::now_ns();

        batch_errors += outcome.errors;
        batch_errors += kernel.fini_batch(tsd);

        let sample = SampleResult {
            t0_ns: t0,
            t1_ns: t1,
            count: outcome.count,
            errors: batch_errors,
        };

        // Second rendezvous: commits this thread's timing into the shared
        // aggregate and blocks until every sibling has also committed.
        barrier.queue(Some(&sample), clock, total_threads);

        if cfg.min_samples <= 0 {
            if t1 > barrier.deadline() {
                barrier.stop();
            }
        } else if barrier.batches() >= cfg.min_samples && t1 > barrier.deadline() {
            barrier.stop();
        }

        total_errors += batch_errors;
    }

    kernel.fini_worker(tsd);
    total_errors
}

/// Runs one worker process's full complement of `-T` threads and returns
/// the summed error count. `tsd_base` must point at an arena with at least
/// `processes * threads * tsd_stride(kernel.tsd_size())` bytes reserved.
pub fn worker_process<K: Kernel + ?Sized>(
    kernel: &K,
    barrier: &PhaseBarrier,
    cfg: &RunConfig,
    clock: ClockCalibration,
    tsd_base: *mut u8,
    pindex: usize,
) -> u64 {
    let threads = cfg.threads as usize;
    let stride = tsd_stride(kernel.tsd_size());
    let total_threads = cfg.total_threads();

    // SAFETY: each thread receives a distinct, non-overlapping TSD pointer
    // computed from `pindex`/thread-index; `tsd_base` outlives the scope.
    std::thread::scope(|scope| {
        let handles: Vec<_> = (1..threads)
            .map(|t| {
                let tsd = SendPtr(tsd_ptr(tsd_base, pindex, t, threads, stride));
                scope.spawn(move || {
                    let tsd = tsd;
                    let tsd = tsd.0;
                    worker_thread(kernel, barrier, cfg, clock, total_threads, tsd)
                })
            })
            .collect();

        let tsd0 = tsd_ptr(tsd_base, pindex, 0, threads, stride);
        let mut total = worker_thread(kernel, barrier, cfg, clock, total_threads, tsd0);

        for h in handles {
            total += h.join().unwrap_or(0);
        }

        total
    })
}

/// Forks `cfg.processes` worker processes (or runs a single in-process
/// worker under `-1`) and waits for all of them. Returns the error count
/// from the parent's own work only; each child's count dies with the
/// child's address space, which is why the barrier — not the return value
/// of this function — is the source of truth for the run's total error
/// count (see `PhaseBarrier::total_errors`).
pub fn run_workers<K: Kernel + ?Sized>(
    kernel: &K,
    barrier: &PhaseBarrier,
    cfg: &RunConfig,
    clock: ClockCalibration,
    tsd_base: *mut u8,
) -> io::Result<()> {
    if cfg.single_process {
        for p in 0..cfg.processes as usize {
            worker_process(kernel, barrier, cfg, clock, tsd_base, p);
        }
        return Ok(());
    }

    let mut children = Vec::with_capacity(cfg.processes as usize);
    for p in 0..cfg.processes as usize {
        match unsafe { libc::fork() } {
            -1 => return Err(io::Error::last_os_error()),
            0 => {
                worker_process(kernel, barrier, cfg, clock, tsd_base, p);
                std::process::exit(0);
            }
            pid => children.push(pid),
        }
    }

    for pid in children {
        let mut status = 0i32;
        if unsafe { libc::waitpid(pid, &mut status, 0) } < 0 {
            return Err(io::Error::last_os_error());
        }
    }

    Ok(())
}
