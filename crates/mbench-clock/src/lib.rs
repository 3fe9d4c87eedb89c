//! Monotonic clock plus the two calibration routines every run performs
//! once before the first worker is spawned: the per-call overhead of the
//! clock itself, and its actual tick resolution.
//!
//! `now_ns` follows the same macOS/`clock_gettime` split used elsewhere in
//! this workspace for monotonic timestamps. `calibrate_overhead` and
//! `calibrate_resolution` are direct translations of libMicro's
//! `get_nsecs_overhead`/`get_nsecs_resolution`: the former times 1000
//! back-to-back clock reads and 3-sigma-filters the result to convergence;
//! the latter busy-loops at linearly increasing sizes and takes the
//! smallest nonzero delta observed as the counter's real resolution.

use mbench_stats::{crunch, remove_outliers};
use std::hint::black_box;

const NSECITER: usize = 1000;

#[derive(Debug, Clone, Copy)]
pub struct ClockCalibration {
    pub overhead_ns: i64,
    pub resolution_ns: i64,
}

/// Runs both calibration routines. Call once per process before timing
/// any benchmark batch; the result is cheap to copy and share with workers.
pub fn calibrate() -> ClockCalibration {
    ClockCalibration {
        overhead_ns: calibrate_overhead(),
        resolution_ns: calibrate_resolution(),
    }
}

#[cfg(target_os = "macos")]
#[inline(always)]
#[allow(deprecated)]
pub fn now_ns() -> i64 {
    use std::sync::OnceLock;
    static TIMEBASE: OnceLock<(u64, u64)> = OnceLock::new();
    let (numer, denom) = *TIMEBASE.get_or_init(|| {
        let mut info = libc::mach_timebase_info_data_t { numer: 0, denom: 0 };
        let rc = unsafe { libc::mach_timebase_info(&mut info) };
        if rc != 0 || info.denom == 0 {
            (1, 1)
        } else {
            (info.numer as u64, info.denom as u64)
        }
    });
    let t = unsafe { libc::mach_absolute_time() } as u128;
    ((t * numer as u128) / denom as u128) as i64
}

#[cfg(not(target_os = "macos"))]
#[inline(always)]
pub fn now_ns() -> i64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    unsafe {
        libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
    }
    (ts.tv_sec as i64) * 1_000_000_000 + ts.tv_nsec as i64
}

#[inline(always)]
pub fn now_us() -> i64 {
    now_ns() / 1000
}

/// Repeatedly times a single `now_ns()` call against itself, 3-sigma
/// filtering until stable, and returns the converged mean — the clock's
/// own measurement overhead. Unlike the main benchmark run, this always
/// recurses to convergence regardless of sample count.
pub fn calibrate_overhead() -> i64 {
    let _ = now_ns();
    let _ = now_ns();
    let _ = now_ns();

    let mut data: Vec<f64> = (0..NSECITER)
        .map(|_| {
            let s = now_ns();
            (now_ns() - s) as f64
        })
        .collect();

    let mut stats = crunch(&data);
    loop {
        let removed = remove_outliers(&mut data, &stats);
        if removed == 0 || data.is_empty() {
            break;
        }
        stats = crunch(&data);
    }

    stats.mean as i64
}

/// Finds the smallest busy-loop size that produces a visible clock delta,
/// then samples 1000 busy loops of linearly increasing size and returns the
/// smallest positive delta observed between consecutive samples. Falls
/// back to 1ns if the clock never reports two different values 1000 apart,
/// the same degenerate case libMicro guards against.
pub fn calibrate_resolution() -> i64 {
    let mut nops: i64 = 1;
    while nops < 10_000_000 {
        let start = now_ns();
        busy_loop(nops);
        let stop = now_ns();
        if stop > start {
            break;
        }
        nops += 1;
    }

    let mut y = [0i64; 1000];
    for (i, slot) in y.iter_mut().enumerate() {
        let start = now_ns();
        busy_loop(nops * i as i64);
        let stop = now_ns();
        *slot = stop - start;
    }

    let mut res = y[0];
    for i in 1..y.len() {
        let diff = y[i] - y[i - 1];
        if diff > 0 && res > diff {
            res = diff;
        }
    }
    if res == 0 { 1 } else { res }
}

#[inline(never)]
fn busy_loop(mut n: i64) {
    while n > 0 {
        black_box(n);
        n -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_ns_is_monotonic_across_calls() {
        let a = now_ns();
        let b = now_ns();
        assert!(b >= a);
    }

    #[test]
    fn calibrate_overhead_is_small_and_positive() {
        let overhead = calibrate_overhead();
        assert!(overhead >= 0);
        assert!(overhead < 1_000_000, "overhead {overhead}ns looks implausible");
    }

    #[test]
    fn calibrate_resolution_is_never_zero() {
        assert!(calibrate_resolution() >= 1);
    }
}
