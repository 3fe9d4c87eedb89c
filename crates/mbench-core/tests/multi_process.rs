//! Exercises the real worker topology across actual forked OS processes
//! (not just threads), since that's the one thing unit tests inside
//! `engine.rs` can't cover on their own.

use mbench_core::config::RunConfig;
use mbench_core::kernel::{BatchOutcome, Kernel, Tsd};
use mbench_core::{driver, engine};
use mbench_sync::PhaseBarrier;
use std::sync::atomic::{AtomicU64, Ordering};

struct CountingKernel;

impl Kernel for CountingKernel {
    fn run(&self, _tsd: Tsd) -> BatchOutcome {
        BatchOutcome { count: 1, errors: 0 }
    }
}

#[test]
fn two_processes_two_threads_each_rendezvous_and_stop() {
    let cfg = RunConfig {
        processes: 2,
        threads: 2,
        min_samples: 20,
        duration_ms: 50,
        batch_size: 1,
        ..RunConfig::default()
    };

    let hwm = cfg.total_threads() as usize;
    let barrier = PhaseBarrier::create(hwm, 256).unwrap();
    let clock = mbench_clock::calibrate();

    let mut tsd_region = mbench_mmap::SharedRegion::new(8192).unwrap();
    let tsd_base = tsd_region.as_mut_ptr();

    let start = mbench_clock::now_ns();
    barrier.start(start, start + cfg.duration_ms * 1_000_000);

    let kernel = CountingKernel;
    engine::run_workers(&kernel, &barrier, &cfg, clock, tsd_base).unwrap();

    barrier.set_endtime(mbench_clock::now_ns());

    assert!(!barrier.is_running());
    assert!(barrier.batches() >= cfg.min_samples);
    assert_eq!(barrier.total_count(), barrier.batches() * hwm as i64);
    assert_eq!(barrier.total_errors(), 0);
}

#[test]
fn single_process_flag_never_forks() {
    let cfg = RunConfig {
        processes: 3,
        threads: 1,
        single_process: true,
        min_samples: 5,
        duration_ms: 20,
        batch_size: 1,
        ..RunConfig::default()
    };

    let hwm = cfg.total_threads() as usize;
    let barrier = PhaseBarrier::create(hwm, 256).unwrap();
    let clock = mbench_clock::calibrate();

    let mut tsd_region = mbench_mmap::SharedRegion::new(8192).unwrap();
    let tsd_base = tsd_region.as_mut_ptr();

    let start = mbench_clock::now_ns();
    barrier.start(start, start + cfg.duration_ms * 1_000_000);

    let kernel = CountingKernel;
    engine::run_workers(&kernel, &barrier, &cfg, clock, tsd_base).unwrap();

    assert!(barrier.batches() > 0);
}

struct ErroringKernel {
    calls: AtomicU64,
}

impl Kernel for ErroringKernel {
    fn run(&self, _tsd: Tsd) -> BatchOutcome {
        let n = self.calls.fetch_add(1, Ordering::Relaxed);
        BatchOutcome { count: 1, errors: if n % 3 == 0 { 1 } else { 0 } }
    }
}

#[test]
fn driver_run_reports_nonzero_exit_when_kernel_reports_errors() {
    let mut kernel = ErroringKernel { calls: AtomicU64::new(0) };
    let args: Vec<String> = vec!["-1", "-P1", "-T1", "-C10", "-D50", "-B1"]
        .into_iter()
        .map(String::from)
        .collect();

    let code = driver::run(&mut kernel, &args).unwrap();
    assert_eq!(code, 1);
}

struct FiniBatchErrorKernel {
    batches_seen: AtomicU64,
}

impl Kernel for FiniBatchErrorKernel {
    fn run(&self, _tsd: Tsd) -> BatchOutcome {
        BatchOutcome { count: 1, errors: 0 }
    }

    fn fini_batch(&self, _tsd: Tsd) -> u64 {
        let n = self.batches_seen.fetch_add(1, Ordering::Relaxed) + 1;
        if n % 10 == 0 {
            1
        } else {
            0
        }
    }
}

/// Regression test for folding `fini_batch`'s errors into the committed
/// sample: `run()` itself never reports an error here, so this only passes
/// if `fini_batch`'s return value reaches `PhaseBarrier::total_errors`.
#[test]
fn fini_batch_errors_are_folded_into_committed_samples() {
    let cfg = RunConfig {
        processes: 1,
        threads: 1,
        min_samples: 20,
        duration_ms: 1,
        batch_size: 1,
        ..RunConfig::default()
    };

    let hwm = cfg.total_threads() as usize;
    let barrier = PhaseBarrier::create(hwm, 64).unwrap();
    let clock = mbench_clock::calibrate();

    let mut tsd_region = mbench_mmap::SharedRegion::new(8192).unwrap();
    let tsd_base = tsd_region.as_mut_ptr();

    let start = mbench_clock::now_ns();
    barrier.start(start, start + cfg.duration_ms * 1_000_000);

    let kernel = FiniBatchErrorKernel { batches_seen: AtomicU64::new(0) };
    engine::run_workers(&kernel, &barrier, &cfg, clock, tsd_base).unwrap();

    assert_eq!(barrier.batches(), cfg.min_samples);
    assert_eq!(barrier.total_errors(), cfg.min_samples / 10);
}
