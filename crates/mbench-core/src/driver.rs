//! Top-level orchestration: parse options, calibrate the clock, build the
//! shared arena, run the workers, crunch the results, print the report.
//! Mirrors libMicro's `actual_main` step for step.

use crate::config::{self, RunConfig};
use crate::engine;
use crate::error::HarnessError;
use crate::kernel::Kernel;
use crate::report;
use mbench_sync::PhaseBarrier;

/// Sample ring capacity. libMicro sized this generously so a long run's
/// histogram/stats pass always has the full run to look back on rather
/// than a recency-biased tail; there's no header defining the original
/// constant in the retrieved sources, so this picks a size in the same
/// spirit.
const DATASIZE: usize = 10_000;

pub fn run<K: Kernel>(kernel: &mut K, args: &[String]) -> Result<i32, HarnessError> {
    let start_wall = mbench_clock::now_ns();

    kernel.init()?;

    let cfg = config::parse(args, kernel)?;

    if cfg.echo {
        eprint!("Running:{:>30}", cfg.test_name);
    }

    tracing::info!(debug_level = cfg.debug_level, "configuration resolved");

    let clock = mbench_clock::calibrate();
    kernel.init_run(&cfg)?;

    let hwm = cfg.total_threads() as usize;
    let barrier = PhaseBarrier::create(hwm, DATASIZE)?;

    let tsd_stride = engine::tsd_stride(kernel.tsd_size());
    let tsd_bytes = hwm * tsd_stride + 8192;
    let mut tsd_region = mbench_mmap::SharedRegion::new(tsd_bytes)?;
    let tsd_base = tsd_region.as_mut_ptr();

    let start = mbench_clock::now_ns();
    let deadline = start + cfg.duration_ms * 1_000_000;
    barrier.start(start, deadline);

    engine::run_workers(kernel, &barrier, &cfg, clock, tsd_base)?;

    barrier.set_endtime(mbench_clock::now_ns());

    let ns_samples = barrier.samples();
    if ns_samples.is_empty() {
        return Err(HarnessError::Numeric("run produced no samples"));
    }
    // Statistics and the histogram both operate in microseconds/call, not
    // nanoseconds: convert once here rather than at every downstream site.
    let samples: Vec<f64> = ns_samples.iter().map(|ns| ns / 1000.0).collect();

    let dropped = (barrier.batches() as usize).saturating_sub(DATASIZE);

    let (corrected_stats, _kept, outliers_removed) = if cfg.raw_stats {
        (mbench_stats::crunch(&samples), samples.clone(), 0)
    } else {
        mbench_stats::crunch_with_outliers_removed(&samples)
    };
    let raw_stats = mbench_stats::crunch(&samples);

    let headline = if cfg.report_mean { corrected_stats.mean } else { corrected_stats.median };

    if !cfg.suppress_header {
        report::print_header();
    }
    report::print_summary_line(
        &cfg,
        headline,
        samples.len(),
        barrier.total_count(),
        barrier.total_errors(),
        &kernel.result(),
    );

    // Printed after the data line, leading with the invoking program's own
    // path rather than the benchmark name, matching the original's `argv[0]`
    // leader.
    if cfg.print_args {
        let argv0 = std::env::args().next().unwrap_or_else(|| cfg.test_name.clone());
        print!("# {argv0} ");
        for a in args {
            print!("{a} ");
        }
        println!();
    }

    if cfg.print_stats {
        report::print_stats_block(
            &raw_stats,
            &corrected_stats,
            outliers_removed,
            barrier.quant_suspect_batches(),
            barrier.batches(),
            dropped,
        );
        if let Some(histo) = mbench_stats::histogram::build(&samples) {
            report::print_histogram(&histo);
        }
    }

    if cfg.warn {
        let warnings = report::warnings(
            &cfg,
            &corrected_stats,
            barrier.quant_suspect_batches(),
            barrier.batches(),
            barrier.total_count(),
            barrier.total_errors(),
            clock.resolution_ns,
        );
        report::print_warnings(&warnings);
    }

    kernel.fini_run()?;
    kernel.fini();

    if cfg.echo {
        let elapsed_secs = (mbench_clock::now_ns() - start_wall) as f64 / 1.0e9;
        eprintln!(" for {elapsed_secs:>12.5} seconds");
    }

    Ok(if barrier.total_errors() > 0 { 1 } else { 0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{BatchOutcome, Tsd};

    struct CountingKernel;
    impl Kernel for CountingKernel {
        fn run(&self, _tsd: Tsd) -> BatchOutcome {
            BatchOutcome { count: 1, errors: 0 }
        }
    }

    #[test]
    fn single_process_single_thread_run_completes() {
        let mut k = CountingKernel;
        let args: Vec<String> = vec!["-1", "-T1", "-P1", "-C20", "-D100", "-B1"]
            .into_iter()
            .map(String::from)
            .collect();
        let code = run(&mut k, &args).unwrap();
        assert_eq!(code, 0);
    }
}
