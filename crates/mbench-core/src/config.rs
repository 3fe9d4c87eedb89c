//! Command-line configuration. A hand-rolled getopt-style scanner, not a
//! `clap` derive: the option set isn't fixed at compile time, because any
//! letter the harness doesn't reserve for itself is forwarded to
//! [`crate::kernel::Kernel::opt_switch`] for the embedder to interpret.
//! `clap`'s static parser has no hook for "unrecognized flag, ask someone
//! else" — this is the one surface where the harness can't reach for the
//! ecosystem's usual answer and has to roll its own, exactly as the
//! original harness did.

use crate::error::HarnessError;
use crate::kernel::Kernel;

/// Reserved single-letter options the harness itself understands. Anything
/// else is forwarded to the kernel.
const RESERVED: &str = "1AB:C:D:EG:HI:LMN:P:RST:VW?";

const DEF_SAMPLES: i64 = 100;
const DEF_TIME_MS: i64 = 10_000;
const DEF_NSECS_PER_OP: i64 = 1000;

#[derive(Debug, Clone)]
pub struct RunConfig {
    /// `-1`: run every worker thread in the parent process instead of
    /// forking one process per `-P`.
    pub single_process: bool,
    /// `-A`: sleep briefly between batches to align sampling to the clock.
    pub align_clock: bool,
    /// `-B`: batch size (work units per timed sample). `0` until
    /// [`RunConfig::finish`] auto-sizes it.
    pub batch_size: u32,
    /// `-C`: minimum number of samples to collect before `-D`'s deadline
    /// is allowed to stop the run.
    pub min_samples: i64,
    /// `-D`: run duration, in milliseconds.
    pub duration_ms: i64,
    /// `-E`: echo the test name to stderr before running, followed by the
    /// elapsed wall-clock time once the run finishes. Handled in
    /// `driver::run`, which brackets the whole run and therefore owns both
    /// halves of the print.
    pub echo: bool,
    /// `-G`: debug verbosity, mapped onto `tracing` spans.
    pub debug_level: u32,
    /// `-H`: suppress the column header line.
    pub suppress_header: bool,
    /// `-I`: hint for nanoseconds-per-op, used only to auto-size the batch.
    pub nsecs_per_op_hint: i64,
    /// `-L`: print the invocation line (argv0 plus every argument) after
    /// the summary data line.
    pub print_args: bool,
    /// `-M`: report the mean instead of the median as the headline number.
    pub report_mean: bool,
    /// `-N`: benchmark name, printed in the report.
    pub test_name: String,
    /// `-P`: worker process count.
    pub processes: u32,
    /// `-R`: skip the recursive 3-sigma outlier removal pass.
    pub raw_stats: bool,
    /// `-S`: print the extended statistics block.
    pub print_stats: bool,
    /// `-T`: worker thread count per process.
    pub threads: u32,
    /// `-W`: print the warnings block (implies `-S`).
    pub warn: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            single_process: false,
            align_clock: false,
            batch_size: 0,
            min_samples: 0,
            duration_ms: DEF_TIME_MS,
            echo: false,
            debug_level: 0,
            suppress_header: false,
            nsecs_per_op_hint: DEF_NSECS_PER_OP,
            print_args: false,
            report_mean: false,
            test_name: String::from("bench"),
            processes: 1,
            raw_stats: false,
            print_stats: false,
            threads: 1,
            warn: false,
        }
    }
}

impl RunConfig {
    pub fn total_threads(&self) -> i64 {
        self.processes as i64 * self.threads as i64
    }

    /// Auto-sizes `batch_size` when the caller didn't pass `-B` explicitly,
    /// following the same target-sample-rate arithmetic as the original:
    /// aim for a sample roughly every `10s / min_samples` (when `-C` was
    /// given) or `duration / 100` otherwise, then divide by the expected
    /// nanoseconds per op to get a batch size. The final division is
    /// truncating integer division, not rounding, matching the original's
    /// plain integer arithmetic.
    fn finish(mut self) -> Result<Self, HarnessError> {
        if self.single_process && self.processes != 1 {
            tracing::warn!(requested = self.processes, "-1 overrides -P; running a single process");
            self.processes = 1;
        }

        if self.batch_size == 0 {
            let sample_ns = if self.min_samples > 0 {
                (10_000_000_000f64 / self.min_samples as f64).round() as i64
            } else {
                (self.duration_ms as f64 * 1_000_000.0 / DEF_SAMPLES as f64).round() as i64
            };
            let hint = self.nsecs_per_op_hint.max(1);
            self.batch_size = (sample_ns / hint).max(1) as u32;
        }

        if self.processes == 0 {
            return Err(HarnessError::Config("process count (-P) must be at least 1".into()));
        }
        if self.threads == 0 {
            return Err(HarnessError::Config("thread count (-T) must be at least 1".into()));
        }
        if self.duration_ms < 0 {
            return Err(HarnessError::Config("duration (-D) must not be negative".into()));
        }
        if self.min_samples <= 0 && self.duration_ms <= 0 {
            return Err(HarnessError::Config(
                "at least one of minimum samples (-C) or duration (-D) must be positive".into(),
            ));
        }

        Ok(self)
    }
}

fn parse_sizetoint(s: &str) -> Result<i64, HarnessError> {
    let (digits, mult) = match s.as_bytes().last() {
        Some(b'k') | Some(b'K') => (&s[..s.len() - 1], 1024i64),
        Some(b'm') | Some(b'M') => (&s[..s.len() - 1], 1024i64 * 1024),
        Some(b'g') | Some(b'G') => (&s[..s.len() - 1], 1024i64 * 1024 * 1024),
        _ => (s, 1),
    };
    let base: i64 = digits
        .parse()
        .map_err(|_| HarnessError::Config(format!("not a number: {s}")))?;
    base.checked_mul(mult)
        .ok_or(HarnessError::Numeric("sized argument overflowed i64"))
}

/// Parses `args` (not including argv[0]) into a [`RunConfig`], forwarding
/// any letter outside [`RESERVED`] to `kernel.opt_switch`.
pub fn parse<K: Kernel + ?Sized>(args: &[String], kernel: &mut K) -> Result<RunConfig, HarnessError> {
    let mut cfg = RunConfig::default();
    let mut i = 0;

    while i < args.len() {
        let arg = &args[i];
        if !arg.starts_with('-') || arg.len() < 2 {
            return Err(HarnessError::Config(format!("unexpected argument: {arg}")));
        }
        let opt = arg.as_bytes()[1] as char;
        let attached = &arg[2..];

        let mut take_value = || -> Result<String, HarnessError> {
            if !attached.is_empty() {
                Ok(attached.to_string())
            } else {
                i += 1;
                args.get(i)
                    .cloned()
                    .ok_or_else(|| HarnessError::Config(format!("-{opt} requires an argument")))
            }
        };

        match opt {
            '1' => cfg.single_process = true,
            'A' => cfg.align_clock = true,
            'B' => cfg.batch_size = parse_sizetoint(&take_value()?)? as u32,
            'C' => cfg.min_samples = parse_sizetoint(&take_value()?)?,
            'D' => cfg.duration_ms = parse_sizetoint(&take_value()?)?,
            'E' => cfg.echo = true,
            'G' => cfg.debug_level = parse_sizetoint(&take_value()?)? as u32,
            'H' => cfg.suppress_header = true,
            'I' => cfg.nsecs_per_op_hint = parse_sizetoint(&take_value()?)?,
            'L' => cfg.print_args = true,
            'M' => cfg.report_mean = true,
            'N' => cfg.test_name = take_value()?,
            'P' => cfg.processes = parse_sizetoint(&take_value()?)? as u32,
            'R' => cfg.raw_stats = true,
            'S' => cfg.print_stats = true,
            'T' => cfg.threads = parse_sizetoint(&take_value()?)? as u32,
            'V' => {
                println!(env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            'W' => {
                cfg.warn = true;
                cfg.print_stats = true;
            }
            '?' => {
                println!(
                    "usage: [-1A] [-B size] [-C n] [-D ms] [-E] [-G n] [-H] [-I ns] [-L] [-M] \
                     [-N name] [-P n] [-R] [-S] [-T n] [-V] [-W]"
                );
                std::process::exit(0);
            }
            other => {
                // Kernel-defined flags aren't in `RESERVED`, so the harness
                // has no optstring telling it whether one takes a value.
                // Consume the next token as the value unless it looks like
                // another flag, matching how libMicro's kernel modules
                // conventionally pair a single letter with one argument.
                let value = if !attached.is_empty() {
                    Some(attached.to_string())
                } else if let Some(next) = args.get(i + 1) {
                    if next.starts_with('-') {
                        None
                    } else {
                        i += 1;
                        Some(next.clone())
                    }
                } else {
                    None
                };
                kernel.opt_switch(other, value.as_deref())?;
            }
        }

        i += 1;
    }

    cfg.finish()
}
