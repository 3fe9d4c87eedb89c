//! Benchmarks a fixed-duration sleep per operation. `-u <usecs>` sets the
//! sleep length (default 1000us = 1ms); every batch sleeps once per `-B`
//! count, so batch size effectively multiplies the per-batch wall time.

use mbench_core::kernel::{BatchOutcome, Tsd};
use mbench_core::{HarnessError, Kernel, RunConfig};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

struct SleepKernel {
    batch_size: AtomicU32,
    sleep_us: AtomicU64,
}

impl Kernel for SleepKernel {
    fn opt_switch(&mut self, opt: char, arg: Option<&str>) -> Result<(), HarnessError> {
        match opt {
            'u' => {
                let us: u64 = arg
                    .ok_or_else(|| HarnessError::Config("-u requires a microsecond count".into()))?
                    .parse()
                    .map_err(|_| HarnessError::Config("-u expects an integer".into()))?;
                self.sleep_us.store(us, Ordering::Relaxed);
                Ok(())
            }
            other => Err(HarnessError::Config(format!("unrecognized option -{other}"))),
        }
    }

    fn init_run(&mut self, cfg: &RunConfig) -> Result<(), HarnessError> {
        self.batch_size.store(cfg.batch_size, Ordering::Relaxed);
        Ok(())
    }

    fn run(&self, _tsd: Tsd) -> BatchOutcome {
        let n = self.batch_size.load(Ordering::Relaxed);
        let us = self.sleep_us.load(Ordering::Relaxed);
        for _ in 0..n {
            std::thread::sleep(Duration::from_micros(us));
        }
        BatchOutcome { count: n as u64, errors: 0 }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("WARN")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut kernel = SleepKernel {
        batch_size: AtomicU32::new(1),
        sleep_us: AtomicU64::new(1000),
    };

    let code = mbench_core::driver::run(&mut kernel, &args)?;
    std::process::exit(code);
}
