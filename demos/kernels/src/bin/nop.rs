//! The simplest possible benchmark kernel: each batch does nothing but
//! `std::hint::black_box` the loop counter `-B` times. Useful as a
//! worst-case floor — whatever nsecs/call this reports is pure harness
//! overhead (fork/thread/barrier/timing), not work being measured.

use mbench_core::{BatchOutcome, HarnessError, Kernel, RunConfig, Tsd};
use std::sync::atomic::{AtomicU32, Ordering};

struct NopKernel {
    batch_size: AtomicU32,
}

impl Kernel for NopKernel {
    fn init_run(&mut self, cfg: &RunConfig) -> Result<(), HarnessError> {
        self.batch_size.store(cfg.batch_size, Ordering::Relaxed);
        Ok(())
    }

    fn run(&self, _tsd: Tsd) -> BatchOutcome {
        let n = self.batch_size.load(Ordering::Relaxed);
        for i in 0..n {
            std::hint::black_box(i);
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
    let mut kernel = NopKernel { batch_size: AtomicU32::new(1) };

    let code = mbench_core::driver::run(&mut kernel, &args)?;
    std::process::exit(code);
}
