//! The embedder callback interface. A `Kernel` is what libMicro called a
//! "benchmark module": the thing that knows how to run one unit of work and
//! nothing about processes, threads, barriers, or statistics. The harness
//! drives every method here in a fixed order (see [`crate::driver::run`]);
//! the kernel only ever sees its own opaque per-thread scratch space.

use crate::config::RunConfig;
use crate::error::HarnessError;

/// Opaque per-(process,thread) scratch space. The harness reserves
/// [`Kernel::tsd_size`] bytes per worker thread in a shared arena and hands
/// back a pointer to the kernel's own slice on every per-thread call; the
/// kernel is free to cast it to whatever `#[repr(C)]` state it needs. The
/// harness never reads or writes through it itself.
pub type Tsd = *mut u8;

/// What a single call to [`Kernel::run`] accomplished: how many logical
/// operations it performed (for the per-op timing average) and how many of
/// them failed.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOutcome {
    pub count: u64,
    pub errors: u64,
}

/// The ten (plus `opt_switch`) lifecycle hooks a benchmark module
/// implements. Default bodies are no-ops except where the original C
/// required an explicit implementation (`run`, and the two `Result`-typed
/// setup hooks already defaulting to success costs nothing).
///
/// Per-thread methods (`init_worker`, `init_batch`, `run`, `fini_batch`,
/// `fini_worker`) take `&self`, not `&mut self`: they run concurrently
/// across every worker thread in a process, and any mutable state they need
/// belongs in `Tsd`, not in the kernel object itself. This mirrors libMicro
/// benchmark modules, which keep per-thread counters in `tsd` precisely so
/// concurrent callers never contend on it.
pub trait Kernel: Send + Sync {
    /// Bytes of `Tsd` scratch space to reserve per worker thread.
    fn tsd_size(&self) -> usize {
        0
    }

    /// One-time setup before argument parsing. Analogous to
    /// `benchmark_init`.
    fn init(&mut self) -> Result<(), HarnessError> {
        Ok(())
    }

    /// Handles a command-line flag the harness's own parser didn't
    /// recognize. `arg` is the flag's argument, if the flag consumes one.
    /// Returning `Err` aborts the run with a usage error.
    fn opt_switch(&mut self, opt: char, arg: Option<&str>) -> Result<(), HarnessError> {
        let _ = arg;
        Err(HarnessError::Config(format!("unrecognized option -{opt}")))
    }

    /// One-time setup after argument parsing, before any worker is
    /// spawned. Analogous to `benchmark_initrun`. `cfg` is the fully
    /// resolved configuration (batch size already auto-sized), since a
    /// kernel's `run` typically needs to know how many operations to
    /// perform per batch.
    fn init_run(&mut self, cfg: &RunConfig) -> Result<(), HarnessError> {
        let _ = cfg;
        Ok(())
    }

    /// Runs once per worker thread before its first batch. Returns the
    /// number of setup errors to fold into the run's error count.
    fn init_worker(&self, tsd: Tsd) -> u64 {
        let _ = tsd;
        0
    }

    /// Runs once per batch before [`Kernel::run`]. Returns the number of
    /// setup errors to fold into the run's error count.
    fn init_batch(&self, tsd: Tsd) -> u64 {
        let _ = tsd;
        0
    }

    /// Performs one timed batch of work. The harness brackets this call
    /// with its own timestamps; only `count` and `errors` are the kernel's
    /// responsibility.
    fn run(&self, tsd: Tsd) -> BatchOutcome;

    /// Runs once per batch after [`Kernel::run`], outside the timed
    /// window. Returns the number of teardown errors.
    fn fini_batch(&self, tsd: Tsd) -> u64 {
        let _ = tsd;
        0
    }

    /// Runs once per worker thread after its last batch.
    fn fini_worker(&self, tsd: Tsd) {
        let _ = tsd;
    }

    /// An optional free-form suffix appended to the report's data line
    /// (e.g. a kernel-specific result summary). Empty by default.
    fn result(&self) -> String {
        String::new()
    }

    /// One-time teardown after every worker has finished, before the
    /// report is printed. Analogous to `benchmark_finirun`.
    fn fini_run(&mut self) -> Result<(), HarnessError> {
        Ok(())
    }

    /// Final one-time teardown after the report has been printed.
    fn fini(&mut self) {}
}
