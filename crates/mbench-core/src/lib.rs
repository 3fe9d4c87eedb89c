//! A libMicro-style microbenchmark harness: a multi-process/multi-thread
//! worker engine synchronized on a shared-memory phase barrier, with
//! auto-sized batching and a statistics/histogram/warnings reporting
//! pipeline on top. Embedders implement [`kernel::Kernel`] and hand it to
//! [`driver::run`]; the harness owns everything else.

pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod kernel;
pub mod report;

pub use config::RunConfig;
pub use error::HarnessError;
pub use kernel::{BatchOutcome, Kernel, Tsd};
