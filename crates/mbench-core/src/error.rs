//! Harness-level failures. These are the conditions libMicro treats as fatal
//! setup/config errors rather than per-batch anomalies — a malformed option,
//! a failed `fork`/`mmap`/`pthread_*` call, or a numeric overflow while
//! sizing a run. Per-batch anomalies (quantization suspects, low repeat
//! counts, kernel-reported errors) are warnings, not `Result::Err` — see
//! [`crate::report::warnings`].

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("bad configuration: {0}")]
    Config(String),

    #[error("{call} failed: {source}")]
    Os {
        call: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("numeric error: {0}")]
    Numeric(&'static str),
}

impl From<std::io::Error> for HarnessError {
    fn from(source: std::io::Error) -> Self {
        HarnessError::Os { call: "io", source }
    }
}
