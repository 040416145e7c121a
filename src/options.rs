//! Compilation and execution options consumed by the driver, the runtime
//! builder and the benchmark harness.

/// Runtime and benchmark settings for one compile-and-run.
#[derive(Debug, Clone)]
pub struct Options {
    /// How many times the program is executed. Values above 1 enter
    /// benchmark mode: output is suppressed unless [`bench_io`](Self::bench_io)
    /// is set, and a per-iteration average is reported.
    pub benchmark_iterations: u64,

    /// Stack size in words.
    pub stack_size: u64,

    /// Keep printing during a benchmark run.
    pub bench_io: bool,

    /// Assemble only; skip execution.
    pub dry_run: bool,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            benchmark_iterations: 1,
            stack_size: 1 << 20,
            bench_io: false,
            dry_run: false,
        }
    }
}
