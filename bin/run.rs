//! Command-line driver: parse arguments, read the source file, assemble,
//! execute, report timings.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use slog::{o, Drain, Logger};

use ttkvm::{
    asm,
    bench,
    emulator::{Runtime, StdIo},
    options::Options,
};

#[derive(Parser, Debug)]
#[command(
    name = "ttkvm",
    version,
    about = "Assemble and run TTK91 programs"
)]
struct Cli {
    /// The .k91 program file.
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Number of times the program is run for the benchmark.
    #[arg(short = 'i', long = "bench-iterations", default_value_t = 1)]
    bench_iterations: u64,

    /// Keep printing while benchmarking.
    #[arg(long = "bench-io", alias = "bio")]
    bench_io: bool,

    /// Assemble the file without executing it.
    #[arg(short = 'd', long = "dry", alias = "dry-run")]
    dry: bool,

    /// Stack size in words.
    #[arg(long = "stack-size", alias = "ss", default_value_t = 1 << 20)]
    stack_size: u64,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.bench_iterations > 500_000_000 {
        println!("Warning: over 500 million benchmark iterations requested (intentional? ctrl-c to abort)");
        println!();
    }

    let options = Options {
        benchmark_iterations: cli.bench_iterations.max(1),
        stack_size: cli.stack_size,
        bench_io: cli.bench_io,
        dry_run: cli.dry,
    };

    let filename = cli.file.display().to_string();

    let source = match std::fs::read_to_string(&cli.file) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: could not read {}: {}", filename, err);
            return ExitCode::FAILURE;
        }
    };

    let program = match asm::assemble(&filename, &source) {
        Ok(program) => program,
        Err(err) => {
            println!("{}, aborting", err);
            return ExitCode::FAILURE;
        }
    };

    if options.dry_run {
        return ExitCode::SUCCESS;
    }

    // Logs go to stderr; stdout belongs to the program's own output.
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::CompactFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let logger = Logger::root(drain, o!());

    let mut runtime = Runtime::with_logger(&program, &options, StdIo, logger);

    let result = match runtime.execute(&options) {
        Ok(result) => result,
        // The runtime already printed a diagnostic for the faulting line.
        Err(_) => return ExitCode::FAILURE,
    };

    let mut stdout = std::io::stdout();
    if bench::report(&result, &mut stdout).is_err() {
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
