//! Timing report for plain runs and benchmark runs.

use std::io::{self, Write};

use crate::emulator::ExecutionResult;

/// Total run time targeted by the iteration-count suggestion.
const TARGET_NS: u64 = 10_000_000_000;

/// Prints the timing summary for a finished run: total time, and for
/// benchmark runs the per-iteration average plus an iteration-count
/// suggestion when the total was too short to be trustworthy.
pub fn report<W: Write>(result: &ExecutionResult, out: &mut W) -> io::Result<()> {
    if result.fell_through {
        writeln!(
            out,
            "Note: no terminating instruction found. Perhaps you forgot the `SVC SP, =HALT`?"
        )?;
    }

    let total_ns = result.elapsed.as_nanos() as u64;
    let (total, unit) = scaled(total_ns);
    writeln!(out, "Execution finished in {:.4}{}.", total, unit)?;

    if result.iterations > 1 {
        let avg_ns = total_ns / result.iterations;
        let (avg, unit) = scaled(avg_ns);
        writeln!(
            out,
            "Benchmark average over {} iterations: {:.2}{}",
            result.iterations, avg, unit
        )?;
        writeln!(out)?;

        if total_ns < 1_000_000_000 {
            writeln!(
                out,
                "Warning: Low execution time might result in inaccurate benchmark results."
            )?;
            writeln!(out, "Try increasing the iteration count with --bench-iterations.")?;
            writeln!(
                out,
                "Suggestion: --bench-iterations={}",
                suggest_iterations(avg_ns)
            )?;
        }
    }

    Ok(())
}

/// Picks the largest unit that keeps the number above 0.5.
fn scaled(ns: u64) -> (f64, &'static str) {
    if ns > 500_000_000 {
        (ns as f64 / 1_000_000_000.0, "s")
    } else if ns > 500_000 {
        (ns as f64 / 1_000_000.0, "ms")
    } else if ns > 500 {
        (ns as f64 / 1_000.0, "us")
    } else {
        (ns as f64, "ns")
    }
}

/// Iteration count that would take roughly [`TARGET_NS`] at the measured
/// average. Counts above 100 are snapped to a round number (a quarter of a
/// power of ten) so the suggestion does not look oddly specific.
fn suggest_iterations(avg_ns: u64) -> u64 {
    let suggested = TARGET_NS / avg_ns.max(1);

    if suggested <= 100 {
        return suggested.max(1);
    }

    let precision = 10f64.powf((suggested as f64).log10().round());
    ((4.0 * suggested as f64 / precision).round() / 4.0 * precision) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn render(result: &ExecutionResult) -> String {
        let mut out = Vec::new();
        report(result, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn unit_scaling_thresholds() {
        assert_eq!(scaled(400), (400.0, "ns"));
        assert_eq!(scaled(400_000), (400.0, "us"));
        assert_eq!(scaled(400_000_000), (400.0, "ms"));
        assert_eq!(scaled(2_000_000_000), (2.0, "s"));
    }

    #[test]
    fn suggestions_are_round_numbers() {
        // ~10s worth of 1us iterations.
        assert_eq!(suggest_iterations(1_000), 10_000_000);
        // 3us average: 3.33M raw, snapped to a quarter of a power of ten.
        assert_eq!(suggest_iterations(3_000), 2_500_000);
        // Small counts are passed through untouched.
        assert_eq!(suggest_iterations(200_000_000), 50);
        // Even an implausible zero average cannot divide by zero.
        assert!(suggest_iterations(0) > 0);
    }

    #[test]
    fn single_runs_report_only_the_total() {
        let output = render(&ExecutionResult {
            elapsed: Duration::from_millis(12),
            iterations: 1,
            fell_through: false,
        });

        assert!(output.starts_with("Execution finished in 12.0000ms."));
        assert!(!output.contains("Benchmark average"));
    }

    #[test]
    fn short_benchmarks_get_a_suggestion() {
        let output = render(&ExecutionResult {
            elapsed: Duration::from_millis(100),
            iterations: 1000,
            fell_through: false,
        });

        assert!(output.contains("Benchmark average over 1000 iterations: 100.00us"));
        assert!(output.contains("Suggestion: --bench-iterations=100000"));
    }

    #[test]
    fn fall_through_earns_the_nag() {
        let output = render(&ExecutionResult {
            elapsed: Duration::from_secs(2),
            iterations: 1,
            fell_through: true,
        });

        assert!(output.contains("no terminating instruction"));
        assert!(output.contains("Execution finished in 2.0000s."));
    }
}
