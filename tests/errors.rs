use ttkvm::{
    asm,
    emulator::{Runtime, TestIo},
    options::Options,
    ExecutionError,
};

fn compile(source: &str) -> ttkvm::Program {
    asm::assemble_to("test.k91", source, Vec::new()).expect("assembly failed")
}

fn small_options() -> Options {
    Options {
        stack_size: 64,
        ..Options::default()
    }
}

fn run_err(source: &str) -> ExecutionError {
    let program = compile(source);
    let mut runtime = Runtime::new(&program, &small_options(), TestIo::new());
    runtime
        .execute(&small_options())
        .expect_err("execution unexpectedly succeeded")
}

#[test]
fn division_by_zero_terminates_the_run() {
    let err = run_err(
        "LOAD R1, =5\n\
         LOAD R2, =0\n\
         DIV R1, R2\n",
    );

    assert_eq!(err, ExecutionError::DivisionByZero { pc: 2 });
    assert_eq!(err.to_string(), "division by zero");
}

#[test]
fn out_of_bounds_access_reports_the_computed_address() {
    let err = run_err(
        "LOAD R1, =1\n\
         LOAD R1, 30000(R0)\n",
    );

    let message = err.to_string();
    assert!(message.contains("out of bounds"));
    assert!(message.contains("Direct mode"));
    assert!(message.contains("30000"));
    assert_eq!(err.instruction_index(), 1);
}

#[test]
fn indirect_out_of_bounds_reports_the_loaded_address() {
    // The pointer itself is in range but holds an address far outside.
    let err = run_err(
        "ptr DC 20000\n\
         LOAD R1, @ptr\n",
    );

    match err {
        ExecutionError::OutOfBounds { address, .. } => assert_eq!(address, 20000),
        other => panic!("expected an out-of-bounds fault, got {:?}", other),
    }
}

#[test]
fn duplicate_symbol_fails_assembly() {
    let mut out = Vec::new();
    let err = asm::assemble_to("test.k91", "foo DC 1\nfoo DC 2\n", &mut out)
        .expect_err("assembly unexpectedly succeeded");

    assert_eq!(err.errors, 1);

    let output = String::from_utf8(out).unwrap();
    assert!(output.contains("symbol 'foo' already exists"));
    assert!(output.contains("test.k91:2:"));
}

#[test]
fn unresolved_label_fails_assembly_after_the_scan() {
    let mut out = Vec::new();
    let err = asm::assemble_to(
        "test.k91",
        "JUMP missing\nLOAD R1, =1\nSVC SP, =HALT\n",
        &mut out,
    )
    .expect_err("assembly unexpectedly succeeded");

    assert_eq!(err.errors, 1);
    assert!(String::from_utf8(out).unwrap().contains("label 'missing' not found"));
}

#[test]
fn diagnostics_echo_the_offending_line() {
    let mut out = Vec::new();
    let _ = asm::assemble_to("prog.k91", "\tLOAD\tR9, =5\n", &mut out);

    let output = String::from_utf8(out).unwrap();
    assert!(output.contains("prog.k91:1:"));
    assert!(output.contains("error: unknown register 'r9'"));
    assert!(output.contains("   1 | \tLOAD\tR9, =5"));
    // The underline row carries the gutter and a tilde under the register.
    assert!(output.contains("     | "));
    assert!(output.contains("~~"));
}

#[test]
fn many_errors_surface_in_one_pass() {
    let mut out = Vec::new();
    let err = asm::assemble_to(
        "test.k91",
        "LOAD R1\n\
         STORE R1, =5\n\
         IN R1, =PRINTER\n\
         JNEG R1, -4\n\
         LOAD R1, =1\n",
        &mut out,
    )
    .expect_err("assembly unexpectedly succeeded");

    assert_eq!(err.errors, 4);
}

#[test]
fn faults_stop_every_remaining_iteration() {
    let program = compile(
        "x DC 0\n\
         LOAD R1, x\n\
         DIV R1, x\n",
    );

    let options = Options {
        benchmark_iterations: 10,
        stack_size: 64,
        ..Options::default()
    };

    let mut runtime = Runtime::new(&program, &options, TestIo::new());
    let err = runtime.execute(&options).unwrap_err();

    assert_eq!(err, ExecutionError::DivisionByZero { pc: 1 });
}
