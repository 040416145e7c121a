use ttkvm::{
    asm,
    emulator::{Runtime, TestIo},
    instruction::Register,
    options::Options,
};

fn compile(source: &str) -> ttkvm::Program {
    let mut out = Vec::new();
    match asm::assemble_to("test.k91", source, &mut out) {
        Ok(program) => program,
        Err(err) => panic!(
            "assembly failed: {}\n{}",
            err,
            String::from_utf8_lossy(&out)
        ),
    }
}

fn options() -> Options {
    Options {
        stack_size: 256,
        ..Options::default()
    }
}

#[test]
fn call_and_exit_restore_the_frame() {
    // The procedure takes one argument below the saved PC/FP pair and
    // drops it on EXIT. Afterwards both SP and FP must be back where they
    // were, which the program verifies itself by subtracting.
    let source = "\
        LOAD R1, SP\n\
        LOAD R2, FP\n\
        PUSH SP, =41\n\
        CALL double\n\
        SUB R1, SP\n\
        SUB R2, FP\n\
        OUT R1, =CRT\n\
        OUT R2, =CRT\n\
        OUT R4, =CRT\n\
        SVC SP, =HALT\n\
        double LOAD R4, -2(FP)\n\
        ADD R4, R4\n\
        EXIT SP, =1\n";

    let program = compile(source);
    let mut io = TestIo::new();
    let mut runtime = Runtime::new(&program, &options(), &mut io);

    runtime.execute(&options()).unwrap();
    drop(runtime);

    // SP and FP drift zero, result 82.
    assert_eq!(io.into_output(), vec![0, 0, 82]);
}

#[test]
fn nested_calls_unwind_in_order() {
    let source = "\
        CALL outer\n\
        OUT R5, =CRT\n\
        SVC SP, =HALT\n\
        outer ADD R5, =1\n\
        CALL inner\n\
        ADD R5, =4\n\
        EXIT SP, =0\n\
        inner ADD R5, =2\n\
        EXIT SP, =0\n";

    let program = compile(source);
    let mut io = TestIo::new();
    let mut runtime = Runtime::new(&program, &options(), &mut io);

    runtime.execute(&options()).unwrap();
    drop(runtime);

    assert_eq!(io.into_output(), vec![7]);
}

#[test]
fn pushr_popr_restore_the_work_registers() {
    let source = "\
        LOAD R1, =11\n\
        LOAD R2, =22\n\
        LOAD R3, =33\n\
        LOAD R4, =44\n\
        LOAD R5, =55\n\
        PUSHR SP\n\
        LOAD R1, =0\n\
        LOAD R2, =0\n\
        LOAD R3, =0\n\
        LOAD R4, =0\n\
        LOAD R5, =0\n\
        POPR SP\n\
        SVC SP, =HALT\n";

    let program = compile(source);
    let mut runtime = Runtime::new(&program, &options(), TestIo::new());
    runtime.execute(&options()).unwrap();

    assert_eq!(runtime.register(Register::R1), 11);
    assert_eq!(runtime.register(Register::R2), 22);
    assert_eq!(runtime.register(Register::R3), 33);
    assert_eq!(runtime.register(Register::R4), 44);
    assert_eq!(runtime.register(Register::R5), 55);
    // PUSHR and POPR balance out.
    assert_eq!(
        runtime.register(Register::R6),
        runtime.register(Register::R7)
    );
}

#[test]
fn push_and_pop_move_values_through_the_stack() {
    let source = "\
        PUSH SP, =7\n\
        PUSH SP, =9\n\
        POP SP, R1\n\
        POP SP, R2\n\
        OUT R1, =CRT\n\
        OUT R2, =CRT\n\
        SVC SP, =HALT\n";

    let program = compile(source);
    let mut io = TestIo::new();
    let mut runtime = Runtime::new(&program, &options(), &mut io);

    runtime.execute(&options()).unwrap();
    drop(runtime);

    assert_eq!(io.into_output(), vec![9, 7]);
}

#[test]
fn push_can_copy_from_memory() {
    let source = "\
        x DC 123\n\
        PUSH SP, x\n\
        POP SP, R1\n\
        OUT R1, =CRT\n\
        SVC SP, =HALT\n";

    let program = compile(source);
    let mut io = TestIo::new();
    let mut runtime = Runtime::new(&program, &options(), &mut io);

    runtime.execute(&options()).unwrap();
    drop(runtime);

    assert_eq!(io.into_output(), vec![123]);
}

#[test]
fn deep_recursion_overflows_the_stack() {
    let source = "\
        down CALL down\n";

    let program = compile(source);
    let mut runtime = Runtime::new(&program, &options(), TestIo::new());

    let err = runtime.execute(&options()).unwrap_err();
    assert!(matches!(err, ttkvm::ExecutionError::StackOverflow { .. }));
}

#[test]
fn exit_with_an_empty_stack_underflows() {
    let program = compile("EXIT SP, =0\n");
    let mut runtime = Runtime::new(&program, &options(), TestIo::new());

    let err = runtime.execute(&options()).unwrap_err();
    assert!(matches!(err, ttkvm::ExecutionError::StackUnderflow { .. }));
}
