use ttkvm::{
    asm,
    emulator::{Runtime, TestIo},
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

fn run(source: &str) -> Vec<i32> {
    run_with_input(source, Vec::new())
}

fn run_with_input(source: &str, input: Vec<i32>) -> Vec<i32> {
    let program = compile(source);
    let options = Options {
        stack_size: 256,
        ..Options::default()
    };

    let mut io = TestIo::with_input(input);
    let mut runtime = Runtime::new(&program, &options, &mut io);

    runtime
        .execute(&options)
        .expect("an error occurred while running the program");

    io.into_output()
}

#[test]
fn load_a_constant_and_print_it() {
    let output = run(
        "x       DC      5\n\
         \tLOAD\tR1, x\n\
         \tOUT\tR1, =CRT\n\
         \tSVC\tSP, =HALT\n",
    );

    assert_eq!(output, [5]);
}

#[test]
fn add_two_constants() {
    let output = run(
        "a DC 3\n\
         b DC 4\n\
         LOAD R1, a\n\
         ADD R1, b\n\
         OUT R1, =CRT\n\
         SVC SP, =HALT\n",
    );

    assert_eq!(output, [7]);
}

#[test]
fn countdown_loop() {
    let output = run(
        "LOAD R1, =10\n\
         loop LOAD R2, R1\n\
         OUT R2, =CRT\n\
         SUB R1, =1\n\
         JPOS R1, loop\n\
         SVC SP, =HALT\n",
    );

    assert_eq!(output, [10, 9, 8, 7, 6, 5, 4, 3, 2, 1]);
}

#[test]
fn sum_until_zero() {
    // Reads numbers from the keyboard and prints their sum when a zero
    // is entered.
    let source = "\
Luku  DC    0           ; nykyinen luku
Summa DC    0           ; nykyinen summa

Sum   IN    R1, =KBD    ; ohjelma alkaa kaskysta 0
      STORE R1, Luku
      JZER  R1, Done    ; luvut loppu?

      LOAD  R1, Summa   ; Summa <- Summa+Luku
      ADD   R1, Luku
      STORE R1, Summa

      JUMP  Sum

Done  LOAD  R1, Summa   ; tulosta summa ja lopeta
      OUT   R1, =CRT

      SVC   SP, =HALT
";

    assert_eq!(run_with_input(source, vec![1, 2, 3, 4, 0]), [1 + 2 + 3 + 4]);
    assert_eq!(run_with_input(source, vec![0]), [0]);
    assert_eq!(
        run_with_input(source, vec![1, 10, 100, 1000, 10000, 0]),
        [11111]
    );
}

#[test]
fn empty_program_halts_without_side_effects() {
    let output = run("; nothing here\n");
    assert_eq!(output, [] as [i32; 0]);
}

#[test]
fn pseudo_only_program_is_a_single_halt() {
    let program = compile("x dc 1\ny ds 4\nz equ 9\n");
    assert_eq!(program.instructions.len(), 1);

    let output = run("x dc 1\ny ds 4\nz equ 9\n");
    assert_eq!(output, [] as [i32; 0]);
}

#[test]
fn indirect_addressing_follows_pointers() {
    let output = run(
        "value  DC 17\n\
         ptr    DC 1\n\
         LOAD R1, @ptr\n\
         OUT R1, =CRT\n\
         SVC SP, =HALT\n",
    );

    // ptr holds the address of value.
    assert_eq!(output, [17]);
}

#[test]
fn modulo_and_division() {
    let output = run(
        "LOAD R1, =17\n\
         LOAD R2, R1\n\
         DIV R1, =5\n\
         MOD R2, =5\n\
         OUT R1, =CRT\n\
         OUT R2, =CRT\n\
         SVC SP, =HALT\n",
    );

    assert_eq!(output, [3, 2]);
}

#[test]
fn comparison_jumps_are_exhaustive() {
    // For each comparison outcome exactly the documented jumps take the
    // branch: prints a bitmask of taken jumps per COMP.
    let source = "\
        LOAD R2, =0\n\
        COMP R1, =1\n\
        JLES t1\n\
        back1 COMP R1, =0\n\
        JEQU t2\n\
        back2 COMP R1, =-1\n\
        JGRE t3\n\
        back3 COMP R1, =0\n\
        JNLES t4\n\
        back4 COMP R1, =1\n\
        JNEQU t5\n\
        back5 COMP R1, =0\n\
        JNGRE t6\n\
        back6 OUT R2, =CRT\n\
        SVC SP, =HALT\n\
        t1 ADD R2, =1\n\
        JUMP back1\n\
        t2 ADD R2, =2\n\
        JUMP back2\n\
        t3 ADD R2, =4\n\
        JUMP back3\n\
        t4 ADD R2, =8\n\
        JUMP back4\n\
        t5 ADD R2, =16\n\
        JUMP back5\n\
        t6 ADD R2, =32\n\
        JUMP back6\n";

    // R1 = 0: 0<1 less, 0==0 equal, 0>-1 greater, not-less fails for =0?
    // COMP 0,0 -> equal, so JNLES (not less) jumps; COMP 0,1 -> less, so
    // JNEQU (not equal) jumps; COMP 0,0 -> equal, JNGRE (not greater)
    // jumps. All six taken: 1+2+4+8+16+32.
    assert_eq!(run(source), [63]);
}

#[test]
fn register_mode_with_offset() {
    let output = run(
        "LOAD R2, =100\n\
         LOAD R1, =5(R2)\n\
         OUT R1, =CRT\n\
         SVC SP, =HALT\n",
    );

    // =5(R2) computes R2 + 5 without touching memory.
    assert_eq!(output, [105]);
}

#[test]
fn equ_values_are_plain_numbers() {
    let output = run(
        "width equ 40\n\
         LOAD R1, =width\n\
         MUL R1, =2\n\
         OUT R1, =CRT\n\
         SVC SP, =HALT\n",
    );

    assert_eq!(output, [80]);
}
