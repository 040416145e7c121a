//! Runtime for executing assembled [programs](crate::asm::Program).
//!
//! The machine state is a single contiguous array of 32-bit words. With
//! `mem` denoting the start of the user address space, register `R<i>`
//! lives at `mem[-i]` and user data at `mem[+k]`:
//!
//! ```text
//! [ZR] [R7] [R6] [R5] [R4] [R3] [R2] [R1] [R0] [data ...] [guard] [stack ...] [guard]
//!                                          ^ address 0
//! ```
//!
//! `R0`'s slot doubles as user address 0, which is why the data section
//! starts at address 1 and why the assembler reroutes `R0` src reads to the
//! zero register below the register file. The stack grows upward behind a
//! small guard band at both ends, so the hot loop only needs one bound
//! check per stack operation.

use std::io::{self, BufRead};
use std::time::{Duration, Instant};

use slog::{debug, info, o, Discard, Logger};
use thiserror::Error;

use crate::asm::Program;
use crate::diagnostics::Reporter;
use crate::instruction::{
    decode_dst, decode_mode, decode_opcode, decode_src, decode_value, AddressMode, OpCode, Register,
};
use crate::options::Options;

/// Size of the register file above the zero register; also the offset of
/// user address 0 in the memory image.
pub const NUM_REGISTERS: usize = 8;

/// Words kept free at both ends of the stack region. `CALL` and `PUSHR`
/// write at most 6 words past their single bound check, so 8 is enough.
const STACK_GUARD: i64 = 8;

/// Input device numbers accepted by `IN`. Only the keyboard is wired up;
/// the rest are reserved.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InDevice {
    Kbd = 0,
    FloatKbd = 1,
    CharKbd = 2,
}

/// Output device numbers accepted by `OUT`. Only the terminal is wired up;
/// the rest are reserved.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OutDevice {
    Crt = 0,
    FloatCrt = 1,
    CharCrt = 2,
}

/// Interface to the input and output devices.
pub trait InputOutput {
    /// Called when an `IN` instruction is executed.
    fn input(&mut self, device: u16) -> i32;

    /// Called when an `OUT` instruction is executed.
    fn output(&mut self, device: u16, data: i32);
}

/// Console I/O: `IN` parses a signed decimal integer from standard input,
/// `OUT` prints one to standard output.
pub struct StdIo;

impl InputOutput for StdIo {
    fn input(&mut self, _device: u16) -> i32 {
        let stdin = io::stdin();
        let mut line = String::new();

        loop {
            line.clear();

            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => return 0,
                Ok(_) => match line.trim().parse() {
                    Ok(value) => return value,
                    Err(_) => println!("expected an integer, try again:"),
                },
            }
        }
    }

    fn output(&mut self, _device: u16, data: i32) {
        println!("{}", data);
    }
}

/// An I/O handler for testing purposes.
///
/// Reads input values from a pre-determined input buffer and appends
/// printed values to an output buffer.
pub struct TestIo {
    input_buffer: Vec<i32>,
    output_buffer: Vec<i32>,
}

impl TestIo {
    pub fn new() -> TestIo {
        TestIo {
            input_buffer: Vec::new(),
            output_buffer: Vec::new(),
        }
    }

    pub fn with_input<I: IntoIterator<Item = i32>>(input: I) -> TestIo {
        TestIo {
            input_buffer: input.into_iter().collect(),
            output_buffer: Vec::new(),
        }
    }

    pub fn output(&self) -> &[i32] {
        &self.output_buffer[..]
    }

    pub fn into_output(self) -> Vec<i32> {
        self.output_buffer
    }
}

impl Default for TestIo {
    fn default() -> TestIo {
        TestIo::new()
    }
}

impl InputOutput for TestIo {
    fn input(&mut self, _device: u16) -> i32 {
        if self.input_buffer.is_empty() {
            return 0;
        }
        self.input_buffer.remove(0)
    }

    fn output(&mut self, _device: u16, data: i32) {
        self.output_buffer.push(data);
    }
}

impl InputOutput for &mut TestIo {
    fn input(&mut self, device: u16) -> i32 {
        (**self).input(device)
    }

    fn output(&mut self, device: u16, data: i32) {
        InputOutput::output(&mut **self, device, data);
    }
}

/// A fault that terminated the run. Carries the index of the faulting
/// instruction so the diagnostic can cite the source line.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("division by zero")]
    DivisionByZero { pc: usize },

    #[error(
        "out of bounds memory access: {mode} mode computed address {address} \
         (offset {offset} + register value {base}), valid addresses are 0..={high}"
    )]
    OutOfBounds {
        pc: usize,
        mode: AddressMode,
        base: i32,
        offset: i16,
        address: i32,
        high: u32,
    },

    #[error("stack overflow")]
    StackOverflow { pc: usize },

    #[error("stack underflow")]
    StackUnderflow { pc: usize },

    #[error("invalid jump target {target}")]
    InvalidJumpTarget { pc: usize, target: i32 },

    #[error("illegal instruction (opcode {opcode})")]
    IllegalInstruction { pc: usize, opcode: u32 },
}

impl ExecutionError {
    /// Index of the instruction that faulted.
    pub fn instruction_index(&self) -> usize {
        match self {
            ExecutionError::DivisionByZero { pc }
            | ExecutionError::OutOfBounds { pc, .. }
            | ExecutionError::StackOverflow { pc }
            | ExecutionError::StackUnderflow { pc }
            | ExecutionError::InvalidJumpTarget { pc, .. }
            | ExecutionError::IllegalInstruction { pc, .. } => *pc,
        }
    }
}

/// Timing and outcome of a completed run.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub elapsed: Duration,
    pub iterations: u64,

    /// The final iteration ended on the safety-net HALT the assembler
    /// appends, meaning the program has no terminating instruction itself.
    pub fell_through: bool,
}

/// The execution environment: the memory image, the instruction stream and
/// the I/O devices.
pub struct Runtime<'p, IO> {
    program: &'p Program,
    code: Vec<u32>,
    memory: Vec<i32>,

    /// First usable stack address.
    stack_low: i32,
    /// Last stack address before the overflow check trips.
    stack_high: i32,
    /// Highest valid user address, guard bands included.
    memory_high: u32,

    comp_flag: i64,
    io: IO,
    log: Logger,
}

impl<'p, IO: InputOutput> Runtime<'p, IO> {
    /// Builds the memory image for `program`: registers, the data section
    /// initialized from the `DC` constants, and the stack.
    pub fn new(program: &'p Program, options: &Options, io: IO) -> Runtime<'p, IO> {
        Runtime::with_logger(program, options, io, Logger::root(Discard, o!()))
    }

    pub fn with_logger(
        program: &'p Program,
        options: &Options,
        io: IO,
        log: Logger,
    ) -> Runtime<'p, IO> {
        let data = program.data_section_bytes as i64;
        let stack = (options.stack_size as i64).max(2 * STACK_GUARD);

        let high = (data + 2 * STACK_GUARD + stack - 1).min(i32::MAX as i64 - 2) as i32;
        let stack_low = (data + STACK_GUARD).min(high as i64) as i32;
        let stack_high = high - STACK_GUARD as i32;

        let mut memory = vec![0i32; NUM_REGISTERS + 1 + high as usize];

        for constant in &program.constants {
            memory[NUM_REGISTERS + constant.address as usize] = constant.value;
        }

        Runtime {
            program,
            code: program.instructions.clone(),
            memory,
            stack_low,
            stack_high,
            memory_high: high as u32,
            comp_flag: 0,
            io,
            log,
        }
    }

    /// Value of a register.
    pub fn register(&self, reg: Register) -> i32 {
        self.memory[NUM_REGISTERS - reg.index() as usize]
    }

    /// Word at a user address, if the address is valid.
    pub fn memory_word(&self, address: i32) -> Option<i32> {
        if address as u32 > self.memory_high {
            return None;
        }

        Some(self.memory[(NUM_REGISTERS as i32 + address) as usize])
    }

    /// Runs the program `options.benchmark_iterations` times, resetting the
    /// registers, SP/FP and the comparison flag between iterations while
    /// the data image persists. On a fault, prints a diagnostic citing the
    /// source line of the faulting instruction and aborts the whole run.
    pub fn execute(&mut self, options: &Options) -> Result<ExecutionResult, ExecutionError> {
        let iterations = options.benchmark_iterations.max(1);
        let quiet = iterations > 1 && !options.bench_io;

        info!(self.log, "starting execution"; "iterations" => iterations);

        let mut fell_through = false;
        let started = Instant::now();

        for _ in 0..iterations {
            self.reset_registers();

            match self.run_once(quiet) {
                Ok(halted_at) => {
                    fell_through = halted_at + 1 == self.code.len();
                }
                Err(err) => {
                    self.report_fault(&err);
                    return Err(err);
                }
            }
        }

        let elapsed = started.elapsed();

        debug!(self.log, "execution finished";
               "elapsed_ns" => elapsed.as_nanos() as u64,
               "fell_through" => fell_through);

        Ok(ExecutionResult {
            elapsed,
            iterations,
            fell_through,
        })
    }

    fn reset_registers(&mut self) {
        for slot in 0..=NUM_REGISTERS {
            self.memory[slot] = 0;
        }

        let sp = self.stack_low - 1;
        self.memory[NUM_REGISTERS - 6] = sp;
        self.memory[NUM_REGISTERS - 7] = sp;
        self.comp_flag = 0;
    }

    /// One fetch-decode-execute pass from instruction 0 to a HALT.
    /// Returns the index of the halting instruction.
    fn run_once(&mut self, quiet: bool) -> Result<usize, ExecutionError> {
        let stack_low = self.stack_low;
        let stack_high = self.stack_high;
        let high = self.memory_high;
        let sp_base = stack_low - 1;

        let Runtime {
            code,
            memory,
            comp_flag,
            io,
            ..
        } = self;
        let code = &code[..];

        let mut pc: usize = 0;

        // Register i lives at memory[NUM_REGISTERS - i]; user address a at
        // memory[NUM_REGISTERS + a].
        macro_rules! reg {
            ($i:expr) => {
                memory[NUM_REGISTERS - $i]
            };
        }

        macro_rules! slot {
            ($addr:expr) => {
                (NUM_REGISTERS as i32 + $addr) as usize
            };
        }

        loop {
            let at = pc;
            let word = code[pc];
            pc += 1;

            let opcode = decode_opcode(word);
            let op = match OpCode::from_bits(opcode) {
                Some(op) => op,
                None => return Err(ExecutionError::IllegalInstruction { pc: at, opcode }),
            };

            let dst = decode_dst(word) as usize;
            let src = decode_src(word) as usize;

            if src > NUM_REGISTERS {
                return Err(ExecutionError::IllegalInstruction { pc: at, opcode });
            }

            macro_rules! load {
                ($addr:expr, $mode:expr, $base:expr, $offset:expr) => {{
                    let addr: i32 = $addr;
                    if addr as u32 > high {
                        return Err(ExecutionError::OutOfBounds {
                            pc: at,
                            mode: $mode,
                            base: $base,
                            offset: $offset,
                            address: addr,
                            high,
                        });
                    }
                    memory[slot!(addr)]
                }};
            }

            macro_rules! jump {
                ($target:expr) => {{
                    let target: i32 = $target;
                    if target as u32 as usize >= code.len() {
                        return Err(ExecutionError::InvalidJumpTarget { pc: at, target });
                    }
                    pc = target as usize;
                }};
            }

            // Resolve the second operand.
            let offset = decode_value(word);
            let mut value = offset as i32;

            match decode_mode(word) {
                0 => {}
                1 => value = value.wrapping_add(reg!(src)),
                2 => {
                    let base = reg!(src);
                    value = load!(value.wrapping_add(base), AddressMode::Direct, base, offset);
                }
                _ => {
                    let base = reg!(src);
                    let first = load!(value.wrapping_add(base), AddressMode::Indirect, base, offset);
                    value = load!(first, AddressMode::Indirect, first, 0);
                }
            }

            match op {
                OpCode::Load => reg!(dst) = value,

                OpCode::Store => {
                    // The assembler rewrote the mode so that `value` holds
                    // the target address.
                    if value as u32 > high {
                        return Err(ExecutionError::OutOfBounds {
                            pc: at,
                            mode: AddressMode::from_bits(decode_mode(word)),
                            base: reg!(src),
                            offset,
                            address: value,
                            high,
                        });
                    }
                    memory[slot!(value)] = reg!(dst);
                }

                OpCode::In => {
                    let input = io.input(value as u16);
                    reg!(dst) = input;
                }

                OpCode::Out => {
                    if !quiet {
                        io.output(value as u16, reg!(dst));
                    }
                }

                OpCode::Add => reg!(dst) = reg!(dst).wrapping_add(value),
                OpCode::Subtract => reg!(dst) = reg!(dst).wrapping_sub(value),
                OpCode::Multiply => reg!(dst) = reg!(dst).wrapping_mul(value),

                OpCode::Divide => {
                    if value == 0 {
                        return Err(ExecutionError::DivisionByZero { pc: at });
                    }
                    reg!(dst) = reg!(dst).wrapping_div(value);
                }

                OpCode::Modulo => {
                    if value == 0 {
                        return Err(ExecutionError::DivisionByZero { pc: at });
                    }
                    reg!(dst) = reg!(dst).wrapping_rem(value);
                }

                OpCode::And => reg!(dst) &= value,
                OpCode::Or => reg!(dst) |= value,
                OpCode::Xor => reg!(dst) ^= value,

                OpCode::ShiftLeft => reg!(dst) = reg!(dst).wrapping_shl(value as u32),
                OpCode::ShiftRight => {
                    reg!(dst) = (reg!(dst) as u32).wrapping_shr(value as u32) as i32;
                }
                OpCode::ArithmeticShiftRight => {
                    reg!(dst) = reg!(dst).wrapping_shr(value as u32);
                }

                OpCode::Not => reg!(dst) = !reg!(dst),

                OpCode::Compare => *comp_flag = i64::from(reg!(dst)) - i64::from(value),

                OpCode::Jump => jump!(value),

                OpCode::JumpNegative => {
                    if reg!(dst) < 0 {
                        jump!(value)
                    }
                }
                OpCode::JumpZero => {
                    if reg!(dst) == 0 {
                        jump!(value)
                    }
                }
                OpCode::JumpPositive => {
                    if reg!(dst) > 0 {
                        jump!(value)
                    }
                }
                OpCode::JumpNotNegative => {
                    if reg!(dst) >= 0 {
                        jump!(value)
                    }
                }
                OpCode::JumpNotZero => {
                    if reg!(dst) != 0 {
                        jump!(value)
                    }
                }
                OpCode::JumpNotPositive => {
                    if reg!(dst) <= 0 {
                        jump!(value)
                    }
                }

                OpCode::JumpLess => {
                    if *comp_flag < 0 {
                        jump!(value)
                    }
                }
                OpCode::JumpEqual => {
                    if *comp_flag == 0 {
                        jump!(value)
                    }
                }
                OpCode::JumpGreater => {
                    if *comp_flag > 0 {
                        jump!(value)
                    }
                }
                OpCode::JumpNotLess => {
                    if *comp_flag >= 0 {
                        jump!(value)
                    }
                }
                OpCode::JumpNotEqual => {
                    if *comp_flag != 0 {
                        jump!(value)
                    }
                }
                OpCode::JumpNotGreater => {
                    if *comp_flag <= 0 {
                        jump!(value)
                    }
                }

                OpCode::Call => {
                    let mut sp = reg!(6);

                    if sp.wrapping_sub(sp_base) as u32 >= (stack_high - sp_base) as u32 {
                        return Err(ExecutionError::StackOverflow { pc: at });
                    }

                    if value as u32 as usize >= code.len() {
                        return Err(ExecutionError::InvalidJumpTarget { pc: at, target: value });
                    }

                    sp += 1;
                    memory[slot!(sp)] = pc as i32;
                    sp += 1;
                    memory[slot!(sp)] = reg!(7);

                    reg!(6) = sp;
                    reg!(7) = sp;
                    pc = value as usize;
                }

                OpCode::Exit => {
                    let mut sp = reg!(6);

                    // Both the saved FP and the return address must be on
                    // the stack.
                    if sp.wrapping_sub(stack_low + 1) as u32 > (stack_high - (stack_low + 1)) as u32
                    {
                        return Err(ExecutionError::StackUnderflow { pc: at });
                    }

                    let fp = memory[slot!(sp)];
                    sp -= 1;
                    let ret = memory[slot!(sp)];
                    sp -= 1;

                    sp = sp.wrapping_sub(value);
                    if sp < sp_base {
                        return Err(ExecutionError::StackUnderflow { pc: at });
                    }

                    reg!(7) = fp;
                    reg!(6) = sp;
                    jump!(ret);
                }

                OpCode::Push => {
                    let sp = reg!(dst).wrapping_add(1);

                    if sp.wrapping_sub(stack_low) as u32 > (stack_high - stack_low) as u32 {
                        return Err(ExecutionError::StackOverflow { pc: at });
                    }

                    memory[slot!(sp)] = value;
                    reg!(dst) = sp;
                }

                OpCode::Pop => {
                    let sp = reg!(dst);

                    if sp.wrapping_sub(stack_low) as u32 > (stack_high - stack_low) as u32 {
                        return Err(ExecutionError::StackUnderflow { pc: at });
                    }

                    let popped = memory[slot!(sp)];
                    reg!(dst) = sp - 1;
                    reg!(src) = popped;
                }

                OpCode::PushRegisters => {
                    let mut sp = reg!(6);

                    if sp.wrapping_sub(sp_base) as u32 >= (stack_high - sp_base) as u32 {
                        return Err(ExecutionError::StackOverflow { pc: at });
                    }

                    for i in 0..6 {
                        sp += 1;
                        memory[slot!(sp)] = reg!(i);
                    }
                    reg!(6) = sp;
                }

                OpCode::PopRegisters => {
                    let mut sp = reg!(6);

                    if sp.wrapping_sub(stack_low + 5) as u32 > (high as i32 - (stack_low + 5)) as u32
                    {
                        return Err(ExecutionError::StackUnderflow { pc: at });
                    }

                    for i in (0..6).rev() {
                        reg!(i) = memory[slot!(sp)];
                        sp -= 1;
                    }
                    reg!(6) = sp;
                }

                // Reserved in this core.
                OpCode::SupervisorCall | OpCode::InterruptReturn | OpCode::NoOperation => {}

                OpCode::Halt => return Ok(at),

                OpCode::FloatAdd
                | OpCode::FloatSubtract
                | OpCode::FloatMultiply
                | OpCode::FloatDivide
                | OpCode::FloatModulo
                | OpCode::IntToFloat
                | OpCode::FloatToInt => {
                    return Err(ExecutionError::IllegalInstruction { pc: at, opcode })
                }
            }
        }
    }

    /// The common exit for all faults: cite the source line of the faulting
    /// instruction.
    fn report_fault(&self, err: &ExecutionError) {
        slog::warn!(self.log, "execution fault"; "error" => %err);

        let index = err.instruction_index();

        match self.program.source_line(index) {
            Some((number, line)) => {
                let mut reporter = Reporter::new(&self.program.filename, io::stdout());
                reporter.error(number, line, None, &err.to_string());
            }
            None => println!("error: {}", err),
        }
    }
}
