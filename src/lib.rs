//! An assembler and bytecode interpreter for TTK91, the imaginary
//! instruction architecture used in teaching at the University of Helsinki.
//!
//! The crate turns symbolic `.k91` assembly into a packed 32-bit
//! instruction stream and executes it on an in-process virtual machine
//! with eight work registers, a linear memory, an upward-growing call
//! stack and simple character I/O devices. The assembler is single-pass
//! with a fix-up list for forward jump references and reports errors and
//! warnings with underlined source excerpts; the interpreter detects
//! division by zero, out-of-bounds accesses, stack over- and underflow and
//! bad jump targets, citing the offending source line.
//!
//! # Example
//! ```no_run
//! use ttkvm::{
//!     asm,
//!     emulator::{Runtime, StdIo},
//!     options::Options,
//! };
//!
//! fn main() {
//!     // Simple TTK91 program that adds 13 and 15 together and outputs
//!     // the answer.
//!     let source = r#"
//!         ;; DATA
//!         X       DC      13
//!         Y       DC      15
//!
//!         ;; CODE
//!         MAIN    LOAD    R1, X
//!                 ADD     R1, Y
//!                 OUT     R1, =CRT
//!                 SVC     SP, =HALT
//!     "#;
//!
//!     // Translate the symbolic assembly into packed instruction words.
//!     let program = asm::assemble("add.k91", source)
//!         .expect("assembly failed");
//!
//!     let options = Options::default();
//!
//!     // Build the memory image and execute against the standard output.
//!     let mut runtime = Runtime::new(&program, &options, StdIo);
//!     runtime.execute(&options)
//!         .expect("an error occurred while running the program");
//! }
//! ```

pub mod asm;
pub mod bench;
pub mod diagnostics;
pub mod emulator;
pub mod instruction;
pub mod options;
pub mod symbol_table;

pub use asm::{assemble, AssemblyError, Program};
pub use emulator::{ExecutionError, ExecutionResult, Runtime};
pub use options::Options;
