//! The single-pass assembler.
//!
//! Each non-empty source line is case-folded, tokenized and handed to one
//! of the per-mnemonic parser families. Data declarations (`DC`/`DS`/`EQU`)
//! are claimed tentatively before mnemonic dispatch, and any first word
//! that is not a known mnemonic becomes a label for the next instruction.
//!
//! Jumps to labels that are not yet bound are emitted with a zero value
//! field and patched by the fix-up pass once the whole source has been
//! scanned. The assembler keeps going after an error so that one run
//! surfaces as many diagnostics as possible; a nonzero error count fails
//! the assembly as a whole.

use std::io::{self, Write};
use std::mem;

use logos::{Logos, Span};

use crate::diagnostics::{Note, Reporter};
use crate::emulator::{InDevice, OutDevice};
use crate::instruction::{self, AddressMode, Instruction, OpCode, Register, SP};
use crate::symbol_table::SymbolTable;

use super::program::{AssemblyError, DataConstant, Program};
use super::scanner;
use super::token::Token;

type Tok<'t> = (Token<'t>, Span);

/// Largest magnitude that fits the 16-bit value field. The negative end is
/// capped at the same magnitude so that every accepted literal survives a
/// round trip through sign extension unchanged.
const VALUE_LIMIT: i64 = i16::MAX as i64;

/// Syntax families of the mnemonic table. One parser per family.
#[derive(Copy, Clone, Debug, PartialEq)]
enum Family {
    /// `REG, <second-operand>`: LOAD, arithmetic, logic, shifts, COMP.
    Common,
    /// `REG, <memory-operand>`: the destination must be an address.
    Store,
    /// `REG, target`: jumps deciding on a register value.
    JumpOnRegister,
    /// `target`: jumps deciding on the comparison flag, plus CALL.
    JumpOnFlags,
    /// `REG, =count`.
    Exit,
    /// `REG, =KBD`.
    In,
    /// `REG, =CRT`.
    Out,
    /// `REG, <second-operand>`.
    Push,
    /// `REG, REG`.
    Pop,
    /// `[REG]`: PUSHR/POPR.
    StackBlock,
    /// `REG`.
    Not,
    /// `REG, =HALT` or `REG, target`.
    SupervisorCall,
    /// No operands.
    Nop,
}

/// The mnemonic table: lowercased mnemonic → (opcode, parser family).
fn mnemonic(word: &str) -> Option<(OpCode, Family)> {
    use Family as F;
    use OpCode as O;

    let entry = match word {
        "nop" => (O::NoOperation, F::Nop),

        "store" => (O::Store, F::Store),
        "load" => (O::Load, F::Common),
        "in" => (O::In, F::In),
        "out" => (O::Out, F::Out),

        "add" => (O::Add, F::Common),
        "sub" => (O::Subtract, F::Common),
        "mul" => (O::Multiply, F::Common),
        "div" => (O::Divide, F::Common),
        "mod" => (O::Modulo, F::Common),

        "and" => (O::And, F::Common),
        "or" => (O::Or, F::Common),
        "xor" => (O::Xor, F::Common),
        "shl" => (O::ShiftLeft, F::Common),
        "shr" => (O::ShiftRight, F::Common),
        "not" => (O::Not, F::Not),
        "shra" => (O::ArithmeticShiftRight, F::Common),

        "comp" => (O::Compare, F::Common),

        "jump" => (O::Jump, F::JumpOnFlags),
        "jneg" => (O::JumpNegative, F::JumpOnRegister),
        "jzer" => (O::JumpZero, F::JumpOnRegister),
        "jpos" => (O::JumpPositive, F::JumpOnRegister),
        "jnneg" => (O::JumpNotNegative, F::JumpOnRegister),
        "jnzer" => (O::JumpNotZero, F::JumpOnRegister),
        "jnpos" => (O::JumpNotPositive, F::JumpOnRegister),

        "jles" => (O::JumpLess, F::JumpOnFlags),
        "jequ" => (O::JumpEqual, F::JumpOnFlags),
        "jgre" => (O::JumpGreater, F::JumpOnFlags),
        "jnles" => (O::JumpNotLess, F::JumpOnFlags),
        "jnequ" => (O::JumpNotEqual, F::JumpOnFlags),
        "jngre" => (O::JumpNotGreater, F::JumpOnFlags),

        "call" => (O::Call, F::JumpOnFlags),
        "exit" => (O::Exit, F::Exit),
        "push" => (O::Push, F::Push),
        "pop" => (O::Pop, F::Pop),
        "pushr" => (O::PushRegisters, F::StackBlock),
        "popr" => (O::PopRegisters, F::StackBlock),

        "svc" => (O::SupervisorCall, F::SupervisorCall),
        // Not officially part of the language.
        "iret" => (O::InterruptReturn, F::Common),

        _ => return None,
    };

    Some(entry)
}

/// A jump whose label was not yet bound when the instruction was emitted.
struct UnresolvedJump<'a> {
    label: String,
    instruction_index: usize,
    line_number: usize,
    original: &'a str,
    span: Span,
}

/// Per-line context handed to the parser families: the 1-based line number,
/// the original line for diagnostics and the case-folded working copy the
/// token spans index into. The two are aligned position-for-position.
struct LineCtx<'a, 'f> {
    number: usize,
    original: &'a str,
    folded: &'f str,
}

/// A normalized second operand.
struct Operand {
    mode: AddressMode,
    src: Register,
    value: i16,
    span: Span,
    indexed: bool,
    from_symbol: bool,
}

struct Assembler<'a, W> {
    reporter: Reporter<W>,
    table: SymbolTable,
    instructions: Vec<u32>,
    source_lines: Vec<u32>,
    unresolved: Vec<UnresolvedJump<'a>>,
}

/// Assembles `source`, writing diagnostics to standard output.
pub fn assemble(filename: &str, source: &str) -> Result<Program, AssemblyError> {
    assemble_to(filename, source, io::stdout())
}

/// Assembles `source`, writing diagnostics to `out`.
pub fn assemble_to<W: Write>(
    filename: &str,
    source: &str,
    out: W,
) -> Result<Program, AssemblyError> {
    let mut asm = Assembler {
        reporter: Reporter::new(filename, out),
        table: SymbolTable::new(),
        instructions: Vec::new(),
        source_lines: Vec::new(),
        unresolved: Vec::new(),
    };

    let mut folded = String::new();

    for line in scanner::lines(source) {
        scanner::fold_into(line.code, &mut folded);

        let tokens: Vec<Tok> = Token::lexer(&folded).spanned().collect();
        let ctx = LineCtx {
            number: line.number,
            original: line.original,
            folded: &folded,
        };

        asm.parse_line(&ctx, &tokens);
    }

    asm.fix_up();

    if asm.reporter.errors() > 0 {
        return Err(AssemblyError {
            errors: asm.reporter.errors(),
            warnings: asm.reporter.warnings(),
        });
    }

    // Safety net for programs missing their `SVC SP, =HALT`.
    asm.instructions.push(
        Instruction {
            opcode: OpCode::Halt,
            mode: AddressMode::Immediate,
            dst: Register::R0,
            src: Register::ZR,
            value: 0,
        }
        .pack(),
    );
    asm.source_lines.push(0);

    Ok(Program {
        instructions: asm.instructions,
        constants: asm.table.values,
        data_section_bytes: asm.table.total_num_bytes,
        source: source.to_string(),
        source_lines: asm.source_lines,
        filename: filename.to_string(),
    })
}

fn span_of(toks: &[Tok]) -> Option<Span> {
    let first = toks.first()?;
    let last = toks.last()?;
    Some(first.1.start..last.1.end)
}

fn note_for(span: &Span) -> Note<'static> {
    Note::span(span.start, span.end.saturating_sub(span.start))
}

impl<'a, W: Write> Assembler<'a, W> {
    fn err(&mut self, ctx: &LineCtx<'a, '_>, note: Option<Note>, message: &str) {
        self.reporter.error(ctx.number, ctx.original, note, message);
    }

    fn warn(&mut self, ctx: &LineCtx<'a, '_>, note: Option<Note>, message: &str) {
        self.reporter.warning(ctx.number, ctx.original, note, message);
    }

    fn eol_note(&self, ctx: &LineCtx<'a, '_>) -> Note<'static> {
        Note::span(ctx.folded.len(), 1)
    }

    fn parse_line(&mut self, ctx: &LineCtx<'a, '_>, toks: &[Tok]) {
        if self.try_pseudo_instruction(ctx, toks) {
            return;
        }

        let (first, rest) = match toks.split_first() {
            Some(split) => split,
            None => return,
        };

        let word = match &first.0 {
            Token::Symbol(word) => *word,
            _ => {
                self.err(
                    ctx,
                    Some(note_for(&first.1)),
                    "expected an instruction or a label",
                );
                return;
            }
        };

        if let Some((op, family)) = mnemonic(word) {
            self.dispatch(ctx, op, family, rest);
            return;
        }

        // Not a mnemonic: the word labels the next instruction.
        if self.instructions.len() > i16::MAX as usize {
            self.err(ctx, Some(note_for(&first.1)), "too many instructions to label");
            return;
        }

        if self
            .table
            .define_label(word, self.instructions.len() as i16)
            .is_err()
        {
            self.err(
                ctx,
                Some(note_for(&first.1)),
                &format!("label '{}' already exists", word),
            );
            return;
        }

        match rest.split_first() {
            Some(((Token::Symbol(word), span), rest)) => match mnemonic(word) {
                Some((op, family)) => self.dispatch(ctx, op, family, rest),
                None => {
                    self.err(
                        ctx,
                        Some(note_for(span)),
                        &format!("unknown instruction '{}'", word),
                    );
                }
            },
            Some(((_, span), _)) => {
                self.err(
                    ctx,
                    Some(note_for(span)),
                    "expected an instruction after the label",
                );
            }
            None => {
                self.err(
                    ctx,
                    Some(note_for(&first.1)),
                    "a label must be followed by an instruction on the same line",
                );
            }
        }
    }

    /// Peeks the first tokens of the line and claims it as a
    /// pseudo-instruction only if the `NAME DC|DS|EQU VALUE` shape fits.
    /// Returns whether the line was claimed.
    fn try_pseudo_instruction(&mut self, ctx: &LineCtx<'a, '_>, toks: &[Tok]) -> bool {
        let (name, name_span) = match toks.get(0) {
            Some((Token::Symbol(name), span)) => (*name, span.clone()),
            _ => return false,
        };

        let kind = match toks.get(1) {
            Some((Token::Symbol(kind), _)) => match *kind {
                "dc" | "ds" | "equ" => *kind,
                _ => return false,
            },
            _ => return false,
        };

        if mnemonic(name).is_some() {
            // `load dc 1` is an instruction parse error, not a declaration.
            return false;
        }

        // The line is ours from here on; every failure is a diagnostic.
        let value = match toks.get(2) {
            Some((Token::Literal(value), _)) => *value,
            Some((_, span)) => {
                let span = span.clone();
                self.err(
                    ctx,
                    Some(note_for(&span)),
                    &format!("expected an integer value for {}", kind.to_uppercase()),
                );
                return true;
            }
            None => {
                let note = self.eol_note(ctx);
                self.err(
                    ctx,
                    Some(note),
                    &format!("missing value for {}", kind.to_uppercase()),
                );
                return true;
            }
        };

        if let Some(trailing) = span_of(&toks[3..]) {
            self.err(
                ctx,
                Some(note_for(&trailing)),
                "unexpected tokens after the pseudo-instruction",
            );
            return true;
        }

        if value < i32::MIN as i64 || value > i32::MAX as i64 {
            let span = toks[2].1.clone();
            self.err(
                ctx,
                Some(note_for(&span)),
                &format!("value {} does not fit a 32-bit word", value),
            );
            return true;
        }

        let value = value as i32;

        let bound = match kind {
            "dc" => {
                let address = self.table.total_num_bytes;
                self.table.total_num_bytes += 4;
                self.table.values.push(DataConstant { address, value });
                address
            }
            "ds" => {
                if value < 0 {
                    let span = toks[2].1.clone();
                    self.err(
                        ctx,
                        Some(note_for(&span)),
                        &format!("DS cannot reserve a negative number of words ({})", value),
                    );
                    return true;
                }

                let address = self.table.total_num_bytes;
                let reserved = match value.checked_mul(4) {
                    Some(bytes) => bytes,
                    None => {
                        let span = toks[2].1.clone();
                        self.err(ctx, Some(note_for(&span)), "DS reservation is too large");
                        return true;
                    }
                };

                match self.table.total_num_bytes.checked_add(reserved) {
                    Some(total) => self.table.total_num_bytes = total,
                    None => {
                        let span = toks[2].1.clone();
                        self.err(ctx, Some(note_for(&span)), "data section grew too large");
                        return true;
                    }
                }

                address
            }
            _ => value,
        };

        if self.table.define_symbol(name, bound).is_err() {
            self.err(
                ctx,
                Some(note_for(&name_span)),
                &format!("symbol '{}' already exists", name),
            );
        }

        true
    }

    fn dispatch(&mut self, ctx: &LineCtx<'a, '_>, op: OpCode, family: Family, toks: &[Tok]) {
        let _ = match family {
            Family::Common => self.parse_common(ctx, op, toks),
            Family::Store => self.parse_store(ctx, toks),
            Family::JumpOnRegister => self.parse_jump_on_register(ctx, op, toks),
            Family::JumpOnFlags => self.parse_jump_on_flags(ctx, op, toks),
            Family::Exit => self.parse_exit(ctx, toks),
            Family::In => self.parse_io(ctx, op, toks),
            Family::Out => self.parse_io(ctx, op, toks),
            Family::Push => self.parse_push(ctx, toks),
            Family::Pop => self.parse_pop(ctx, toks),
            Family::StackBlock => self.parse_stack_block(ctx, op, toks),
            Family::Not => self.parse_not(ctx, toks),
            Family::SupervisorCall => self.parse_svc(ctx, toks),
            Family::Nop => self.parse_nop(ctx, toks),
        };
    }

    /// Emits a packed instruction word.
    ///
    /// `R0` in the src field is rebound to the zero register here, for every
    /// opcode except STORE. STORE keeps `R0` so that `STORE Rx, 0` computes
    /// its target address from the reserved address-0 slot.
    fn emit(
        &mut self,
        ctx: &LineCtx<'a, '_>,
        op: OpCode,
        mode: AddressMode,
        dst: Register,
        src: Register,
        value: i16,
    ) {
        let src = match (op, src) {
            (OpCode::Store, src) => src,
            (_, Register::R0) => Register::ZR,
            (_, src) => src,
        };

        let word = Instruction {
            opcode: op,
            mode,
            dst,
            src,
            value,
        }
        .pack();

        self.instructions.push(word);
        self.source_lines.push(ctx.number as u32);
    }

    /// Warns about spelling the stack and frame pointers as plain registers.
    fn register_style_check(&mut self, ctx: &LineCtx<'a, '_>, reg: Register, span: &Span) {
        let spelled = &ctx.folded[span.clone()];

        match (reg, spelled) {
            (Register::R6, "r6") => {
                self.warn(
                    ctx,
                    Some(note_for(span)),
                    "R6 is the stack pointer, prefer SP",
                );
            }
            (Register::R7, "r7") => {
                self.warn(
                    ctx,
                    Some(note_for(span)),
                    "R7 is the frame pointer, prefer FP",
                );
            }
            _ => {}
        }
    }

    fn expect_register<'x, 't>(
        &mut self,
        ctx: &LineCtx<'a, '_>,
        toks: &'x [Tok<'t>],
    ) -> Option<(Register, Span, &'x [Tok<'t>])> {
        match toks.split_first() {
            Some(((Token::Register(reg), span), rest)) => {
                self.register_style_check(ctx, *reg, span);
                Some((*reg, span.clone(), rest))
            }
            Some(((Token::Symbol(word), span), _)) if looks_like_register(word) => {
                self.err(
                    ctx,
                    Some(note_for(span)),
                    &format!("unknown register '{}'", word),
                );
                None
            }
            Some(((_, span), _)) => {
                self.err(ctx, Some(note_for(span)), "expected a register");
                None
            }
            None => {
                let note = self.eol_note(ctx);
                self.err(ctx, Some(note), "expected a register, found end of line");
                None
            }
        }
    }

    fn expect_comma<'x, 't>(
        &mut self,
        ctx: &LineCtx<'a, '_>,
        toks: &'x [Tok<'t>],
    ) -> Option<&'x [Tok<'t>]> {
        match toks.split_first() {
            Some(((Token::ParameterSeparator, _), rest)) => Some(rest),
            Some(((_, span), _)) => {
                self.err(ctx, Some(note_for(span)), "expected a comma");
                None
            }
            None => {
                let note = self.eol_note(ctx);
                self.err(
                    ctx,
                    Some(note),
                    "reached end of line while parsing an instruction (needs more arguments?)",
                );
                None
            }
        }
    }

    /// Narrows a declared symbol value or literal to the 16-bit value field.
    fn narrow(&mut self, ctx: &LineCtx<'a, '_>, value: i64, span: &Span, what: &str) -> Option<i16> {
        if value > VALUE_LIMIT || value < -VALUE_LIMIT {
            self.err(
                ctx,
                Some(note_for(span)),
                &format!(
                    "{} does not fit the 16-bit value field (maximum {})",
                    what, VALUE_LIMIT
                ),
            );
            return None;
        }

        Some(value as i16)
    }

    /// Parses and normalizes the second operand: `[=|@] body [(REG)]` where
    /// the body is a literal, a declared symbol or a register.
    fn parse_second_operand(&mut self, ctx: &LineCtx<'a, '_>, toks: &[Tok]) -> Option<Operand> {
        enum Prefix {
            None,
            Immediate,
            Indirect,
        }

        enum Body {
            Value(i16),
            Register(Register),
        }

        let operand_span = match span_of(toks) {
            Some(span) => span,
            None => {
                let note = self.eol_note(ctx);
                self.err(ctx, Some(note), "expected a second operand, found end of line");
                return None;
            }
        };

        let mut rest = toks;

        let prefix = match rest.first() {
            Some((Token::ImmediateModifier, _)) => {
                rest = &rest[1..];
                Prefix::Immediate
            }
            Some((Token::IndirectModifier, _)) => {
                rest = &rest[1..];
                Prefix::Indirect
            }
            _ => Prefix::None,
        };

        let mut from_symbol = false;

        let body = match rest.split_first() {
            Some(((Token::Literal(value), span), tail)) => {
                rest = tail;
                let what = format!("integer {}", value);
                Body::Value(self.narrow(ctx, *value, span, &what)?)
            }
            Some(((Token::Register(reg), span), tail)) => {
                self.register_style_check(ctx, *reg, span);
                rest = tail;
                Body::Register(*reg)
            }
            Some(((Token::Symbol(word), span), tail)) => match self.table.symbol(word) {
                Some(value) => {
                    from_symbol = true;
                    rest = tail;
                    let what = format!("symbol '{}' with value {}", word, value);
                    Body::Value(self.narrow(ctx, value as i64, span, &what)?)
                }
                None => {
                    self.err(
                        ctx,
                        Some(note_for(span)),
                        &format!("variable or symbol '{}' does not exist", word),
                    );
                    return None;
                }
            },
            Some(((_, span), _)) => {
                self.err(
                    ctx,
                    Some(note_for(span)),
                    "expected a register, a symbol or an integer",
                );
                return None;
            }
            None => {
                let note = self.eol_note(ctx);
                self.err(
                    ctx,
                    Some(note),
                    "reached end of line while parsing a register/value/address",
                );
                return None;
            }
        };

        let mut index = None;

        if let Some(((Token::IndexBegin, open_span), tail)) = rest.split_first() {
            let open_span = open_span.clone();
            let (reg, span, tail) = self.expect_register(ctx, tail)?;
            index = Some((reg, span));

            match tail.split_first() {
                Some(((Token::IndexEnd, _), tail)) => rest = tail,
                _ => {
                    self.err(
                        ctx,
                        Some(note_for(&open_span).with_caret(open_span.start)),
                        "missing closing ) after the index register",
                    );
                    return None;
                }
            }
        }

        if let Some(trailing) = span_of(rest) {
            self.err(
                ctx,
                Some(note_for(&trailing)),
                "unexpected tokens after the second operand",
            );
            return None;
        }

        let (mode, src, value) = match (prefix, body, index) {
            (Prefix::None, Body::Value(value), None) => (AddressMode::Direct, Register::R0, value),
            (Prefix::None, Body::Value(value), Some((reg, _))) => (AddressMode::Direct, reg, value),
            (Prefix::None, Body::Register(reg), None) => (AddressMode::Register, reg, 0),

            (Prefix::Immediate, Body::Value(value), None) => {
                (AddressMode::Immediate, Register::R0, value)
            }
            (Prefix::Immediate, Body::Value(value), Some((reg, _))) => {
                (AddressMode::Register, reg, value)
            }
            (Prefix::Immediate, Body::Register(reg), _) => {
                let hint = format!("write =0({})", reg);
                self.err(
                    ctx,
                    Some(
                        note_for(&operand_span)
                            .with_caret(operand_span.start)
                            .with_hint(&hint),
                    ),
                    &format!("'=' cannot be applied to register {}", reg),
                );
                return None;
            }

            (Prefix::Indirect, Body::Value(value), None) => {
                (AddressMode::Indirect, Register::R0, value)
            }
            (Prefix::Indirect, Body::Value(value), Some((reg, _))) => {
                (AddressMode::Indirect, reg, value)
            }
            (Prefix::Indirect, Body::Register(reg), None) => (AddressMode::Direct, reg, 0),

            (_, Body::Register(_), Some((_, span))) => {
                self.err(
                    ctx,
                    Some(note_for(&span)),
                    "a register operand cannot take an index register",
                );
                return None;
            }
        };

        Some(Operand {
            mode,
            src,
            value,
            span: operand_span,
            indexed: src != Register::R0,
            from_symbol,
        })
    }

    fn parse_common(&mut self, ctx: &LineCtx<'a, '_>, op: OpCode, toks: &[Tok]) -> Option<()> {
        let (dst, _, rest) = self.expect_register(ctx, toks)?;
        let rest = self.expect_comma(ctx, rest)?;
        let operand = self.parse_second_operand(ctx, rest)?;

        if operand.mode == AddressMode::Direct
            && !operand.indexed
            && i32::from(operand.value) > self.table.total_num_bytes
        {
            let hint = format!("did you mean ={}?", operand.value);
            self.warn(
                ctx,
                Some(note_for(&operand.span).with_hint(&hint)),
                &format!(
                    "address {} is past the end of the data section",
                    operand.value
                ),
            );
        }

        self.emit(ctx, op, operand.mode, dst, operand.src, operand.value);
        Some(())
    }

    fn parse_store(&mut self, ctx: &LineCtx<'a, '_>, toks: &[Tok]) -> Option<()> {
        let (dst, _, rest) = self.expect_register(ctx, toks)?;
        let rest = self.expect_comma(ctx, rest)?;
        let operand = self.parse_second_operand(ctx, rest)?;

        // STORE wants an address, not a loaded value: drop one level of
        // indirection from the mode so the runtime handler receives the
        // target address in the resolved value.
        let mode = match operand.mode {
            AddressMode::Direct => AddressMode::Register,
            AddressMode::Indirect => AddressMode::Direct,
            AddressMode::Immediate => {
                self.err(
                    ctx,
                    Some(note_for(&operand.span).with_caret(operand.span.start)),
                    "STORE needs a memory destination, not an immediate value",
                );
                return None;
            }
            AddressMode::Register => {
                self.err(
                    ctx,
                    Some(note_for(&operand.span)),
                    "STORE needs a memory destination, not a register",
                );
                return None;
            }
        };

        self.emit(ctx, OpCode::Store, mode, dst, operand.src, operand.value);
        Some(())
    }

    /// Emits a jump; queues an [`UnresolvedJump`] if the target label is not
    /// bound yet.
    fn make_jump(
        &mut self,
        ctx: &LineCtx<'a, '_>,
        op: OpCode,
        reg: Register,
        toks: &[Tok],
    ) -> Option<()> {
        match toks {
            [(Token::Symbol(label), span)] => {
                let value = match self.table.label(label) {
                    Some(index) => index,
                    None => {
                        self.unresolved.push(UnresolvedJump {
                            label: label.to_string(),
                            instruction_index: self.instructions.len(),
                            line_number: ctx.number,
                            original: ctx.original,
                            span: span.clone(),
                        });
                        0
                    }
                };

                self.emit(ctx, op, AddressMode::Immediate, reg, Register::R0, value);
            }
            [(Token::Literal(target), span)] => {
                if *target < 0 {
                    self.err(
                        ctx,
                        Some(note_for(span)),
                        &format!("a jump target cannot be negative (got {})", target),
                    );
                    return None;
                }

                let what = format!("jump target {}", target);
                let value = self.narrow(ctx, *target, span, &what)?;
                self.emit(ctx, op, AddressMode::Immediate, reg, Register::R0, value);
            }
            [] => {
                let note = self.eol_note(ctx);
                self.err(ctx, Some(note), "jump instruction is missing its target");
                return None;
            }
            _ => {
                let span = span_of(toks)?;
                self.err(
                    ctx,
                    Some(note_for(&span)),
                    "expected a label or an instruction address as the jump target",
                );
                return None;
            }
        }

        Some(())
    }

    fn parse_jump_on_register(
        &mut self,
        ctx: &LineCtx<'a, '_>,
        op: OpCode,
        toks: &[Tok],
    ) -> Option<()> {
        let (reg, _, rest) = self.expect_register(ctx, toks)?;
        let rest = self.expect_comma(ctx, rest)?;
        self.make_jump(ctx, op, reg, rest)
    }

    fn parse_jump_on_flags(
        &mut self,
        ctx: &LineCtx<'a, '_>,
        op: OpCode,
        toks: &[Tok],
    ) -> Option<()> {
        self.make_jump(ctx, op, Register::R0, toks)
    }

    fn parse_exit(&mut self, ctx: &LineCtx<'a, '_>, toks: &[Tok]) -> Option<()> {
        let (reg, _, rest) = self.expect_register(ctx, toks)?;
        let rest = self.expect_comma(ctx, rest)?;
        let operand = self.parse_second_operand(ctx, rest)?;

        if operand.mode != AddressMode::Immediate {
            let note = if operand.from_symbol {
                note_for(&operand.span)
                    .with_caret(operand.span.start)
                    .with_hint("prefix the symbol with =")
            } else {
                note_for(&operand.span)
            };

            self.err(
                ctx,
                Some(note),
                "EXIT takes an immediate parameter count, like =2",
            );
            return None;
        }

        self.emit(
            ctx,
            OpCode::Exit,
            AddressMode::Immediate,
            reg,
            operand.src,
            operand.value,
        );
        Some(())
    }

    fn parse_io(&mut self, ctx: &LineCtx<'a, '_>, op: OpCode, toks: &[Tok]) -> Option<()> {
        let (reg, _, rest) = self.expect_register(ctx, toks)?;
        let rest = self.expect_comma(ctx, rest)?;

        let device = match rest {
            [(Token::ImmediateModifier, _), (Token::Symbol(device), _)] => Some(*device),
            _ => None,
        };

        let value = match (op, device) {
            (OpCode::In, Some("kbd")) => InDevice::Kbd as i16,
            (OpCode::Out, Some("crt")) => OutDevice::Crt as i16,
            (OpCode::In, _) => {
                let span = span_of(rest).unwrap_or_else(|| ctx.folded.len()..ctx.folded.len() + 1);
                self.err(
                    ctx,
                    Some(note_for(&span)),
                    "unrecognized device for IN, expected =KBD",
                );
                return None;
            }
            (_, _) => {
                let span = span_of(rest).unwrap_or_else(|| ctx.folded.len()..ctx.folded.len() + 1);
                self.err(
                    ctx,
                    Some(note_for(&span)),
                    "unrecognized device for OUT, expected =CRT",
                );
                return None;
            }
        };

        self.emit(ctx, op, AddressMode::Immediate, reg, Register::R0, value);
        Some(())
    }

    fn parse_push(&mut self, ctx: &LineCtx<'a, '_>, toks: &[Tok]) -> Option<()> {
        let (reg, span, rest) = self.expect_register(ctx, toks)?;

        if reg != SP {
            self.warn(
                ctx,
                Some(note_for(&span)),
                "PUSH with a register other than SP",
            );
        }

        let rest = self.expect_comma(ctx, rest)?;
        let operand = self.parse_second_operand(ctx, rest)?;

        self.emit(
            ctx,
            OpCode::Push,
            operand.mode,
            reg,
            operand.src,
            operand.value,
        );
        Some(())
    }

    fn parse_pop(&mut self, ctx: &LineCtx<'a, '_>, toks: &[Tok]) -> Option<()> {
        let (reg, span, rest) = self.expect_register(ctx, toks)?;

        if reg != SP {
            self.warn(
                ctx,
                Some(note_for(&span)),
                "POP with a register other than SP",
            );
        }

        let rest = self.expect_comma(ctx, rest)?;
        let (target, _, rest) = self.expect_register(ctx, rest)?;

        if let Some(trailing) = span_of(rest) {
            self.err(
                ctx,
                Some(note_for(&trailing)),
                "unexpected tokens after the second operand",
            );
            return None;
        }

        self.emit(ctx, OpCode::Pop, AddressMode::Immediate, reg, target, 0);
        Some(())
    }

    fn parse_stack_block(&mut self, ctx: &LineCtx<'a, '_>, op: OpCode, toks: &[Tok]) -> Option<()> {
        let reg = match toks {
            [] => Register::R0,
            [(Token::Register(reg), span)] => {
                self.register_style_check(ctx, *reg, span);
                *reg
            }
            _ => {
                let span = span_of(toks)?;
                self.err(
                    ctx,
                    Some(note_for(&span)),
                    &format!("{} takes at most one register", op),
                );
                return None;
            }
        };

        self.emit(ctx, op, AddressMode::Immediate, reg, Register::R0, 0);
        Some(())
    }

    fn parse_not(&mut self, ctx: &LineCtx<'a, '_>, toks: &[Tok]) -> Option<()> {
        let (reg, _, rest) = self.expect_register(ctx, toks)?;

        if let Some(trailing) = span_of(rest) {
            self.err(
                ctx,
                Some(note_for(&trailing)),
                "NOT takes a single register operand",
            );
            return None;
        }

        self.emit(ctx, OpCode::Not, AddressMode::Immediate, reg, Register::R0, 0);
        Some(())
    }

    fn parse_svc(&mut self, ctx: &LineCtx<'a, '_>, toks: &[Tok]) -> Option<()> {
        let (reg, _, rest) = self.expect_register(ctx, toks)?;
        let rest = self.expect_comma(ctx, rest)?;

        if let [(Token::ImmediateModifier, _), (Token::Symbol("halt"), _)] = rest {
            self.emit(
                ctx,
                OpCode::Halt,
                AddressMode::Immediate,
                reg,
                Register::R0,
                0,
            );
            return Some(());
        }

        self.make_jump(ctx, OpCode::SupervisorCall, reg, rest)
    }

    fn parse_nop(&mut self, ctx: &LineCtx<'a, '_>, toks: &[Tok]) -> Option<()> {
        if let Some(trailing) = span_of(toks) {
            self.err(ctx, Some(note_for(&trailing)), "NOP takes no operands");
            return None;
        }

        // A zero-effect encoding: xor the reserved zero slot with 0.
        self.emit(
            ctx,
            OpCode::Xor,
            AddressMode::Immediate,
            Register::R0,
            Register::R0,
            0,
        );
        Some(())
    }

    /// Patches the value field of every jump whose label was unknown at
    /// emit time.
    fn fix_up(&mut self) {
        let unresolved = mem::take(&mut self.unresolved);

        for jump in unresolved {
            match self.table.label(&jump.label) {
                Some(index) => {
                    self.instructions[jump.instruction_index] |= instruction::encode_value(index);
                }
                None => {
                    self.reporter.error(
                        jump.line_number,
                        jump.original,
                        Some(note_for(&jump.span)),
                        &format!("label '{}' not found", jump.label),
                    );
                }
            }
        }
    }
}

fn looks_like_register(word: &str) -> bool {
    let mut chars = word.chars();

    chars.next() == Some('r')
        && !word[1..].is_empty()
        && chars.all(|c| c.is_ascii_digit())
}
