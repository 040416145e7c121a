//! Types for representing instructions and their packed 32-bit encoding.
//!
//! The bit layout is a hard contract shared by the assembler and the
//! interpreter:
//!
//! ```text
//! bit  0........6........8.........11.........15................31
//!      [opcode 6][mode 2][ dst 3  ][  src 4  ][ signed value 16 ]
//! ```
//!
//! The src field is one bit wider than the dst field to make room for the
//! zero register, a pseudo-register the assembler substitutes for `R0` in
//! the src position of every instruction except `STORE`.

use std::fmt;

pub const OPCODE_BITS: u32 = 6;
pub const MODE_BITS: u32 = 2;
pub const DST_BITS: u32 = 3;
pub const SRC_BITS: u32 = 4;
pub const VALUE_BITS: u32 = 16;

pub const OPCODE_OFFSET: u32 = 0;
pub const MODE_OFFSET: u32 = OPCODE_OFFSET + OPCODE_BITS;
pub const DST_OFFSET: u32 = MODE_OFFSET + MODE_BITS;
pub const SRC_OFFSET: u32 = DST_OFFSET + DST_BITS;
pub const VALUE_OFFSET: u32 = SRC_OFFSET + SRC_BITS;

/// Instructions of the TTK91 instruction architecture.
///
/// The float slots after [`OpCode::Halt`] are reserved for an opt-in
/// extension and currently dispatch to the illegal-instruction target.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    NoOperation = 0,

    Store = 1,
    Load = 2,
    In = 3,
    Out = 4,

    Add = 5,
    Subtract = 6,
    Multiply = 7,
    Divide = 8,
    Modulo = 9,

    And = 10,
    Or = 11,
    Xor = 12,
    ShiftLeft = 13,
    ShiftRight = 14,
    Not = 15,
    ArithmeticShiftRight = 16,

    Compare = 17,

    // Jumps on the value of a register.
    Jump = 18,
    JumpNegative = 19,
    JumpZero = 20,
    JumpPositive = 21,
    JumpNotNegative = 22,
    JumpNotZero = 23,
    JumpNotPositive = 24,

    // Jumps on the comparison flag set by Compare.
    JumpLess = 25,
    JumpEqual = 26,
    JumpGreater = 27,
    JumpNotLess = 28,
    JumpNotEqual = 29,
    JumpNotGreater = 30,

    Call = 31,
    Exit = 32,
    Push = 33,
    Pop = 34,
    PushRegisters = 35,
    PopRegisters = 36,

    SupervisorCall = 37,
    InterruptReturn = 38,

    Halt = 39,

    // Reserved for the float extension.
    FloatAdd = 40,
    FloatSubtract = 41,
    FloatMultiply = 42,
    FloatDivide = 43,
    FloatModulo = 44,
    IntToFloat = 45,
    FloatToInt = 46,
}

impl OpCode {
    pub fn from_bits(bits: u32) -> Option<OpCode> {
        use OpCode::*;

        let op = match bits {
            0 => NoOperation,

            1 => Store,
            2 => Load,
            3 => In,
            4 => Out,

            5 => Add,
            6 => Subtract,
            7 => Multiply,
            8 => Divide,
            9 => Modulo,

            10 => And,
            11 => Or,
            12 => Xor,
            13 => ShiftLeft,
            14 => ShiftRight,
            15 => Not,
            16 => ArithmeticShiftRight,

            17 => Compare,

            18 => Jump,
            19 => JumpNegative,
            20 => JumpZero,
            21 => JumpPositive,
            22 => JumpNotNegative,
            23 => JumpNotZero,
            24 => JumpNotPositive,

            25 => JumpLess,
            26 => JumpEqual,
            27 => JumpGreater,
            28 => JumpNotLess,
            29 => JumpNotEqual,
            30 => JumpNotGreater,

            31 => Call,
            32 => Exit,
            33 => Push,
            34 => Pop,
            35 => PushRegisters,
            36 => PopRegisters,

            37 => SupervisorCall,
            38 => InterruptReturn,

            39 => Halt,

            40 => FloatAdd,
            41 => FloatSubtract,
            42 => FloatMultiply,
            43 => FloatDivide,
            44 => FloatModulo,
            45 => IntToFloat,
            46 => FloatToInt,

            _ => return None,
        };

        Some(op)
    }

    pub fn as_bits(self) -> u32 {
        self as u32
    }

    /// The surface-syntax mnemonic, or an internal name for the opcodes the
    /// assembler only emits on its own.
    pub fn name(self) -> &'static str {
        use OpCode::*;

        match self {
            NoOperation => "NOP",

            Store => "STORE",
            Load => "LOAD",
            In => "IN",
            Out => "OUT",

            Add => "ADD",
            Subtract => "SUB",
            Multiply => "MUL",
            Divide => "DIV",
            Modulo => "MOD",

            And => "AND",
            Or => "OR",
            Xor => "XOR",
            ShiftLeft => "SHL",
            ShiftRight => "SHR",
            Not => "NOT",
            ArithmeticShiftRight => "SHRA",

            Compare => "COMP",

            Jump => "JUMP",
            JumpNegative => "JNEG",
            JumpZero => "JZER",
            JumpPositive => "JPOS",
            JumpNotNegative => "JNNEG",
            JumpNotZero => "JNZER",
            JumpNotPositive => "JNPOS",

            JumpLess => "JLES",
            JumpEqual => "JEQU",
            JumpGreater => "JGRE",
            JumpNotLess => "JNLES",
            JumpNotEqual => "JNEQU",
            JumpNotGreater => "JNGRE",

            Call => "CALL",
            Exit => "EXIT",
            Push => "PUSH",
            Pop => "POP",
            PushRegisters => "PUSHR",
            PopRegisters => "POPR",

            SupervisorCall => "SVC",
            InterruptReturn => "IRET",

            Halt => "HALT",

            FloatAdd => "FADD",
            FloatSubtract => "FSUB",
            FloatMultiply => "FMUL",
            FloatDivide => "FDIV",
            FloatModulo => "FMOD",
            IntToFloat => "ITOF",
            FloatToInt => "FTOI",
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The work registers plus the internal zero register.
///
/// `R6` doubles as the stack pointer and `R7` as the frame pointer.
/// [`Register::ZR`] cannot be named in source; the assembler substitutes it
/// for `R0` in the src field of non-STORE instructions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Register {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    ZR,
}

/// Stack pointer.
pub const SP: Register = Register::R6;
/// Frame pointer.
pub const FP: Register = Register::R7;

impl Register {
    pub fn from_index(index: u32) -> Option<Register> {
        let reg = match index {
            0 => Register::R0,
            1 => Register::R1,
            2 => Register::R2,
            3 => Register::R3,
            4 => Register::R4,
            5 => Register::R5,
            6 => Register::R6,
            7 => Register::R7,
            8 => Register::ZR,
            _ => return None,
        };

        Some(reg)
    }

    pub fn index(self) -> u32 {
        match self {
            Register::R0 => 0,
            Register::R1 => 1,
            Register::R2 => 2,
            Register::R3 => 3,
            Register::R4 => 4,
            Register::R5 => 5,
            Register::R6 => 6,
            Register::R7 => 7,
            Register::ZR => 8,
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Register::ZR => write!(f, "ZR"),
            reg => write!(f, "R{}", reg.index()),
        }
    }
}

/// The rule for computing the effective second operand from the value field
/// and the src register.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AddressMode {
    /// The value field as-is.
    Immediate = 0,
    /// `Rsrc + value`, no memory access.
    Register = 1,
    /// `M[Rsrc + value]`, one memory access.
    Direct = 2,
    /// `M[M[Rsrc + value]]`, two memory accesses.
    Indirect = 3,
}

impl AddressMode {
    pub fn from_bits(bits: u32) -> AddressMode {
        match bits & 0b11 {
            0 => AddressMode::Immediate,
            1 => AddressMode::Register,
            2 => AddressMode::Direct,
            _ => AddressMode::Indirect,
        }
    }

    pub fn as_bits(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for AddressMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            AddressMode::Immediate => "Immediate",
            AddressMode::Register => "Register",
            AddressMode::Direct => "Direct",
            AddressMode::Indirect => "Indirect",
        })
    }
}

#[inline]
pub fn encode_opcode(op: OpCode) -> u32 {
    op.as_bits() << OPCODE_OFFSET
}

#[inline]
pub fn decode_opcode(word: u32) -> u32 {
    (word >> OPCODE_OFFSET) & ((1 << OPCODE_BITS) - 1)
}

#[inline]
pub fn encode_mode(mode: AddressMode) -> u32 {
    mode.as_bits() << MODE_OFFSET
}

#[inline]
pub fn decode_mode(word: u32) -> u32 {
    (word >> MODE_OFFSET) & ((1 << MODE_BITS) - 1)
}

#[inline]
pub fn encode_dst(dst: Register) -> u32 {
    dst.index() << DST_OFFSET
}

#[inline]
pub fn decode_dst(word: u32) -> u32 {
    (word >> DST_OFFSET) & ((1 << DST_BITS) - 1)
}

#[inline]
pub fn encode_src(src: Register) -> u32 {
    src.index() << SRC_OFFSET
}

#[inline]
pub fn decode_src(word: u32) -> u32 {
    (word >> SRC_OFFSET) & ((1 << SRC_BITS) - 1)
}

#[inline]
pub fn encode_value(value: i16) -> u32 {
    (value as u16 as u32) << VALUE_OFFSET
}

#[inline]
pub fn decode_value(word: u32) -> i16 {
    ((word >> VALUE_OFFSET) & ((1 << VALUE_BITS) - 1)) as u16 as i16
}

/// A decoded instruction word.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: OpCode,
    pub mode: AddressMode,
    pub dst: Register,
    pub src: Register,
    pub value: i16,
}

impl Instruction {
    pub fn pack(&self) -> u32 {
        encode_opcode(self.opcode)
            | encode_mode(self.mode)
            | encode_dst(self.dst)
            | encode_src(self.src)
            | encode_value(self.value)
    }

    /// Decodes a packed word. Fails on unassigned opcode bit patterns.
    pub fn unpack(word: u32) -> Option<Instruction> {
        Some(Instruction {
            opcode: OpCode::from_bits(decode_opcode(word))?,
            mode: AddressMode::from_bits(decode_mode(word)),
            dst: Register::from_index(decode_dst(word))?,
            src: Register::from_index(decode_src(word))?,
            value: decode_value(word),
        })
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let modifier = match self.mode {
            AddressMode::Immediate => "=",
            AddressMode::Register | AddressMode::Direct => "",
            AddressMode::Indirect => "@",
        };

        write!(
            f,
            "{}\t{}, {}{}({})",
            self.opcode, self.dst, modifier, self.value, self.src
        )
    }
}
