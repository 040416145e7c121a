//! Token set for a single, already case-folded source line.
//!
//! Mnemonics are deliberately not a token class: the first word of a line
//! is looked up in the mnemonic table by the parser, and any word that is
//! not a mnemonic becomes a label. The lexer only distinguishes the shapes
//! a word can take.

use logos::{Lexer, Logos};

use crate::instruction::Register;

#[derive(Logos, Debug, PartialEq, Clone, Copy)]
pub enum Token<'a> {
    #[error]
    #[regex(r"[ \t\r\f]+", logos::skip)]
    #[regex(r";[^\n]*", logos::skip)]
    Error,

    #[regex("r[0-7]|sp|fp", register_callback, priority = 3)]
    Register(Register),

    #[regex(r"[a-z_$][a-z0-9_$]*", Lexer::slice, priority = 2)]
    Symbol(&'a str),

    #[regex("-?[0-9]+", literal_callback)]
    Literal(i64),

    #[token("=")]
    ImmediateModifier,

    #[token("@")]
    IndirectModifier,

    #[token(",")]
    ParameterSeparator,

    #[token("(")]
    IndexBegin,

    #[token(")")]
    IndexEnd,
}

fn register_callback<'a>(lex: &mut Lexer<'a, Token<'a>>) -> Result<Register, ()> {
    let reg = match lex.slice() {
        "r0" => Register::R0,
        "r1" => Register::R1,
        "r2" => Register::R2,
        "r3" => Register::R3,
        "r4" => Register::R4,
        "r5" => Register::R5,
        "r6" | "sp" => Register::R6,
        "r7" | "fp" => Register::R7,
        _ => return Err(()),
    };

    Ok(reg)
}

fn literal_callback<'a>(
    lex: &mut Lexer<'a, Token<'a>>,
) -> Result<i64, std::num::ParseIntError> {
    lex.slice().parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use logos::Span;

    fn tokens(line: &str) -> Vec<(Token, Span)> {
        Token::lexer(line).spanned().collect()
    }

    #[test]
    fn registers_and_aliases() {
        let toks = tokens("r0 r5 sp fp");

        assert_eq!(toks[0].0, Token::Register(Register::R0));
        assert_eq!(toks[1].0, Token::Register(Register::R5));
        assert_eq!(toks[2].0, Token::Register(Register::R6));
        assert_eq!(toks[3].0, Token::Register(Register::R7));
    }

    #[test]
    fn register_prefix_does_not_split_symbols() {
        let toks = tokens("r1x sp2 r9");

        assert_eq!(toks[0].0, Token::Symbol("r1x"));
        assert_eq!(toks[1].0, Token::Symbol("sp2"));
        assert_eq!(toks[2].0, Token::Symbol("r9"));
    }

    #[test]
    fn second_operand_shapes() {
        let toks = tokens("load r1, =-17(sp)");

        assert_eq!(toks[0].0, Token::Symbol("load"));
        assert_eq!(toks[1].0, Token::Register(Register::R1));
        assert_eq!(toks[2].0, Token::ParameterSeparator);
        assert_eq!(toks[3].0, Token::ImmediateModifier);
        assert_eq!(toks[4].0, Token::Literal(-17));
        assert_eq!(toks[5].0, Token::IndexBegin);
        assert_eq!(toks[6].0, Token::Register(Register::R6));
        assert_eq!(toks[7].0, Token::IndexEnd);
        assert_eq!(toks.len(), 8);
    }

    #[test]
    fn spans_are_column_ranges() {
        let toks = tokens("\tjump @loop");

        assert_eq!(toks[0], (Token::Symbol("jump"), 1..5));
        assert_eq!(toks[1], (Token::IndirectModifier, 6..7));
        assert_eq!(toks[2], (Token::Symbol("loop"), 7..11));
    }

    #[test]
    fn identifiers_allow_underscore_and_dollar() {
        let toks = tokens("_tmp$2");
        assert_eq!(toks[0].0, Token::Symbol("_tmp$2"));
    }

    #[test]
    fn oversized_literal_becomes_an_error_token() {
        let toks = tokens("99999999999999999999999");
        assert_eq!(toks[0].0, Token::Error);
    }
}
