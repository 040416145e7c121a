//! Formatted error and warning output.
//!
//! Every diagnostic names the file and line, echoes the original source
//! line, and can underline the offending span, point at a single column
//! with a caret and append a short hint:
//!
//! ```text
//! prog.k91:3:
//! error: unknown register 'r9'
//!      |
//!    3 | 	load	r9, =5
//!      | 	    	~~
//!      	    	^
//! ```
//!
//! The reporter counts errors and warnings; the assembler consults the
//! error count to decide whether a [`Program`](crate::asm::Program) may be
//! produced at all.

use std::io::Write;

/// Severity of a reported diagnostic.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    Error,
    Warning,
    Info,
}

impl Kind {
    fn label(self) -> &'static str {
        match self {
            Kind::Error => "error",
            Kind::Warning => "warning",
            Kind::Info => "info",
        }
    }
}

/// An optional source annotation: an underline over a column span, an
/// optional caret column and an optional trailing hint.
///
/// Columns are byte offsets into the echoed line; the case-folded working
/// line is aligned position-for-position with the original, so spans from
/// the lexer can be used directly.
#[derive(Clone, Debug, Default)]
pub struct Note<'a> {
    pub start: usize,
    pub len: usize,
    pub caret: Option<usize>,
    pub hint: Option<&'a str>,
}

impl<'a> Note<'a> {
    pub fn span(start: usize, len: usize) -> Note<'a> {
        Note {
            start,
            len,
            caret: None,
            hint: None,
        }
    }

    pub fn with_caret(mut self, column: usize) -> Note<'a> {
        self.caret = Some(column);
        self
    }

    pub fn with_hint(mut self, hint: &'a str) -> Note<'a> {
        self.hint = Some(hint);
        self
    }
}

/// Collects and formats diagnostics for a single input file.
pub struct Reporter<W> {
    filename: String,
    out: W,
    errors: u32,
    warnings: u32,
}

impl<W: Write> Reporter<W> {
    pub fn new(filename: &str, out: W) -> Reporter<W> {
        Reporter {
            filename: filename.to_string(),
            out,
            errors: 0,
            warnings: 0,
        }
    }

    pub fn errors(&self) -> u32 {
        self.errors
    }

    pub fn warnings(&self) -> u32 {
        self.warnings
    }

    pub fn error(&mut self, line_number: usize, line: &str, note: Option<Note>, message: &str) {
        self.errors += 1;
        self.render(Kind::Error, line_number, line, note, message);
    }

    pub fn warning(&mut self, line_number: usize, line: &str, note: Option<Note>, message: &str) {
        self.warnings += 1;
        self.render(Kind::Warning, line_number, line, note, message);
    }

    pub fn info(&mut self, line_number: usize, line: &str, note: Option<Note>, message: &str) {
        self.render(Kind::Info, line_number, line, note, message);
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn render(
        &mut self,
        kind: Kind,
        line_number: usize,
        line: &str,
        note: Option<Note>,
        message: &str,
    ) {
        // Tabs in the echoed line would throw the underline off; pad the
        // marker rows with the same whitespace the line itself uses.
        let pad = |col: usize| -> String {
            line.chars()
                .take(col)
                .map(|c| if c == '\t' { '\t' } else { ' ' })
                .collect()
        };

        let out = &mut self.out;

        let _ = writeln!(out, "{}:{}:", self.filename, line_number);
        let _ = writeln!(out, "{}: {}", kind.label(), message);
        let _ = writeln!(out, "     |");
        let _ = writeln!(out, "{:4} | {}", line_number, line);

        if let Some(note) = note {
            let underline: String = std::iter::repeat('~').take(note.len.max(1)).collect();

            match note.hint {
                Some(hint) => {
                    let _ = writeln!(out, "     | {}{} ({})", pad(note.start), underline, hint);
                }
                None => {
                    let _ = writeln!(out, "     | {}{}", pad(note.start), underline);
                }
            }

            if let Some(caret) = note.caret {
                let _ = writeln!(out, "       {}^", pad(caret));
            }
        }

        let _ = writeln!(out);
    }
}
