//! Source line scanning.
//!
//! Splits the source into logical lines for the assembler: comments are
//! stripped at the first `;`, trailing whitespace is trimmed, and empty or
//! comment-only lines are skipped while the file line numbering is
//! preserved. All of this is pure view manipulation over the source buffer;
//! nothing is copied except the per-line case fold.

/// One non-empty source line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceLine<'a> {
    /// 1-based line number in the input file.
    pub number: usize,

    /// The full line as written, for echoing in diagnostics.
    pub original: &'a str,

    /// The code part: comment stripped, trailing whitespace trimmed.
    /// Starts at column 0 of `original`, so column offsets agree.
    pub code: &'a str,
}

/// Iterator over the non-empty lines of a source buffer.
pub struct Lines<'a> {
    rest: &'a str,
    number: usize,
}

pub fn lines(source: &str) -> Lines {
    Lines {
        rest: source,
        number: 0,
    }
}

/// Returns the line up to (not including) the first `;`.
pub fn strip_comment(line: &str) -> &str {
    match line.find(';') {
        Some(comment) => &line[..comment],
        None => line,
    }
}

/// ASCII-lowercases `line` into `buf`, keeping every byte position intact
/// so spans into the folded line index the original as well.
pub fn fold_into(line: &str, buf: &mut String) {
    buf.clear();
    buf.extend(line.chars().map(|c| c.to_ascii_lowercase()));
}

impl<'a> Iterator for Lines<'a> {
    type Item = SourceLine<'a>;

    fn next(&mut self) -> Option<SourceLine<'a>> {
        while !self.rest.is_empty() {
            let (line, rest) = match self.rest.find('\n') {
                Some(newline) => (&self.rest[..newline], &self.rest[newline + 1..]),
                None => (self.rest, ""),
            };

            self.rest = rest;
            self.number += 1;

            let original = line.trim_end();
            let code = strip_comment(original).trim_end();

            if code.trim_start().is_empty() {
                continue;
            }

            return Some(SourceLine {
                number: self.number,
                original,
                code,
            });
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let source = "\n; header comment\nx dc 5 ; a constant\n\n\tload r1, x\n   ; tail\n";
        let collected: Vec<_> = lines(source).collect();

        assert_eq!(collected.len(), 2);

        assert_eq!(collected[0].number, 3);
        assert_eq!(collected[0].original, "x dc 5 ; a constant");
        assert_eq!(collected[0].code, "x dc 5");

        assert_eq!(collected[1].number, 5);
        assert_eq!(collected[1].code, "\tload r1, x");
    }

    #[test]
    fn last_line_without_newline() {
        let collected: Vec<_> = lines("svc sp, =halt").collect();

        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].number, 1);
        assert_eq!(collected[0].code, "svc sp, =halt");
    }

    #[test]
    fn folding_preserves_positions() {
        let mut buf = String::new();
        fold_into("\tLOAD\tR1, Summa", &mut buf);

        assert_eq!(buf, "\tload\tr1, summa");
        assert_eq!(buf.len(), "\tLOAD\tR1, Summa".len());
    }

    #[test]
    fn carriage_returns_are_trimmed() {
        let collected: Vec<_> = lines("load r1, =1\r\nout r1, =crt\r\n").collect();

        assert_eq!(collected.len(), 2);
        assert_eq!(collected[0].code, "load r1, =1");
        assert_eq!(collected[1].code, "out r1, =crt");
    }
}
