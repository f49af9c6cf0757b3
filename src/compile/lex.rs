use crate::types::span::Span;
use crate::types::syntax::Syntax;
use crate::{Error, Result};

/// A lexer that chunks the template source into text and instruction tags so
/// that the parser doesn't have to operate on raw text.
///
/// The lexer is implemented as a fallible iterator. The parser should
/// repeatedly call the [`.next()?`][Lexer::next] method until [`None`] is
/// returned. Cloning a lexer, or constructing a new one over the same source,
/// restarts tokenization from that point.
#[derive(Clone)]
pub struct Lexer<'a> {
    /// The delimiter configuration.
    syntax: &'a Syntax,

    /// The original template source.
    pub source: &'a str,

    /// A cursor over the template source.
    cursor: usize,
}

/// The unit yielded by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// Raw template text.
    Text,
    /// An instruction tag including its delimiters, e.g. `{foo.bar}`.
    Instruction,
    /// A comment tag including its delimiters, e.g. `{# note}` or
    /// `{## note ##}`.
    Comment,
}

impl<'a> Lexer<'a> {
    /// Construct a new lexer.
    pub fn new(syntax: &'a Syntax, source: &'a str) -> Self {
        Self {
            syntax,
            source,
            cursor: 0,
        }
    }

    /// Returns the span of the instruction body for a tag span, i.e. without
    /// the delimiters.
    pub fn inner(&self, tag: Span) -> Span {
        Span {
            m: tag.m + self.syntax.open.len(),
            n: tag.n - self.syntax.close.len(),
        }
    }

    /// Returns the next token and span.
    pub fn next(&mut self) -> Result<Option<(Token, Span)>> {
        let i = self.cursor;

        if self.source[i..].is_empty() {
            return Ok(None);
        }

        // Find the next open delimiter from `i`. The following diagram helps
        // describe the variable naming.
        //
        // xxxxxxx{xxxxxxx}xxxx
        //    ^   ^^      ^
        //    i   jk      l

        let j = match self.find(&self.syntax.open, i) {
            Some(j) => j,
            None => {
                // No more tags, the rest of the template is text.
                self.cursor = self.source.len();
                return Ok(Some((Token::Text, Span::from(i..self.source.len()))));
            }
        };

        if i != j {
            // We must first emit the text before the tag.
            self.cursor = j;
            return Ok(Some((Token::Text, Span::from(i..j))));
        }

        let k = j + self.syntax.open.len();

        if self.source[k..].starts_with("##") {
            return self.lex_block_comment(j, k);
        }

        let l = match self.find(&self.syntax.close, k) {
            Some(l) => l,
            None => {
                return Err(Error::lex(
                    "unclosed instruction",
                    self.source,
                    j..k,
                ));
            }
        };

        // If another open delimiter appears before the close delimiter then
        // the first one can't start an instruction. Emit everything up to the
        // inner delimiter as text and resume scanning from there.
        if let Some(p) = self.find(&self.syntax.open, k).filter(|&p| p < l) {
            self.cursor = p;
            return Ok(Some((Token::Text, Span::from(j..p))));
        }

        let end = l + self.syntax.close.len();
        self.cursor = end;
        let tk = match self.source[k..l].starts_with('#') {
            true => Token::Comment,
            false => Token::Instruction,
        };
        Ok(Some((tk, Span::from(j..end))))
    }

    /// Lexes a multi-line comment, e.g. `{## ... ##}`.
    fn lex_block_comment(&mut self, j: usize, k: usize) -> Result<Option<(Token, Span)>> {
        let end = format!("##{}", self.syntax.close);
        match self.find(&end, k + 2) {
            Some(l) => {
                self.cursor = l + end.len();
                Ok(Some((Token::Comment, Span::from(j..self.cursor))))
            }
            None => Err(Error::lex("unclosed comment", self.source, j..k + 2)),
        }
    }

    fn find(&self, pat: &str, at: usize) -> Option<usize> {
        self.source[at..].find(pat).map(|d| at + d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn lex_empty() {
        let tokens = lex("").unwrap();
        assert_eq!(tokens, []);
    }

    #[test]
    fn lex_text() {
        let tokens = lex("lorem ipsum").unwrap();
        assert_eq!(tokens, [(Token::Text, "lorem ipsum")]);
    }

    #[test]
    fn lex_instruction() {
        let tokens = lex("lorem {ipsum.dolor|html} sit").unwrap();
        assert_eq!(
            tokens,
            [
                (Token::Text, "lorem "),
                (Token::Instruction, "{ipsum.dolor|html}"),
                (Token::Text, " sit"),
            ]
        );
    }

    #[test]
    fn lex_adjacent_instructions() {
        let tokens = lex("{.section a}{b}{.end}").unwrap();
        assert_eq!(
            tokens,
            [
                (Token::Instruction, "{.section a}"),
                (Token::Instruction, "{b}"),
                (Token::Instruction, "{.end}"),
            ]
        );
    }

    #[test]
    fn lex_whitespace_is_kept() {
        let tokens = lex("a { b } c").unwrap();
        assert_eq!(
            tokens,
            [
                (Token::Text, "a "),
                (Token::Instruction, "{ b }"),
                (Token::Text, " c"),
            ]
        );
    }

    #[test]
    fn lex_nested_open_delimiter() {
        let tokens = lex("x {a {b} c").unwrap();
        assert_eq!(
            tokens,
            [
                (Token::Text, "x "),
                (Token::Text, "{a "),
                (Token::Instruction, "{b}"),
                (Token::Text, " c"),
            ]
        );
    }

    #[test]
    fn lex_comments() {
        let tokens = lex("a{# note}b{## multi\nline ##}c").unwrap();
        assert_eq!(
            tokens,
            [
                (Token::Text, "a"),
                (Token::Comment, "{# note}"),
                (Token::Text, "b"),
                (Token::Comment, "{## multi\nline ##}"),
                (Token::Text, "c"),
            ]
        );
    }

    #[test]
    fn lex_block_comment_may_contain_delimiters() {
        let tokens = lex("{## {a} } ##}").unwrap();
        assert_eq!(tokens, [(Token::Comment, "{## {a} } ##}")]);
    }

    #[test]
    fn lex_custom_syntax() {
        let syntax = Syntax::builder().delimiters("<%", "%>").build();
        let source = "a {b} <%c%>";
        let mut lexer = Lexer::new(&syntax, source);
        let mut tokens = Vec::new();
        while let Some((tk, sp)) = lexer.next().unwrap() {
            tokens.push((tk, &source[sp]));
        }
        assert_eq!(
            tokens,
            [(Token::Text, "a {b} "), (Token::Instruction, "<%c%>")]
        );
    }

    #[test]
    fn lex_err_unclosed_instruction() {
        let err = lex("lorem {ipsum").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lex);
        assert_eq!(err.to_string(), "unclosed instruction between bytes 6 and 7");
    }

    #[test]
    fn lex_err_unclosed_comment() {
        let err = lex("{## lorem }").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lex);
        assert_eq!(err.to_string(), "unclosed comment between bytes 0 and 3");
    }

    #[test]
    fn lex_is_restartable() {
        let syntax = Syntax::default();
        let mut lexer = Lexer::new(&syntax, "a{b}c");
        let start = lexer.clone();
        while lexer.next().unwrap().is_some() {}
        let mut again = start;
        assert_eq!(again.next().unwrap(), Some((Token::Text, Span::from(0..1))));
    }

    #[track_caller]
    fn lex(source: &str) -> Result<Vec<(Token, &str)>> {
        let syntax = Syntax::default();
        let mut lexer = Lexer::new(&syntax, source);
        let mut tokens = Vec::new();
        while let Some((tk, sp)) = lexer.next()? {
            tokens.push((tk, &source[sp]));
        }
        for _ in 0..3 {
            assert!(lexer.next().unwrap().is_none());
        }
        Ok(tokens)
    }
}
